use thiserror::Error;

use crate::models::ClassType;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AttendanceError {
    #[error(
        "present count ({present}) exceeds capacity ({capacity}) for {class_type}{group_label}; \
         enter a value <= {capacity}"
    )]
    CapacityExceeded {
        present: i32,
        capacity: i32,
        class_type: ClassType,
        group_label: String,
    },

    #[error("present count cannot be negative (got {0})")]
    NegativeCount(i32),

    #[error("invalid time {0:?}, expected HH:MM")]
    InvalidTime(String),

    #[error("{0} must not be empty")]
    MissingField(&'static str),

    #[error("{class_type} allocation needs at least one {kind}")]
    MissingRooms {
        class_type: ClassType,
        kind: &'static str,
    },
}
