use chrono::NaiveTime;
use tracing::warn;

use crate::error::AttendanceError;
use crate::models::{ClassType, SlotDefinition};
use crate::rates;

pub const LECTURE_CAPACITY: i32 = 60;
pub const LAB_CAPACITY: i32 = 20;
pub const LARGE_LAB_CAPACITY: i32 = 40;
const LARGE_LAB_ROOMS: [&str; 2] = ["638", "515"];

pub fn default_capacity(class_type: ClassType, slot_name: &str, batch_name: Option<&str>) -> i32 {
    match class_type {
        ClassType::Lecture => LECTURE_CAPACITY,
        ClassType::Lab => {
            let identifier = format!("{} {}", slot_name, batch_name.unwrap_or_default());
            if LARGE_LAB_ROOMS.iter().any(|room| identifier.contains(room)) {
                LARGE_LAB_CAPACITY
            } else {
                LAB_CAPACITY
            }
        }
    }
}

/// Explicit capacities win; a lab capacity that disagrees with the room rule is logged.
pub fn resolve_capacity(
    class_type: ClassType,
    slot_name: &str,
    batch_name: Option<&str>,
    requested: Option<i32>,
) -> i32 {
    let expected = default_capacity(class_type, slot_name, batch_name);
    match requested {
        None => expected,
        Some(capacity) => {
            if class_type == ClassType::Lab && capacity != expected {
                warn!(
                    slot = slot_name,
                    expected, capacity, "lab capacity differs from room default"
                );
            }
            capacity
        }
    }
}

/// Accepts `9:30` or `09:30`, returns `09:30`.
pub fn normalize_time(value: &str) -> Result<String, AttendanceError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map(|time| time.format("%H:%M").to_string())
        .map_err(|_| AttendanceError::InvalidTime(value.to_string()))
}

/// Counts derived from a slot's capacity for one day's entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceEntry {
    pub present_count: i32,
    pub absent_count: i32,
    pub total_students: i32,
    pub attendance_percentage: f64,
}

pub fn build_entry(
    slot: &SlotDefinition,
    present: i32,
) -> Result<AttendanceEntry, AttendanceError> {
    if present < 0 {
        return Err(AttendanceError::NegativeCount(present));
    }

    if present > slot.capacity {
        let group_label = slot
            .group_name()
            .map(|name| format!(" ({name})"))
            .unwrap_or_default();
        return Err(AttendanceError::CapacityExceeded {
            present,
            capacity: slot.capacity,
            class_type: slot.class_type,
            group_label,
        });
    }

    Ok(AttendanceEntry {
        present_count: present,
        absent_count: slot.capacity - present,
        total_students: slot.capacity,
        attendance_percentage: rates::round2(rates::percentage(
            i64::from(present),
            i64::from(slot.capacity),
        )),
    })
}
