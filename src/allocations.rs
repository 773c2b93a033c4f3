use crate::error::AttendanceError;
use crate::models::ClassType;

/// Allocation input before it is stored. Labs carry a batch and lab rooms,
/// lectures carry classrooms.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAllocation {
    pub class_type: ClassType,
    pub subject_name: String,
    pub faculty_name: String,
    pub semester: String,
    pub division: String,
    pub batch_name: Option<String>,
    pub lab_numbers: Vec<String>,
    pub class_room_numbers: Vec<String>,
}

impl NewAllocation {
    /// Trims every field and drops the fields that belong to the other class type.
    pub fn validate(self) -> Result<Self, AttendanceError> {
        let subject_name = required("subject", &self.subject_name)?;
        let faculty_name = required("faculty", &self.faculty_name)?;
        let semester = required("semester", &self.semester)?;
        let division = required("division", &self.division)?;

        let (batch_name, lab_numbers, class_room_numbers) = match self.class_type {
            ClassType::Lab => {
                let batch = required("batch", self.batch_name.as_deref().unwrap_or_default())?;
                let labs = room_list(&self.lab_numbers);
                if labs.is_empty() {
                    return Err(AttendanceError::MissingRooms {
                        class_type: ClassType::Lab,
                        kind: "lab number",
                    });
                }
                (Some(batch), labs, Vec::new())
            }
            ClassType::Lecture => {
                let rooms = room_list(&self.class_room_numbers);
                if rooms.is_empty() {
                    return Err(AttendanceError::MissingRooms {
                        class_type: ClassType::Lecture,
                        kind: "classroom number",
                    });
                }
                (None, Vec::new(), rooms)
            }
        };

        Ok(Self {
            class_type: self.class_type,
            subject_name,
            faculty_name,
            semester,
            division,
            batch_name,
            lab_numbers,
            class_room_numbers,
        })
    }
}

fn required(field: &'static str, value: &str) -> Result<String, AttendanceError> {
    let value = value.trim();
    if value.is_empty() {
        Err(AttendanceError::MissingField(field))
    } else {
        Ok(value.to_string())
    }
}

/// Trimmed, non-empty and de-duplicated, in the order given.
fn room_list(rooms: &[String]) -> Vec<String> {
    let mut list: Vec<String> = Vec::new();
    for room in rooms.iter().map(|room| room.trim()) {
        if !room.is_empty() && !list.iter().any(|seen| seen == room) {
            list.push(room.to_string());
        }
    }
    list
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lab() -> NewAllocation {
        NewAllocation {
            class_type: ClassType::Lab,
            subject_name: " Data Structures ".to_string(),
            faculty_name: "Dr. Kulkarni".to_string(),
            semester: "SEM 3".to_string(),
            division: "A".to_string(),
            batch_name: Some("A1".to_string()),
            lab_numbers: vec!["638".to_string(), " 638 ".to_string(), "".to_string()],
            class_room_numbers: vec!["12".to_string()],
        }
    }

    #[test]
    fn lab_allocation_keeps_lab_fields_only() {
        let allocation = lab().validate().unwrap();
        assert_eq!(allocation.subject_name, "Data Structures");
        assert_eq!(allocation.batch_name.as_deref(), Some("A1"));
        assert_eq!(allocation.lab_numbers, vec!["638".to_string()]);
        assert!(allocation.class_room_numbers.is_empty());
    }

    #[test]
    fn lab_allocation_needs_batch_and_rooms() {
        let mut missing_batch = lab();
        missing_batch.batch_name = Some("  ".to_string());
        assert_eq!(
            missing_batch.validate(),
            Err(AttendanceError::MissingField("batch"))
        );

        let mut missing_rooms = lab();
        missing_rooms.lab_numbers = vec![" ".to_string()];
        assert!(matches!(
            missing_rooms.validate(),
            Err(AttendanceError::MissingRooms {
                class_type: ClassType::Lab,
                ..
            })
        ));
    }

    #[test]
    fn lecture_allocation_drops_batch_and_labs() {
        let mut lecture = lab();
        lecture.class_type = ClassType::Lecture;
        lecture.class_room_numbers = vec!["12".to_string(), "14".to_string()];

        let allocation = lecture.validate().unwrap();
        assert_eq!(allocation.batch_name, None);
        assert!(allocation.lab_numbers.is_empty());
        assert_eq!(allocation.class_room_numbers, vec!["12", "14"]);
    }

    #[test]
    fn lecture_allocation_needs_a_classroom() {
        let mut lecture = lab();
        lecture.class_type = ClassType::Lecture;
        lecture.class_room_numbers.clear();
        assert!(lecture.validate().is_err());
    }

    #[test]
    fn blank_semester_is_rejected() {
        let mut allocation = lab();
        allocation.semester = String::new();
        assert_eq!(
            allocation.validate(),
            Err(AttendanceError::MissingField("semester"))
        );
    }
}
