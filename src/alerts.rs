use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use uuid::Uuid;

use crate::models::{
    AlertDateRange, AlertRecord, AlertReport, AlertSeverity, AlertSummary, AttendanceRecord,
    ClassType, DateRange, LowAttendanceAlert, SlotDefinition, SlotDetails,
};
use crate::rates;

pub const LAB_THRESHOLD: f64 = 70.0;
pub const LECTURE_THRESHOLD: f64 = 75.0;
/// Points below the threshold at which a warning becomes critical.
pub const CRITICAL_MARGIN: f64 = 10.0;

struct AlertGroup<'a> {
    slot: &'a SlotDefinition,
    records: Vec<&'a AttendanceRecord>,
    slot_ids: BTreeSet<Uuid>,
}

pub fn threshold_for(class_type: ClassType) -> f64 {
    match class_type {
        ClassType::Lab => LAB_THRESHOLD,
        ClassType::Lecture => LECTURE_THRESHOLD,
    }
}

/// `None` when the average meets the threshold.
pub fn classify(average: f64, threshold: f64) -> Option<AlertSeverity> {
    if average >= threshold {
        None
    } else if average < threshold - CRITICAL_MARGIN {
        Some(AlertSeverity::Critical)
    } else {
        Some(AlertSeverity::Warning)
    }
}

pub fn group_key(slot: &SlotDefinition) -> String {
    format!(
        "{}|{}|{}|{}",
        slot.subject_name,
        slot.faculty_name,
        slot.class_type,
        slot.group_name().unwrap_or("N/A")
    )
}

/// Groups records across time slots by subject, faculty, class type and
/// batch/division. Records without a joined slot are skipped.
pub fn compute_low_attendance_alerts(records: &[AttendanceRecord]) -> AlertReport {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<AlertGroup<'_>> = Vec::new();

    for record in records {
        let Some(slot) = record.slot.as_ref() else {
            continue;
        };

        let position = *index.entry(group_key(slot)).or_insert_with(|| {
            groups.push(AlertGroup {
                slot,
                records: Vec::new(),
                slot_ids: BTreeSet::new(),
            });
            groups.len() - 1
        });

        let group = &mut groups[position];
        group.records.push(record);
        group.slot_ids.insert(record.slot_id);
    }

    let mut alerts: Vec<LowAttendanceAlert> = groups.iter().filter_map(evaluate_group).collect();

    alerts.sort_by(|a, b| {
        a.alert_severity
            .rank()
            .cmp(&b.alert_severity.rank())
            .then_with(|| {
                a.average_attendance_percentage
                    .partial_cmp(&b.average_attendance_percentage)
                    .unwrap_or(Ordering::Equal)
            })
    });

    AlertReport {
        summary: summarize(&alerts),
        alerts,
    }
}

impl AlertReport {
    pub fn with_date_range(mut self, range: Option<DateRange>) -> Self {
        self.summary.date_range = range.map(|range| AlertDateRange {
            from: range.start,
            to: range.end,
        });
        self
    }
}

fn evaluate_group(group: &AlertGroup<'_>) -> Option<LowAttendanceAlert> {
    let total_present: i64 = group
        .records
        .iter()
        .map(|record| i64::from(record.present_count))
        .sum();
    let total_possible: i64 = group
        .records
        .iter()
        .map(|record| i64::from(record.total_students))
        .sum();
    let average = rates::percentage(total_present, total_possible);
    let threshold = threshold_for(group.slot.class_type);
    let severity = classify(average, threshold)?;

    let mut records: Vec<AlertRecord> = group.records.iter().map(|r| alert_record(r)).collect();
    records.sort_by(|a, b| b.date.cmp(&a.date));

    Some(LowAttendanceAlert {
        subject_name: group.slot.subject_name.clone(),
        faculty_name: group.slot.faculty_name.clone(),
        class_type: group.slot.class_type,
        batch_name: group.slot.batch_name.clone(),
        division_name: group.slot.division_name.clone(),
        capacity: group.slot.capacity,
        average_attendance_percentage: rates::round2(average),
        threshold,
        total_classes: group.records.len(),
        total_present,
        total_possible,
        total_time_slots: group.slot_ids.len(),
        alert_severity: severity,
        records,
    })
}

fn alert_record(record: &AttendanceRecord) -> AlertRecord {
    AlertRecord {
        date: record.date,
        present_count: record.present_count,
        absent_count: record.absent_count,
        total_students: record.total_students,
        attendance_percentage: rates::round2(rates::record_percentage(record)),
        remarks: record.remarks.clone(),
        slot_details: record.slot.as_ref().map(|slot| SlotDetails {
            start_time: slot.start_time.clone(),
            end_time: slot.end_time.clone(),
            day_of_week: slot.day_of_week.clone(),
        }),
    }
}

fn summarize(alerts: &[LowAttendanceAlert]) -> AlertSummary {
    let with_severity = |severity: AlertSeverity| {
        alerts
            .iter()
            .filter(|alert| alert.alert_severity == severity)
            .count()
    };
    let with_class_type = |class_type: ClassType| {
        alerts
            .iter()
            .filter(|alert| alert.class_type == class_type)
            .count()
    };

    AlertSummary {
        total_alerts_count: alerts.len(),
        critical_count: with_severity(AlertSeverity::Critical),
        warning_count: with_severity(AlertSeverity::Warning),
        lab_alerts_count: with_class_type(ClassType::Lab),
        lecture_alerts_count: with_class_type(ClassType::Lecture),
        date_range: None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn lab(subject: &str, faculty: &str, batch: &str) -> SlotDefinition {
        SlotDefinition {
            id: Uuid::new_v4(),
            slot_name: "Lab 101".to_string(),
            subject_name: subject.to_string(),
            faculty_name: faculty.to_string(),
            class_type: ClassType::Lab,
            batch_name: Some(batch.to_string()),
            division_name: None,
            capacity: 20,
            start_time: "09:30".to_string(),
            end_time: "11:30".to_string(),
            day_of_week: "Monday".to_string(),
        }
    }

    fn lecture(subject: &str, faculty: &str) -> SlotDefinition {
        SlotDefinition {
            id: Uuid::new_v4(),
            slot_name: "Room 12".to_string(),
            subject_name: subject.to_string(),
            faculty_name: faculty.to_string(),
            class_type: ClassType::Lecture,
            batch_name: None,
            division_name: Some("Division 1".to_string()),
            capacity: 60,
            start_time: "12:30".to_string(),
            end_time: "13:30".to_string(),
            day_of_week: "Wednesday".to_string(),
        }
    }

    fn record(
        slot: &SlotDefinition,
        date: NaiveDate,
        present: i32,
        total: i32,
    ) -> AttendanceRecord {
        AttendanceRecord {
            id: Uuid::new_v4(),
            slot_id: slot.id,
            date,
            present_count: present,
            absent_count: total - present,
            total_students: total,
            attendance_percentage: rates::percentage(present.into(), total.into()),
            remarks: None,
            slot: Some(slot.clone()),
        }
    }

    #[test]
    fn thresholds_follow_class_type() {
        assert_eq!(threshold_for(ClassType::Lab), 70.0);
        assert_eq!(threshold_for(ClassType::Lecture), 75.0);
        assert_eq!(threshold_for(ClassType::default()), 75.0);
    }

    #[test]
    fn classification_tiers() {
        assert_eq!(classify(75.0, 75.0), None);
        assert_eq!(classify(80.0, 75.0), None);
        assert_eq!(classify(74.99, 75.0), Some(AlertSeverity::Warning));
        assert_eq!(classify(65.0, 75.0), Some(AlertSeverity::Warning));
        assert_eq!(classify(64.99, 75.0), Some(AlertSeverity::Critical));
        assert_eq!(classify(59.0, 70.0), Some(AlertSeverity::Critical));
    }

    #[test]
    fn healthy_lab_raises_no_alert() {
        let slot = lab("DS", "F1", "B1");
        let report = compute_low_attendance_alerts(&[record(&slot, day(5), 18, 20)]);
        assert!(report.alerts.is_empty());
        assert_eq!(report.summary.total_alerts_count, 0);
    }

    #[test]
    fn low_lab_group_is_critical() {
        let slot = lab("DS", "F1", "B1");
        let records = vec![record(&slot, day(5), 10, 20), record(&slot, day(12), 8, 20)];

        let report = compute_low_attendance_alerts(&records);
        assert_eq!(report.alerts.len(), 1);
        let alert = &report.alerts[0];
        assert_eq!(alert.average_attendance_percentage, 45.0);
        assert_eq!(alert.alert_severity, AlertSeverity::Critical);
        assert_eq!(alert.threshold, 70.0);
        assert_eq!(alert.total_classes, 2);
        assert_eq!(alert.total_present, 18);
        assert_eq!(alert.total_possible, 40);
        assert_eq!(alert.total_time_slots, 1);
        assert_eq!(alert.capacity, 20);
        assert_eq!(alert.records[0].date, day(12));
        assert_eq!(alert.records[1].date, day(5));
    }

    #[test]
    fn groups_merge_slots_sharing_batch() {
        let monday = lab("DS", "F1", "B1");
        let mut thursday = lab("DS", "F1", "B1");
        thursday.day_of_week = "Thursday".to_string();
        let other_batch = lab("DS", "F1", "B2");

        let records = vec![
            record(&monday, day(5), 10, 20),
            record(&thursday, day(8), 11, 20),
            record(&other_batch, day(5), 9, 20),
        ];

        let report = compute_low_attendance_alerts(&records);
        assert_eq!(report.alerts.len(), 2);
        let merged = report
            .alerts
            .iter()
            .find(|alert| alert.batch_name.as_deref() == Some("B1"))
            .unwrap();
        assert_eq!(merged.total_time_slots, 2);
        assert_eq!(merged.total_classes, 2);
        let details = merged.records[0].slot_details.as_ref().unwrap();
        assert_eq!(details.day_of_week, "Thursday");
    }

    #[test]
    fn lecture_exactly_at_threshold_is_excluded() {
        let slot = lecture("Maths", "F3");
        let report = compute_low_attendance_alerts(&[record(&slot, day(7), 45, 60)]);
        assert!(report.alerts.is_empty());
    }

    #[test]
    fn lecture_just_below_threshold_is_warning() {
        let slot = lecture("Maths", "F3");
        let report = compute_low_attendance_alerts(&[record(&slot, day(7), 7499, 10000)]);
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].alert_severity, AlertSeverity::Warning);
        assert_eq!(report.alerts[0].average_attendance_percentage, 74.99);
        assert_eq!(report.summary.warning_count, 1);
        assert_eq!(report.summary.lecture_alerts_count, 1);
    }

    #[test]
    fn critical_sorts_before_warning() {
        let warning_slot = lecture("Physics", "F4");
        let critical_slot = lecture("Chemistry", "F5");
        let worse_warning = lab("Networks", "F6", "B3");
        let records = vec![
            record(&warning_slot, day(2), 74, 100),
            record(&critical_slot, day(2), 50, 100),
            record(&worse_warning, day(2), 12, 20),
        ];

        let report = compute_low_attendance_alerts(&records);
        let order: Vec<(&str, AlertSeverity)> = report
            .alerts
            .iter()
            .map(|alert| (alert.subject_name.as_str(), alert.alert_severity))
            .collect();
        assert_eq!(
            order,
            vec![
                ("Chemistry", AlertSeverity::Critical),
                ("Networks", AlertSeverity::Warning),
                ("Physics", AlertSeverity::Warning),
            ]
        );
        assert_eq!(report.summary.critical_count, 1);
        assert_eq!(report.summary.warning_count, 2);
        assert_eq!(report.summary.lab_alerts_count, 1);
        assert_eq!(report.summary.lecture_alerts_count, 2);
    }

    #[test]
    fn records_without_slot_are_skipped() {
        let slot = lab("DS", "F1", "B1");
        let mut orphan = record(&slot, day(3), 0, 20);
        orphan.slot = None;

        let report = compute_low_attendance_alerts(&[orphan, record(&slot, day(4), 19, 20)]);
        assert!(report.alerts.is_empty());
    }

    #[test]
    fn missing_batch_and_division_share_fallback_key() {
        let mut slot = lecture("Maths", "F3");
        slot.division_name = None;
        assert_eq!(group_key(&slot), "Maths|F3|LECTURE|N/A");
    }

    #[test]
    fn date_range_is_echoed_in_summary() {
        let range = DateRange {
            start: day(1),
            end: day(31),
        };
        let report = compute_low_attendance_alerts(&[]).with_date_range(Some(range));
        let echoed = report.summary.date_range.unwrap();
        assert_eq!(echoed.from, day(1));
        assert_eq!(echoed.to, day(31));
    }
}
