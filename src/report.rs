use std::fmt::Write;

use crate::alerts;
use crate::models::{AttendanceRecord, DateRange};
use crate::stats;

pub fn build_report(range: Option<DateRange>, records: &[AttendanceRecord]) -> String {
    let statistics = stats::compute_statistics(records);
    let alert_report = alerts::compute_low_attendance_alerts(records);

    let mut output = String::new();
    let window_label = range
        .map(|range| range.to_string())
        .unwrap_or_else(|| "all recorded dates".to_string());

    let _ = writeln!(output, "# Attendance Report");
    let _ = writeln!(output, "Generated for {}", window_label);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");

    let summary = &statistics.summary;
    if summary.total_records == 0 {
        let _ = writeln!(output, "No attendance recorded for this window.");
        return output;
    }

    let _ = writeln!(
        output,
        "- {} classes, {} present / {} absent of {} seats",
        summary.total_records, summary.total_present, summary.total_absent, summary.total_students
    );
    let _ = writeln!(
        output,
        "- Average attendance {:.2}%",
        summary.average_attendance_rate
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## By Subject");
    for row in &statistics.subject_distribution {
        let _ = writeln!(
            output,
            "- {}: {:.2}% ({} / {})",
            row.subject, row.attendance_rate, row.present_count, row.total_students
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## By Faculty");
    for row in &statistics.faculty_distribution {
        let _ = writeln!(
            output,
            "- {}: {:.2}% ({} / {})",
            row.faculty, row.attendance_rate, row.present_count, row.total_students
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Daily Trend");
    for row in &statistics.daily_trend {
        let _ = writeln!(
            output,
            "- {}: {:.2}% ({} / {})",
            row.date, row.attendance_rate, row.present_count, row.total_students
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Low Attendance Alerts");

    if alert_report.alerts.is_empty() {
        let _ = writeln!(output, "All groups are at or above their thresholds.");
    } else {
        let _ = writeln!(
            output,
            "{} critical, {} warning",
            alert_report.summary.critical_count, alert_report.summary.warning_count
        );
        for alert in &alert_report.alerts {
            let group = alert.group_name().unwrap_or("N/A");
            let _ = writeln!(
                output,
                "- [{}] {} ({}, {} {}) {:.2}% vs {:.0}% across {} classes in {} slots",
                alert.alert_severity,
                alert.subject_name,
                alert.faculty_name,
                alert.class_type,
                group,
                alert.average_attendance_percentage,
                alert.threshold,
                alert.total_classes,
                alert.total_time_slots
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;
    use crate::models::{ClassType, SlotDefinition};

    fn record(subject: &str, class_type: ClassType, present: i32, total: i32) -> AttendanceRecord {
        let slot = SlotDefinition {
            id: Uuid::new_v4(),
            slot_name: "Lab 204".to_string(),
            subject_name: subject.to_string(),
            faculty_name: "Dr. Rao".to_string(),
            class_type,
            batch_name: Some("Batch C".to_string()),
            division_name: None,
            capacity: total,
            start_time: "09:30".to_string(),
            end_time: "11:30".to_string(),
            day_of_week: "Monday".to_string(),
        };
        AttendanceRecord {
            id: Uuid::new_v4(),
            slot_id: slot.id,
            date: NaiveDate::from_ymd_opt(2026, 2, 9).unwrap(),
            present_count: present,
            absent_count: total - present,
            total_students: total,
            attendance_percentage: 0.0,
            remarks: None,
            slot: Some(slot),
        }
    }

    #[test]
    fn empty_window_says_so() {
        let report = build_report(None, &[]);
        assert!(report.contains("Generated for all recorded dates"));
        assert!(report.contains("No attendance recorded for this window."));
        assert!(!report.contains("## By Subject"));
    }

    #[test]
    fn report_lists_sections_and_alerts() {
        let range = DateRange {
            start: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2026, 2, 28).unwrap(),
        };
        let records = vec![record("Compilers", ClassType::Lab, 8, 20)];

        let report = build_report(Some(range), &records);
        assert!(report.contains("Generated for 2026-02-01 to 2026-02-28"));
        assert!(report.contains("- Compilers: 40.00% (8 / 20)"));
        assert!(report.contains("- 2026-02-09: 40.00% (8 / 20)"));
        assert!(report.contains("1 critical, 0 warning"));
        assert!(report.contains("[critical] Compilers (Dr. Rao, LAB Batch C) 40.00% vs 70%"));
    }

    #[test]
    fn empty_batch_labels_alert_by_division() {
        let mut lecture = record("Compilers", ClassType::Lecture, 20, 60);
        if let Some(slot) = lecture.slot.as_mut() {
            slot.batch_name = Some(String::new());
            slot.division_name = Some("Division 3".to_string());
        }

        let report = build_report(None, &[lecture]);
        assert!(report.contains("(Dr. Rao, LECTURE Division 3)"));
    }

    #[test]
    fn healthy_groups_have_no_alerts() {
        let records = vec![record("Compilers", ClassType::Lecture, 55, 60)];
        let report = build_report(None, &records);
        assert!(report.contains("All groups are at or above their thresholds."));
    }
}
