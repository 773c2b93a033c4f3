use crate::models::{
    AnalyticsCoverage, AppliedFilters, AttendanceRecord, AttendanceTrends, DailyRecordRow,
    DailyTrendRow, DatabaseCounts, DayHighlight, FacultyRow, FilteredStatisticsReport,
    LatestRecord, StatisticsFilter, StatisticsReport, StatisticsSummary, SubjectRow,
    SyncIntegrity, SyncReport, SyncStatus,
};
use crate::rates::{self, Bucket, Buckets};

pub const UNKNOWN: &str = "Unknown";

pub fn compute_statistics(records: &[AttendanceRecord]) -> StatisticsReport {
    let mut grand = Bucket::default();
    let mut subjects = Buckets::default();
    let mut faculties = Buckets::default();
    let mut days = Buckets::default();

    for record in records {
        grand.add(record);

        let slot = record.slot.as_ref();
        subjects.add(known_or_unknown(slot.map(|s| s.subject_name.as_str())), record);
        faculties.add(known_or_unknown(slot.map(|s| s.faculty_name.as_str())), record);
        days.add(&record.date.format("%Y-%m-%d").to_string(), record);
    }

    let subject_distribution = subjects
        .into_entries()
        .into_iter()
        .map(|(subject, bucket)| SubjectRow {
            subject,
            present_count: bucket.present,
            absent_count: bucket.absent,
            total_students: bucket.total,
            attendance_rate: bucket.rate(),
        })
        .collect();

    let faculty_distribution = faculties
        .into_entries()
        .into_iter()
        .map(|(faculty, bucket)| FacultyRow {
            faculty,
            present_count: bucket.present,
            absent_count: bucket.absent,
            total_students: bucket.total,
            attendance_rate: bucket.rate(),
        })
        .collect();

    let mut daily_trend: Vec<DailyTrendRow> = days
        .into_entries()
        .into_iter()
        .map(|(date, bucket)| DailyTrendRow {
            date,
            present_count: bucket.present,
            absent_count: bucket.absent,
            total_students: bucket.total,
            attendance_rate: bucket.rate(),
        })
        .collect();
    daily_trend.sort_by(|a, b| a.date.cmp(&b.date));

    StatisticsReport {
        summary: StatisticsSummary {
            total_records: records.len(),
            total_present: grand.present,
            total_absent: grand.absent,
            total_students: grand.total,
            average_attendance_rate: grand.rate(),
        },
        subject_distribution,
        faculty_distribution,
        daily_trend,
    }
}

fn known_or_unknown(name: Option<&str>) -> &str {
    name.filter(|name| !name.is_empty()).unwrap_or(UNKNOWN)
}

pub fn compute_filtered_statistics(
    records: &[AttendanceRecord],
    filter: &StatisticsFilter,
) -> FilteredStatisticsReport {
    let selected: Vec<AttendanceRecord> = records
        .iter()
        .filter(|record| filter.matches(record))
        .cloned()
        .collect();

    let daily_records = selected.iter().map(daily_record_row).collect();

    FilteredStatisticsReport {
        filters: describe_filters(filter),
        statistics: compute_statistics(&selected),
        trends: AttendanceTrends {
            best_day: best_day(&selected).map(highlight),
            worst_day: worst_day(&selected).map(highlight),
        },
        daily_records,
    }
}

/// Highest individual percentage; ties go to the earliest date, then input order.
pub fn best_day(records: &[AttendanceRecord]) -> Option<&AttendanceRecord> {
    pick_extreme(records, |candidate, current| candidate > current)
}

/// Lowest individual percentage; ties go to the earliest date, then input order.
pub fn worst_day(records: &[AttendanceRecord]) -> Option<&AttendanceRecord> {
    pick_extreme(records, |candidate, current| candidate < current)
}

fn pick_extreme(
    records: &[AttendanceRecord],
    beats: impl Fn(f64, f64) -> bool,
) -> Option<&AttendanceRecord> {
    let mut chosen: Option<(&AttendanceRecord, f64)> = None;

    for record in records {
        let value = rates::record_percentage(record);
        chosen = match chosen {
            None => Some((record, value)),
            Some((current, current_value)) => {
                if beats(value, current_value)
                    || (value == current_value && record.date < current.date)
                {
                    Some((record, value))
                } else {
                    Some((current, current_value))
                }
            }
        };
    }

    chosen.map(|(record, _)| record)
}

fn highlight(record: &AttendanceRecord) -> DayHighlight {
    DayHighlight {
        date: record.date,
        attendance_rate: rates::round2(rates::record_percentage(record)),
        present_count: record.present_count,
        total_students: record.total_students,
    }
}

/// One day's rows ordered by slot start time; rows without a slot come last.
pub fn attendance_sheet(records: &[AttendanceRecord]) -> Vec<DailyRecordRow> {
    let mut rows: Vec<DailyRecordRow> = records.iter().map(daily_record_row).collect();
    rows.sort_by_key(|row| {
        (
            row.start_time.is_none(),
            row.start_time.clone(),
            row.slot_name.clone(),
        )
    });
    rows
}

fn daily_record_row(record: &AttendanceRecord) -> DailyRecordRow {
    let slot = record.slot.as_ref();
    DailyRecordRow {
        id: record.id,
        date: record.date,
        slot_name: slot.map(|s| s.slot_name.clone()),
        subject_name: slot.map(|s| s.subject_name.clone()),
        faculty_name: slot.map(|s| s.faculty_name.clone()),
        start_time: slot.map(|s| s.start_time.clone()),
        end_time: slot.map(|s| s.end_time.clone()),
        present_count: record.present_count,
        absent_count: record.absent_count,
        total_students: record.total_students,
        attendance_rate: rates::round2(rates::record_percentage(record)),
        remarks: record.remarks.clone(),
    }
}

pub fn describe_filters(filter: &StatisticsFilter) -> AppliedFilters {
    let time_slot = match (&filter.start_time, &filter.end_time) {
        (Some(start), Some(end)) => format!("{start} - {end}"),
        _ => "All".to_string(),
    };

    AppliedFilters {
        subject_name: filter
            .subject_name
            .clone()
            .unwrap_or_else(|| "All".to_string()),
        faculty_name: filter
            .faculty_name
            .clone()
            .unwrap_or_else(|| "All".to_string()),
        time_slot,
        date_range: filter
            .date_range
            .map(|range| range.to_string())
            .unwrap_or_else(|| "All time".to_string()),
    }
}

/// Cross-checks store counts against what the aggregator sees in `records`.
pub fn build_sync_report(counts: DatabaseCounts, records: &[AttendanceRecord]) -> SyncReport {
    let statistics = compute_statistics(records);
    let sync_status = if counts.orphaned_records == 0 {
        SyncStatus::Synced
    } else {
        SyncStatus::Warning
    };
    let message = match sync_status {
        SyncStatus::Synced => {
            "All systems synced. Analytics reflect current database state.".to_string()
        }
        SyncStatus::Warning => format!(
            "Warning: {} attendance records have missing slot references",
            counts.orphaned_records
        ),
    };

    SyncReport {
        sync_status,
        integrity: SyncIntegrity {
            data_consistency: counts.total_records == statistics.summary.total_records as i64,
            relationships_intact: counts.orphaned_records == 0,
        },
        latest_record: latest_record(records),
        analytics: AnalyticsCoverage {
            total_records_processed: statistics.summary.total_records,
            subjects_tracked: statistics.subject_distribution.len(),
            faculties_tracked: statistics.faculty_distribution.len(),
            days_with_data: statistics.daily_trend.len(),
        },
        database: counts,
        message,
    }
}

/// Most recent attendance date; the last such record in input order wins.
fn latest_record(records: &[AttendanceRecord]) -> Option<LatestRecord> {
    records.iter().max_by_key(|record| record.date).map(|record| {
        let slot = record.slot.as_ref();
        LatestRecord {
            date: record.date,
            subject: slot.map(|s| s.subject_name.clone()),
            faculty: slot.map(|s| s.faculty_name.clone()),
            present_count: record.present_count,
            total_students: record.total_students,
        }
    })
}
