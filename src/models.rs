use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClassType {
    Lab,
    #[default]
    Lecture,
}

impl ClassType {
    /// Anything other than `LAB` is treated as a lecture.
    pub fn from_db(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("LAB") {
            ClassType::Lab
        } else {
            ClassType::Lecture
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassType::Lab => "LAB",
            ClassType::Lecture => "LECTURE",
        }
    }
}

impl fmt::Display for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotDefinition {
    pub id: Uuid,
    pub slot_name: String,
    pub subject_name: String,
    pub faculty_name: String,
    pub class_type: ClassType,
    pub batch_name: Option<String>,
    pub division_name: Option<String>,
    pub capacity: i32,
    pub start_time: String,
    pub end_time: String,
    pub day_of_week: String,
}

impl SlotDefinition {
    /// Batch for labs, division for lectures.
    pub fn group_name(&self) -> Option<&str> {
        group_label(self.batch_name.as_deref(), self.division_name.as_deref())
    }
}

/// First non-empty of batch and division.
pub fn group_label<'a>(batch: Option<&'a str>, division: Option<&'a str>) -> Option<&'a str> {
    batch
        .filter(|name| !name.is_empty())
        .or(division.filter(|name| !name.is_empty()))
}

#[derive(Debug, Clone)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub date: NaiveDate,
    pub present_count: i32,
    pub absent_count: i32,
    pub total_students: i32,
    pub attendance_percentage: f64,
    pub remarks: Option<String>,
    pub slot: Option<SlotDefinition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatisticsFilter {
    pub subject_name: Option<String>,
    pub faculty_name: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub date_range: Option<DateRange>,
}

impl StatisticsFilter {
    pub fn has_slot_filters(&self) -> bool {
        self.subject_name.is_some()
            || self.faculty_name.is_some()
            || self.start_time.is_some()
            || self.end_time.is_some()
    }

    pub fn matches(&self, record: &AttendanceRecord) -> bool {
        if let Some(range) = &self.date_range {
            if !range.contains(record.date) {
                return false;
            }
        }

        if !self.has_slot_filters() {
            return true;
        }

        let Some(slot) = &record.slot else {
            return false;
        };

        equals_if_set(&self.subject_name, &slot.subject_name)
            && equals_if_set(&self.faculty_name, &slot.faculty_name)
            && equals_if_set(&self.start_time, &slot.start_time)
            && equals_if_set(&self.end_time, &slot.end_time)
    }
}

fn equals_if_set(filter: &Option<String>, value: &str) -> bool {
    filter.as_deref().map_or(true, |expected| expected == value)
}

/// Store-side query for attendance rows with the slot joined.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    pub filter: StatisticsFilter,
    pub slot_id: Option<Uuid>,
}

impl From<StatisticsFilter> for RecordQuery {
    fn from(filter: StatisticsFilter) -> Self {
        Self {
            filter,
            slot_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSummary {
    pub total_records: usize,
    pub total_present: i64,
    pub total_absent: i64,
    pub total_students: i64,
    pub average_attendance_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRow {
    pub subject: String,
    pub present_count: i64,
    pub absent_count: i64,
    pub total_students: i64,
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacultyRow {
    pub faculty: String,
    pub present_count: i64,
    pub absent_count: i64,
    pub total_students: i64,
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTrendRow {
    pub date: String,
    pub present_count: i64,
    pub absent_count: i64,
    pub total_students: i64,
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsReport {
    pub summary: StatisticsSummary,
    pub subject_distribution: Vec<SubjectRow>,
    pub faculty_distribution: Vec<FacultyRow>,
    pub daily_trend: Vec<DailyTrendRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFilters {
    pub subject_name: String,
    pub faculty_name: String,
    pub time_slot: String,
    pub date_range: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayHighlight {
    pub date: NaiveDate,
    pub attendance_rate: f64,
    pub present_count: i32,
    pub total_students: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceTrends {
    pub best_day: Option<DayHighlight>,
    pub worst_day: Option<DayHighlight>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRecordRow {
    pub id: Uuid,
    pub date: NaiveDate,
    pub slot_name: Option<String>,
    pub subject_name: Option<String>,
    pub faculty_name: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub present_count: i32,
    pub absent_count: i32,
    pub total_students: i32,
    pub attendance_rate: f64,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredStatisticsReport {
    pub filters: AppliedFilters,
    pub statistics: StatisticsReport,
    pub trends: AttendanceTrends,
    pub daily_records: Vec<DailyRecordRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    Warning,
}

impl AlertSeverity {
    /// Critical sorts first.
    pub fn rank(&self) -> u8 {
        match self {
            AlertSeverity::Critical => 0,
            AlertSeverity::Warning => 1,
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSeverity::Critical => f.write_str("critical"),
            AlertSeverity::Warning => f.write_str("warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotDetails {
    pub start_time: String,
    pub end_time: String,
    pub day_of_week: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    pub date: NaiveDate,
    pub present_count: i32,
    pub absent_count: i32,
    pub total_students: i32,
    pub attendance_percentage: f64,
    pub remarks: Option<String>,
    pub slot_details: Option<SlotDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowAttendanceAlert {
    pub subject_name: String,
    pub faculty_name: String,
    pub class_type: ClassType,
    pub batch_name: Option<String>,
    pub division_name: Option<String>,
    pub capacity: i32,
    pub average_attendance_percentage: f64,
    pub threshold: f64,
    pub total_classes: usize,
    pub total_present: i64,
    pub total_possible: i64,
    pub total_time_slots: usize,
    pub alert_severity: AlertSeverity,
    pub records: Vec<AlertRecord>,
}

impl LowAttendanceAlert {
    pub fn group_name(&self) -> Option<&str> {
        group_label(self.batch_name.as_deref(), self.division_name.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertDateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSummary {
    pub total_alerts_count: usize,
    pub critical_count: usize,
    pub warning_count: usize,
    pub lab_alerts_count: usize,
    pub lecture_alerts_count: usize,
    pub date_range: Option<AlertDateRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertReport {
    pub summary: AlertSummary,
    pub alerts: Vec<LowAttendanceAlert>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotHistoryRow {
    pub date: NaiveDate,
    pub present_count: i32,
    pub absent_count: i32,
    pub total_students: i32,
    pub attendance_rate: f64,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseCounts {
    pub active_slots: i64,
    pub total_records: i64,
    pub linked_records: i64,
    pub orphaned_records: i64,
    pub earliest: Option<NaiveDate>,
    pub latest: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Synced,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsCoverage {
    pub total_records_processed: usize,
    pub subjects_tracked: usize,
    pub faculties_tracked: usize,
    pub days_with_data: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestRecord {
    pub date: NaiveDate,
    pub subject: Option<String>,
    pub faculty: Option<String>,
    pub present_count: i32,
    pub total_students: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncIntegrity {
    pub data_consistency: bool,
    pub relationships_intact: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub sync_status: SyncStatus,
    pub database: DatabaseCounts,
    pub analytics: AnalyticsCoverage,
    pub latest_record: Option<LatestRecord>,
    pub integrity: SyncIntegrity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Faculty {
    pub id: Uuid,
    pub name: String,
    pub department: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: Uuid,
    pub name: String,
    pub year: String,
}

/// A faculty member's teaching assignment for a semester and division.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub class_type: ClassType,
    pub subject_name: String,
    pub faculty_name: String,
    pub semester: String,
    pub division: String,
    pub batch_name: Option<String>,
    pub lab_numbers: Vec<String>,
    pub class_room_numbers: Vec<String>,
}
