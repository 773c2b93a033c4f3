use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::{Duration, Months, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

mod alerts;
mod allocations;
mod config;
mod db;
mod error;
mod models;
mod rates;
mod report;
mod slots;
mod stats;

use models::{ClassType, DateRange, RecordQuery, SlotHistoryRow, StatisticsFilter};

#[derive(Parser)]
#[command(name = "attendance-tracker")]
#[command(about = "Classroom and lab attendance tracking with low-attendance alerts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Copy)]
struct Window {
    /// First day of the window (YYYY-MM-DD)
    #[arg(long, requires = "end_date")]
    start_date: Option<NaiveDate>,
    /// Last day of the window, inclusive
    #[arg(long, requires = "start_date")]
    end_date: Option<NaiveDate>,
}

impl Window {
    fn range(&self) -> anyhow::Result<Option<DateRange>> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if start > end => {
                bail!("start date {start} is after end date {end}")
            }
            (Some(start), Some(end)) => Ok(Some(DateRange { start, end })),
            _ => Ok(None),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a sample timetable and two weeks of attendance
    Seed,
    /// Import slots and attendance from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Add or update a timetable slot
    AddSlot {
        #[arg(long)]
        name: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        faculty: String,
        #[arg(long, value_parser = parse_class_type, default_value = "LECTURE")]
        class_type: ClassType,
        /// Defaults to 60 for lectures, 20 for labs (40 for labs 638 and 515)
        #[arg(long)]
        capacity: Option<i32>,
        #[arg(long)]
        batch: Option<String>,
        #[arg(long)]
        division: Option<String>,
        #[arg(long)]
        start_time: String,
        #[arg(long)]
        end_time: String,
        #[arg(long)]
        day: String,
    },
    /// List active slots
    Slots {
        #[arg(long)]
        json: bool,
    },
    /// Deactivate a slot, keeping its attendance history
    DeactivateSlot {
        #[arg(long)]
        id: Uuid,
    },
    /// Record a day's attendance for a slot
    Record {
        #[arg(long)]
        slot: Uuid,
        #[arg(long)]
        present: i32,
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        remarks: Option<String>,
    },
    /// Attendance statistics, optionally filtered
    Stats {
        #[command(flatten)]
        window: Window,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        faculty: Option<String>,
        #[arg(long)]
        start_time: Option<String>,
        #[arg(long)]
        end_time: Option<String>,
        /// Include best/worst day and per-record rows
        #[arg(long)]
        detailed: bool,
        #[arg(long)]
        json: bool,
    },
    /// Groups below their attendance threshold
    Alerts {
        #[command(flatten)]
        window: Window,
        #[arg(long)]
        json: bool,
    },
    /// Every slot's attendance for one day
    Attendance {
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },
    /// Register a faculty member, or update their department
    AddFaculty {
        #[arg(long)]
        name: String,
        #[arg(long)]
        department: String,
    },
    /// List registered faculty
    Faculties {
        #[arg(long)]
        json: bool,
    },
    RemoveFaculty {
        #[arg(long)]
        id: Uuid,
    },
    /// Register a subject taught in a given year
    AddSubject {
        #[arg(long)]
        name: String,
        #[arg(long)]
        year: String,
    },
    /// List registered subjects
    Subjects {
        #[arg(long)]
        json: bool,
    },
    RemoveSubject {
        #[arg(long)]
        id: Uuid,
    },
    /// Allocate a subject to a faculty member for a semester and division
    Allocate {
        #[arg(long, value_parser = parse_class_type)]
        class_type: ClassType,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        faculty: String,
        #[arg(long)]
        semester: String,
        #[arg(long)]
        division: String,
        /// Required for labs
        #[arg(long)]
        batch: Option<String>,
        /// Comma-separated lab rooms, required for labs
        #[arg(long, value_delimiter = ',')]
        labs: Vec<String>,
        /// Comma-separated classrooms, required for lectures
        #[arg(long, value_delimiter = ',')]
        classrooms: Vec<String>,
    },
    /// List allocations by semester and subject
    Allocations {
        #[arg(long)]
        json: bool,
    },
    RemoveAllocation {
        #[arg(long)]
        id: Uuid,
    },
    /// Recent attendance for a single slot
    History {
        #[arg(long)]
        slot: Uuid,
        #[arg(long, default_value_t = 30)]
        days: i64,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        window: Window,
        #[arg(long, default_value = "attendance-report.md")]
        out: PathBuf,
    },
    /// Delete attendance older than the given number of years
    Prune {
        #[arg(long, default_value_t = 2)]
        years: u32,
    },
    /// Check that analytics see every stored attendance row
    VerifySync {
        #[arg(long)]
        json: bool,
    },
}

fn parse_class_type(value: &str) -> Result<ClassType, String> {
    match value.to_ascii_uppercase().as_str() {
        "LAB" => Ok(ClassType::Lab),
        "LECTURE" => Ok(ClassType::Lecture),
        other => Err(format!("unknown class type {other}, expected LAB or LECTURE")),
    }
}

/// The last `days` days up to and including `today`, at least one day back.
fn history_window(today: NaiveDate, days: i64) -> anyhow::Result<DateRange> {
    let start = Duration::try_days(days.max(1))
        .and_then(|span| today.checked_sub_signed(span))
        .context("history window out of range")?;
    Ok(DateRange { start, end: today })
}

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(config::log_json_enabled()?);
    let config = config::Config::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let imported = db::import_csv(&pool, &csv).await?;
            println!("Imported {imported} attendance rows from {}.", csv.display());
        }
        Commands::AddSlot {
            name,
            subject,
            faculty,
            class_type,
            capacity,
            batch,
            division,
            start_time,
            end_time,
            day,
        } => {
            let slot = db::NewSlot {
                slot_name: name,
                subject_name: subject,
                faculty_name: faculty,
                class_type,
                capacity,
                batch_name: batch,
                division_name: division,
                start_time,
                end_time,
                day_of_week: day,
            };
            let id = db::add_slot(&pool, &slot).await?;
            println!("Slot {} saved as {id}.", slot.slot_name);
        }
        Commands::Slots { json } => {
            let slots = db::list_slots(&pool).await?;
            if json {
                print_json(&slots)?;
            } else if slots.is_empty() {
                println!("No active slots.");
            } else {
                for slot in &slots {
                    println!(
                        "- {} {} {}-{} {} ({}, {}) {} capacity {} [{}]",
                        slot.day_of_week,
                        slot.slot_name,
                        slot.start_time,
                        slot.end_time,
                        slot.subject_name,
                        slot.faculty_name,
                        slot.class_type,
                        slot.group_name().unwrap_or("N/A"),
                        slot.capacity,
                        slot.id
                    );
                }
            }
        }
        Commands::DeactivateSlot { id } => {
            if db::deactivate_slot(&pool, id).await? {
                println!("Slot {id} deactivated.");
            } else {
                bail!("slot {id} not found");
            }
        }
        Commands::Record {
            slot,
            present,
            date,
            remarks,
        } => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let record = db::record_attendance(&pool, slot, date, present, remarks).await?;
            println!(
                "Recorded {} / {} ({:.2}%) for {} on {}.",
                record.present_count,
                record.total_students,
                record.attendance_percentage,
                record
                    .slot
                    .as_ref()
                    .map(|slot| slot.slot_name.as_str())
                    .unwrap_or("slot"),
                record.date
            );
        }
        Commands::Stats {
            window,
            subject,
            faculty,
            start_time,
            end_time,
            detailed,
            json,
        } => {
            let filter = StatisticsFilter {
                subject_name: subject,
                faculty_name: faculty,
                start_time: start_time.as_deref().map(slots::normalize_time).transpose()?,
                end_time: end_time.as_deref().map(slots::normalize_time).transpose()?,
                date_range: window.range()?,
            };
            let records = db::fetch_records(&pool, &RecordQuery::from(filter.clone())).await?;

            if detailed || filter.has_slot_filters() {
                let report = stats::compute_filtered_statistics(&records, &filter);
                if json {
                    print_json(&report)?;
                } else {
                    print_statistics(&report.statistics);
                    let trends = &report.trends;
                    if let (Some(best), Some(worst)) = (&trends.best_day, &trends.worst_day) {
                        println!(
                            "Best day {} at {:.2}%, worst day {} at {:.2}%",
                            best.date, best.attendance_rate, worst.date, worst.attendance_rate
                        );
                    }
                }
            } else {
                let report = stats::compute_statistics(&records);
                if json {
                    print_json(&report)?;
                } else {
                    print_statistics(&report);
                }
            }
        }
        Commands::Alerts { window, json } => {
            let range = window.range()?;
            let query = RecordQuery::from(StatisticsFilter {
                date_range: range,
                ..StatisticsFilter::default()
            });
            let records = db::fetch_records(&pool, &query).await?;
            let report = alerts::compute_low_attendance_alerts(&records).with_date_range(range);

            if json {
                print_json(&report)?;
            } else if report.alerts.is_empty() {
                println!("No groups below their attendance threshold.");
            } else {
                println!(
                    "{} alerts ({} critical, {} warning; {} lab, {} lecture):",
                    report.summary.total_alerts_count,
                    report.summary.critical_count,
                    report.summary.warning_count,
                    report.summary.lab_alerts_count,
                    report.summary.lecture_alerts_count
                );
                for alert in &report.alerts {
                    println!(
                        "- [{}] {} / {} ({}) {:.2}% below {:.0}% over {} classes",
                        alert.alert_severity,
                        alert.subject_name,
                        alert.faculty_name,
                        alert.class_type,
                        alert.average_attendance_percentage,
                        alert.threshold,
                        alert.total_classes
                    );
                }
            }
        }
        Commands::Attendance { date, json } => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let records = db::fetch_attendance_on(&pool, date).await?;
            let sheet = stats::attendance_sheet(&records);

            if json {
                print_json(&sheet)?;
            } else if sheet.is_empty() {
                println!("No attendance recorded on {date}.");
            } else {
                for row in &sheet {
                    println!(
                        "- {}-{} {} {} ({}): {} / {} ({:.2}%)",
                        row.start_time.as_deref().unwrap_or("--:--"),
                        row.end_time.as_deref().unwrap_or("--:--"),
                        row.slot_name.as_deref().unwrap_or("unknown slot"),
                        row.subject_name.as_deref().unwrap_or(stats::UNKNOWN),
                        row.faculty_name.as_deref().unwrap_or(stats::UNKNOWN),
                        row.present_count,
                        row.total_students,
                        row.attendance_rate
                    );
                }
            }
        }
        Commands::AddFaculty { name, department } => {
            let id = db::add_faculty(&pool, &name, &department).await?;
            println!("Faculty {name} saved as {id}.");
        }
        Commands::Faculties { json } => {
            let faculties = db::list_faculties(&pool).await?;
            if json {
                print_json(&faculties)?;
            } else if faculties.is_empty() {
                println!("No faculty registered.");
            } else {
                for faculty in &faculties {
                    println!("- {} ({}) [{}]", faculty.name, faculty.department, faculty.id);
                }
            }
        }
        Commands::RemoveFaculty { id } => {
            if !db::remove_faculty(&pool, id).await? {
                bail!("faculty {id} not found");
            }
            println!("Faculty {id} removed.");
        }
        Commands::AddSubject { name, year } => {
            let id = db::add_subject(&pool, &name, &year).await?;
            println!("Subject {name} ({year}) saved as {id}.");
        }
        Commands::Subjects { json } => {
            let subjects = db::list_subjects(&pool).await?;
            if json {
                print_json(&subjects)?;
            } else if subjects.is_empty() {
                println!("No subjects registered.");
            } else {
                for subject in &subjects {
                    println!("- {} {} [{}]", subject.year, subject.name, subject.id);
                }
            }
        }
        Commands::RemoveSubject { id } => {
            if !db::remove_subject(&pool, id).await? {
                bail!("subject {id} not found");
            }
            println!("Subject {id} removed.");
        }
        Commands::Allocate {
            class_type,
            subject,
            faculty,
            semester,
            division,
            batch,
            labs,
            classrooms,
        } => {
            let allocation = allocations::NewAllocation {
                class_type,
                subject_name: subject,
                faculty_name: faculty,
                semester,
                division,
                batch_name: batch,
                lab_numbers: labs,
                class_room_numbers: classrooms,
            };
            let id = db::add_allocation(&pool, allocation).await?;
            println!("Allocation saved as {id}.");
        }
        Commands::Allocations { json } => {
            let allocations = db::list_allocations(&pool).await?;
            if json {
                print_json(&allocations)?;
            } else if allocations.is_empty() {
                println!("No allocations.");
            } else {
                for allocation in &allocations {
                    let rooms = match allocation.class_type {
                        ClassType::Lab => &allocation.lab_numbers,
                        ClassType::Lecture => &allocation.class_room_numbers,
                    };
                    println!(
                        "- {} {} / {} ({} {}{}) rooms {} [{}]",
                        allocation.semester,
                        allocation.subject_name,
                        allocation.faculty_name,
                        allocation.class_type,
                        allocation.division,
                        allocation
                            .batch_name
                            .as_deref()
                            .map(|batch| format!(" {batch}"))
                            .unwrap_or_default(),
                        rooms.join(", "),
                        allocation.id
                    );
                }
            }
        }
        Commands::RemoveAllocation { id } => {
            if !db::remove_allocation(&pool, id).await? {
                bail!("allocation {id} not found");
            }
            println!("Allocation {id} removed.");
        }
        Commands::History { slot, days, json } => {
            let today = Utc::now().date_naive();
            let query = RecordQuery {
                filter: StatisticsFilter {
                    date_range: Some(history_window(today, days)?),
                    ..StatisticsFilter::default()
                },
                slot_id: Some(slot),
            };
            let history: Vec<SlotHistoryRow> = db::fetch_records(&pool, &query)
                .await?
                .iter()
                .map(|record| SlotHistoryRow {
                    date: record.date,
                    present_count: record.present_count,
                    absent_count: record.absent_count,
                    total_students: record.total_students,
                    attendance_rate: rates::round2(rates::record_percentage(record)),
                    remarks: record.remarks.clone(),
                })
                .collect();

            if json {
                print_json(&history)?;
            } else if history.is_empty() {
                println!("No attendance for slot {slot} in the last {days} days.");
            } else {
                for row in &history {
                    println!(
                        "- {}: {} / {} ({:.2}%){}",
                        row.date,
                        row.present_count,
                        row.total_students,
                        row.attendance_rate,
                        row.remarks
                            .as_deref()
                            .map(|remarks| format!(" {remarks}"))
                            .unwrap_or_default()
                    );
                }
            }
        }
        Commands::Report { window, out } => {
            let range = window.range()?;
            let query = RecordQuery::from(StatisticsFilter {
                date_range: range,
                ..StatisticsFilter::default()
            });
            let records = db::fetch_records(&pool, &query).await?;
            let report = report::build_report(range, &records);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Prune { years } => {
            let cutoff = Utc::now()
                .date_naive()
                .checked_sub_months(Months::new(years.saturating_mul(12)))
                .context("retention window out of range")?;
            let deleted = db::prune_before(&pool, cutoff).await?;
            println!("Deleted {deleted} attendance rows before {cutoff}.");
        }
        Commands::VerifySync { json } => {
            let counts = db::database_counts(&pool).await?;
            let records = db::fetch_records(&pool, &RecordQuery::default()).await?;
            let sync = stats::build_sync_report(counts, &records);
            info!(
                status = ?sync.sync_status,
                orphaned = sync.database.orphaned_records,
                "sync verified"
            );

            if json {
                print_json(&sync)?;
            } else {
                println!("{}", sync.message);
                println!(
                    "{} active slots, {} attendance rows ({} linked), {} subjects across {} days",
                    sync.database.active_slots,
                    sync.database.total_records,
                    sync.database.linked_records,
                    sync.analytics.subjects_tracked,
                    sync.analytics.days_with_data
                );
                if let Some(latest) = &sync.latest_record {
                    println!(
                        "Latest entry {}: {} / {} for {}",
                        latest.date,
                        latest.present_count,
                        latest.total_students,
                        latest.subject.as_deref().unwrap_or(stats::UNKNOWN)
                    );
                }
            }
        }
    }

    Ok(())
}

fn print_statistics(report: &models::StatisticsReport) {
    let summary = &report.summary;
    if summary.total_records == 0 {
        println!("No attendance recorded for this window.");
        return;
    }

    println!(
        "{} classes, {} present of {} ({:.2}% average)",
        summary.total_records,
        summary.total_present,
        summary.total_students,
        summary.average_attendance_rate
    );
    println!("By subject:");
    for row in &report.subject_distribution {
        println!("- {}: {:.2}%", row.subject, row.attendance_rate);
    }
    println!("By faculty:");
    for row in &report.faculty_distribution {
        println!("- {}: {:.2}%", row.faculty, row.attendance_rate);
    }
    println!("Daily trend:");
    for row in &report.daily_trend {
        println!("- {}: {:.2}%", row.date, row.attendance_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_type_flag_is_case_insensitive() {
        assert_eq!(parse_class_type("lab"), Ok(ClassType::Lab));
        assert_eq!(parse_class_type("Lecture"), Ok(ClassType::Lecture));
        assert!(parse_class_type("seminar").is_err());
    }

    #[test]
    fn window_requires_ordered_dates() {
        let start = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let window = Window {
            start_date: Some(start),
            end_date: Some(end),
        };
        assert!(window.range().is_err());

        let window = Window {
            start_date: Some(end),
            end_date: Some(start),
        };
        assert_eq!(
            window.range().unwrap(),
            Some(DateRange { start: end, end: start })
        );
    }

    #[test]
    fn cli_parses_stats_filters() {
        let cli = Cli::try_parse_from([
            "attendance-tracker",
            "stats",
            "--start-date",
            "2026-02-01",
            "--end-date",
            "2026-02-28",
            "--subject",
            "Data Structures",
        ])
        .unwrap();
        match cli.command {
            Commands::Stats { window, subject, .. } => {
                assert!(window.range().unwrap().is_some());
                assert_eq!(subject.as_deref(), Some("Data Structures"));
            }
            _ => panic!("expected stats command"),
        }
    }

    #[test]
    fn history_window_spans_requested_days() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
        let window = history_window(today, 30).unwrap();
        assert_eq!(window.start, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert_eq!(window.end, today);

        assert_eq!(
            history_window(today, 0).unwrap().start,
            NaiveDate::from_ymd_opt(2026, 3, 30).unwrap()
        );
    }

    #[test]
    fn oversized_history_window_is_an_error() {
        let cli = Cli::try_parse_from([
            "attendance-tracker",
            "history",
            "--slot",
            "6f1c2b1e-8a4e-4c3b-9d2a-1f0e5c7b9a11",
            "--days",
            "100000000",
        ])
        .unwrap();
        let Commands::History { days, .. } = cli.command else {
            panic!("expected history command");
        };

        let today = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
        assert!(history_window(today, days).is_err());
        assert!(history_window(today, i64::MAX).is_err());
    }

    #[test]
    fn allocate_splits_room_lists() {
        let cli = Cli::try_parse_from([
            "attendance-tracker",
            "allocate",
            "--class-type",
            "lab",
            "--subject",
            "Data Structures",
            "--faculty",
            "Dr. Kulkarni",
            "--semester",
            "SEM 3",
            "--division",
            "A",
            "--batch",
            "A1",
            "--labs",
            "638,515",
        ])
        .unwrap();
        match cli.command {
            Commands::Allocate {
                class_type,
                labs,
                classrooms,
                ..
            } => {
                assert_eq!(class_type, ClassType::Lab);
                assert_eq!(labs, vec!["638", "515"]);
                assert!(classrooms.is_empty());
            }
            _ => panic!("expected allocate command"),
        }
    }

    #[test]
    fn attendance_date_is_optional() {
        let cli = Cli::try_parse_from(["attendance-tracker", "attendance"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Attendance { date: None, json: false }
        ));
    }

    #[test]
    fn cli_rejects_half_open_window() {
        let result =
            Cli::try_parse_from(["attendance-tracker", "alerts", "--start-date", "2026-02-01"]);
        assert!(result.is_err());
    }
}
