use anyhow::Context;
use chrono::{Duration, NaiveDate};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::allocations::NewAllocation;
use crate::models::{
    Allocation, AttendanceRecord, ClassType, DatabaseCounts, DateRange, Faculty, RecordQuery,
    SlotDefinition, StatisticsFilter, Subject,
};
use crate::slots;

const SLOT_COLUMNS: &str = "s.id AS joined_slot_id, s.slot_name, s.subject_name, \
     s.faculty_name, s.class_type, s.capacity, s.batch_name, s.division_name, \
     s.start_time, s.end_time, s.day_of_week";

#[derive(Debug, Clone)]
pub struct NewSlot {
    pub slot_name: String,
    pub subject_name: String,
    pub faculty_name: String,
    pub class_type: ClassType,
    pub capacity: Option<i32>,
    pub batch_name: Option<String>,
    pub division_name: Option<String>,
    pub start_time: String,
    pub end_time: String,
    pub day_of_week: String,
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let timetable = vec![
        (
            "Lab 638",
            "Data Structures",
            "Dr. Kulkarni",
            ClassType::Lab,
            Some("Batch A"),
            None,
            ("09:30", "11:30", "Monday"),
        ),
        (
            "Lab 204",
            "Data Structures",
            "Dr. Kulkarni",
            ClassType::Lab,
            Some("Batch B"),
            None,
            ("11:30", "13:30", "Monday"),
        ),
        (
            "Room 12",
            "Operating Systems",
            "Prof. Iyer",
            ClassType::Lecture,
            None,
            Some("Division 1"),
            ("10:30", "11:30", "Tuesday"),
        ),
        (
            "Room 14",
            "Computer Networks",
            "Prof. Shah",
            ClassType::Lecture,
            None,
            Some("Division 2"),
            ("14:30", "15:30", "Thursday"),
        ),
    ];

    let mut slot_ids = Vec::new();
    for (slot_name, subject, faculty, class_type, batch, division, (start, end, day)) in timetable
    {
        let slot = NewSlot {
            slot_name: slot_name.to_string(),
            subject_name: subject.to_string(),
            faculty_name: faculty.to_string(),
            class_type,
            capacity: None,
            batch_name: batch.map(str::to_string),
            division_name: division.map(str::to_string),
            start_time: start.to_string(),
            end_time: end.to_string(),
            day_of_week: day.to_string(),
        };
        slot_ids.push(add_slot(pool, &slot).await?);
    }

    // (slot index, days after the first Monday, present, remarks)
    let attendance = vec![
        (0, 0, 34, Some("Lab exam prep")),
        (0, 7, 31, None),
        (1, 0, 9, Some("Batch split across labs")),
        (1, 7, 11, None),
        (2, 1, 52, None),
        (2, 8, 47, None),
        (3, 3, 38, Some("Guest lecture clash")),
        (3, 10, 36, None),
    ];
    let first_monday = NaiveDate::from_ymd_opt(2026, 2, 2).context("invalid date")?;
    let record_count = attendance.len();

    for (slot_index, offset, present, remarks) in attendance {
        let date = first_monday + Duration::days(offset);
        record_attendance(
            pool,
            slot_ids[slot_index],
            date,
            present,
            remarks.map(str::to_string),
        )
        .await?;
    }

    for (name, department) in [
        ("Dr. Kulkarni", "Computer Engineering"),
        ("Prof. Iyer", "Computer Engineering"),
        ("Prof. Shah", "Information Technology"),
    ] {
        add_faculty(pool, name, department).await?;
    }
    for subject in ["Data Structures", "Operating Systems", "Computer Networks"] {
        add_subject(pool, subject, "SE").await?;
    }
    add_allocation(
        pool,
        NewAllocation {
            class_type: ClassType::Lab,
            subject_name: "Data Structures".to_string(),
            faculty_name: "Dr. Kulkarni".to_string(),
            semester: "SEM 3".to_string(),
            division: "Division 1".to_string(),
            batch_name: Some("Batch A".to_string()),
            lab_numbers: vec!["638".to_string(), "204".to_string()],
            class_room_numbers: Vec::new(),
        },
    )
    .await?;

    info!(slots = slot_ids.len(), records = record_count, "seed data inserted");
    Ok(())
}

/// Upserts on `(slot_name, day_of_week, start_time)` and returns the slot id.
pub async fn add_slot(pool: &PgPool, slot: &NewSlot) -> anyhow::Result<Uuid> {
    let start_time = slots::normalize_time(&slot.start_time)?;
    let end_time = slots::normalize_time(&slot.end_time)?;
    let capacity = slots::resolve_capacity(
        slot.class_type,
        &slot.slot_name,
        slot.batch_name.as_deref(),
        slot.capacity,
    );

    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO attendance_tracker.slots
        (id, slot_name, subject_name, faculty_name, class_type, capacity,
         batch_name, division_name, start_time, end_time, day_of_week)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (slot_name, day_of_week, start_time) DO UPDATE
        SET subject_name = EXCLUDED.subject_name,
            faculty_name = EXCLUDED.faculty_name,
            class_type = EXCLUDED.class_type,
            capacity = EXCLUDED.capacity,
            batch_name = EXCLUDED.batch_name,
            division_name = EXCLUDED.division_name,
            end_time = EXCLUDED.end_time,
            is_active = TRUE
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&slot.slot_name)
    .bind(&slot.subject_name)
    .bind(&slot.faculty_name)
    .bind(slot.class_type.as_str())
    .bind(capacity)
    .bind(&slot.batch_name)
    .bind(&slot.division_name)
    .bind(&start_time)
    .bind(&end_time)
    .bind(&slot.day_of_week)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to save slot {}", slot.slot_name))?
    .get("id");

    debug!(%id, slot = %slot.slot_name, capacity, "slot saved");
    Ok(id)
}

pub async fn fetch_slot(pool: &PgPool, id: Uuid) -> anyhow::Result<Option<SlotDefinition>> {
    let row = sqlx::query(&format!(
        "SELECT {SLOT_COLUMNS} FROM attendance_tracker.slots s WHERE s.id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().and_then(slot_from_row))
}

pub async fn list_slots(pool: &PgPool) -> anyhow::Result<Vec<SlotDefinition>> {
    let rows = sqlx::query(&format!(
        "SELECT {SLOT_COLUMNS} FROM attendance_tracker.slots s \
         WHERE s.is_active ORDER BY s.day_of_week, s.start_time"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().filter_map(slot_from_row).collect())
}

/// Soft delete; attendance history is kept.
pub async fn deactivate_slot(pool: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("UPDATE attendance_tracker.slots SET is_active = FALSE WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Validates against the slot's capacity, then upserts on `(slot_id, attendance_date)`.
pub async fn record_attendance(
    pool: &PgPool,
    slot_id: Uuid,
    date: NaiveDate,
    present: i32,
    remarks: Option<String>,
) -> anyhow::Result<AttendanceRecord> {
    let slot = fetch_slot(pool, slot_id)
        .await?
        .with_context(|| format!("slot {slot_id} not found"))?;
    let entry = slots::build_entry(&slot, present)?;

    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO attendance_tracker.daily_attendance
        (id, slot_id, attendance_date, present_count, absent_count, total_students,
         attendance_percentage, remarks)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (slot_id, attendance_date) DO UPDATE
        SET present_count = EXCLUDED.present_count,
            absent_count = EXCLUDED.absent_count,
            total_students = EXCLUDED.total_students,
            attendance_percentage = EXCLUDED.attendance_percentage,
            remarks = EXCLUDED.remarks
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(slot_id)
    .bind(date)
    .bind(entry.present_count)
    .bind(entry.absent_count)
    .bind(entry.total_students)
    .bind(entry.attendance_percentage)
    .bind(&remarks)
    .fetch_one(pool)
    .await?
    .get("id");

    debug!(%slot_id, %date, present, "attendance recorded");

    Ok(AttendanceRecord {
        id,
        slot_id,
        date,
        present_count: entry.present_count,
        absent_count: entry.absent_count,
        total_students: entry.total_students,
        attendance_percentage: entry.attendance_percentage,
        remarks,
        slot: Some(slot),
    })
}

/// Attendance rows with their slot left-joined, ordered by date, slot and id.
pub async fn fetch_records(
    pool: &PgPool,
    query: &RecordQuery,
) -> anyhow::Result<Vec<AttendanceRecord>> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "SELECT a.id, a.slot_id, a.attendance_date, a.present_count, a.absent_count, \
         a.total_students, a.attendance_percentage, a.remarks, {SLOT_COLUMNS} \
         FROM attendance_tracker.daily_attendance a \
         LEFT JOIN attendance_tracker.slots s ON s.id = a.slot_id \
         WHERE TRUE"
    ));

    let filter = &query.filter;
    if let Some(range) = filter.date_range {
        builder
            .push(" AND a.attendance_date BETWEEN ")
            .push_bind(range.start)
            .push(" AND ")
            .push_bind(range.end);
    }
    if let Some(slot_id) = query.slot_id {
        builder.push(" AND a.slot_id = ").push_bind(slot_id);
    }
    if let Some(subject) = &filter.subject_name {
        builder.push(" AND s.subject_name = ").push_bind(subject.clone());
    }
    if let Some(faculty) = &filter.faculty_name {
        builder.push(" AND s.faculty_name = ").push_bind(faculty.clone());
    }
    if let Some(start_time) = &filter.start_time {
        builder.push(" AND s.start_time = ").push_bind(start_time.clone());
    }
    if let Some(end_time) = &filter.end_time {
        builder.push(" AND s.end_time = ").push_bind(end_time.clone());
    }
    builder.push(" ORDER BY a.attendance_date ASC, a.slot_id ASC, a.id ASC");

    let rows = builder
        .build()
        .fetch_all(pool)
        .await
        .context("failed to fetch attendance records")?;

    let records: Vec<AttendanceRecord> = rows
        .iter()
        .map(|row| AttendanceRecord {
            id: row.get("id"),
            slot_id: row.get("slot_id"),
            date: row.get("attendance_date"),
            present_count: row.get("present_count"),
            absent_count: row.get("absent_count"),
            total_students: row.get("total_students"),
            attendance_percentage: row.get("attendance_percentage"),
            remarks: row.get("remarks"),
            slot: slot_from_row(row),
        })
        .collect();

    debug!(count = records.len(), "fetched attendance records");
    Ok(records)
}

fn slot_from_row(row: &PgRow) -> Option<SlotDefinition> {
    let id: Uuid = row.get::<Option<Uuid>, _>("joined_slot_id")?;
    let class_type: String = row.get("class_type");
    Some(SlotDefinition {
        id,
        slot_name: row.get("slot_name"),
        subject_name: row.get("subject_name"),
        faculty_name: row.get("faculty_name"),
        class_type: ClassType::from_db(&class_type),
        batch_name: row.get("batch_name"),
        division_name: row.get("division_name"),
        capacity: row.get("capacity"),
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        day_of_week: row.get("day_of_week"),
    })
}

/// Every row recorded for one day, slot joined.
pub async fn fetch_attendance_on(
    pool: &PgPool,
    date: NaiveDate,
) -> anyhow::Result<Vec<AttendanceRecord>> {
    let query = RecordQuery::from(StatisticsFilter {
        date_range: Some(DateRange {
            start: date,
            end: date,
        }),
        ..StatisticsFilter::default()
    });
    fetch_records(pool, &query).await
}

/// Upserts on the unique faculty name.
pub async fn add_faculty(pool: &PgPool, name: &str, department: &str) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO attendance_tracker.faculties (id, name, department)
        VALUES ($1, $2, $3)
        ON CONFLICT (name) DO UPDATE
        SET department = EXCLUDED.department,
            updated_at = NOW()
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name.trim())
    .bind(department.trim())
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to save faculty {name}"))?
    .get("id");

    debug!(%id, faculty = name, "faculty saved");
    Ok(id)
}

pub async fn list_faculties(pool: &PgPool) -> anyhow::Result<Vec<Faculty>> {
    let rows = sqlx::query(
        "SELECT id, name, department FROM attendance_tracker.faculties ORDER BY name ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| Faculty {
            id: row.get("id"),
            name: row.get("name"),
            department: row.get("department"),
        })
        .collect())
}

pub async fn remove_faculty(pool: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM attendance_tracker.faculties WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Upserts on `(name, year)`.
pub async fn add_subject(pool: &PgPool, name: &str, year: &str) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO attendance_tracker.subjects (id, name, year)
        VALUES ($1, $2, $3)
        ON CONFLICT (name, year) DO UPDATE
        SET updated_at = NOW()
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name.trim())
    .bind(year.trim())
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to save subject {name}"))?
    .get("id");

    debug!(%id, subject = name, year, "subject saved");
    Ok(id)
}

pub async fn list_subjects(pool: &PgPool) -> anyhow::Result<Vec<Subject>> {
    let rows = sqlx::query(
        "SELECT id, name, year FROM attendance_tracker.subjects ORDER BY year ASC, name ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| Subject {
            id: row.get("id"),
            name: row.get("name"),
            year: row.get("year"),
        })
        .collect())
}

pub async fn remove_subject(pool: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM attendance_tracker.subjects WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn add_allocation(pool: &PgPool, allocation: NewAllocation) -> anyhow::Result<Uuid> {
    let allocation = allocation.validate()?;

    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO attendance_tracker.allocations
        (id, class_type, subject_name, faculty_name, semester, division,
         batch_name, lab_numbers, class_room_numbers)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(allocation.class_type.as_str())
    .bind(&allocation.subject_name)
    .bind(&allocation.faculty_name)
    .bind(&allocation.semester)
    .bind(&allocation.division)
    .bind(&allocation.batch_name)
    .bind(&allocation.lab_numbers)
    .bind(&allocation.class_room_numbers)
    .fetch_one(pool)
    .await
    .context("failed to save allocation")?
    .get("id");

    info!(
        %id,
        subject = %allocation.subject_name,
        faculty = %allocation.faculty_name,
        "allocation saved"
    );
    Ok(id)
}

pub async fn list_allocations(pool: &PgPool) -> anyhow::Result<Vec<Allocation>> {
    let rows = sqlx::query(
        r#"
        SELECT id, class_type, subject_name, faculty_name, semester, division,
               batch_name, lab_numbers, class_room_numbers
        FROM attendance_tracker.allocations
        ORDER BY semester ASC, subject_name ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let class_type: String = row.get("class_type");
            Allocation {
                id: row.get("id"),
                class_type: ClassType::from_db(&class_type),
                subject_name: row.get("subject_name"),
                faculty_name: row.get("faculty_name"),
                semester: row.get("semester"),
                division: row.get("division"),
                batch_name: row.get("batch_name"),
                lab_numbers: row.get("lab_numbers"),
                class_room_numbers: row.get("class_room_numbers"),
            }
        })
        .collect())
}

pub async fn remove_allocation(pool: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM attendance_tracker.allocations WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn prune_before(pool: &PgPool, cutoff: NaiveDate) -> anyhow::Result<u64> {
    let result = sqlx::query(
        "DELETE FROM attendance_tracker.daily_attendance WHERE attendance_date < $1",
    )
    .bind(cutoff)
    .execute(pool)
    .await?;

    info!(%cutoff, deleted = result.rows_affected(), "pruned old attendance records");
    Ok(result.rows_affected())
}

pub async fn database_counts(pool: &PgPool) -> anyhow::Result<DatabaseCounts> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*) FROM attendance_tracker.slots WHERE is_active) AS active_slots,
            COUNT(a.id) AS total_records,
            COUNT(s.id) AS linked_records,
            MIN(a.attendance_date) AS earliest,
            MAX(a.attendance_date) AS latest
        FROM attendance_tracker.daily_attendance a
        LEFT JOIN attendance_tracker.slots s ON s.id = a.slot_id
        "#,
    )
    .fetch_one(pool)
    .await?;

    let total_records: i64 = row.get("total_records");
    let linked_records: i64 = row.get("linked_records");

    Ok(DatabaseCounts {
        active_slots: row.get("active_slots"),
        total_records,
        linked_records,
        orphaned_records: total_records - linked_records,
        earliest: row.get("earliest"),
        latest: row.get("latest"),
    })
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        slot_name: String,
        subject_name: String,
        faculty_name: String,
        class_type: String,
        capacity: Option<i32>,
        batch_name: Option<String>,
        division_name: Option<String>,
        start_time: String,
        end_time: String,
        day_of_week: String,
        attendance_date: NaiveDate,
        present_count: i32,
        remarks: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut imported = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid CSV row {}", line + 1))?;
        let slot_id = add_slot(
            pool,
            &NewSlot {
                slot_name: row.slot_name,
                subject_name: row.subject_name,
                faculty_name: row.faculty_name,
                class_type: ClassType::from_db(&row.class_type),
                capacity: row.capacity,
                batch_name: row.batch_name.filter(|name| !name.is_empty()),
                division_name: row.division_name.filter(|name| !name.is_empty()),
                start_time: row.start_time,
                end_time: row.end_time,
                day_of_week: row.day_of_week,
            },
        )
        .await?;

        record_attendance(
            pool,
            slot_id,
            row.attendance_date,
            row.present_count,
            row.remarks.filter(|remarks| !remarks.is_empty()),
        )
        .await
        .with_context(|| format!("CSV row {} rejected", line + 1))?;
        imported += 1;
    }

    info!(imported, path = %csv_path.display(), "CSV import finished");
    Ok(imported)
}
