use std::collections::HashMap;

use crate::models::AttendanceRecord;

/// Unrounded `present / total * 100`, `0.0` when `total` is zero.
pub fn percentage(present: i64, total: i64) -> f64 {
    if total <= 0 {
        0.0
    } else {
        (present as f64 / total as f64) * 100.0
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn rate(present: i64, total: i64) -> f64 {
    round2(percentage(present, total))
}

pub fn record_percentage(record: &AttendanceRecord) -> f64 {
    percentage(
        i64::from(record.present_count),
        i64::from(record.total_students),
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bucket {
    pub present: i64,
    pub absent: i64,
    pub total: i64,
}

impl Bucket {
    pub fn add(&mut self, record: &AttendanceRecord) {
        self.present += i64::from(record.present_count);
        self.absent += i64::from(record.absent_count);
        self.total += i64::from(record.total_students);
    }

    pub fn rate(&self) -> f64 {
        rate(self.present, self.total)
    }
}

/// Buckets keyed by a grouping dimension, kept in first-seen order.
#[derive(Debug, Default)]
pub struct Buckets {
    index: HashMap<String, usize>,
    entries: Vec<(String, Bucket)>,
}

impl Buckets {
    pub fn add(&mut self, key: &str, record: &AttendanceRecord) {
        let position = match self.index.get(key) {
            Some(position) => *position,
            None => {
                self.entries.push((key.to_string(), Bucket::default()));
                self.index.insert(key.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        self.entries[position].1.add(record);
    }

    pub fn into_entries(self) -> Vec<(String, Bucket)> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;

    fn record(present: i32, total: i32) -> AttendanceRecord {
        AttendanceRecord {
            id: Uuid::new_v4(),
            slot_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            present_count: present,
            absent_count: total - present,
            total_students: total,
            attendance_percentage: 0.0,
            remarks: None,
            slot: None,
        }
    }

    #[test]
    fn zero_total_is_zero_rate() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(5, 0), 0.0);
        assert_eq!(rate(0, 0), 0.0);
    }

    #[test]
    fn rates_round_to_two_places() {
        assert_eq!(rate(1, 3), 33.33);
        assert_eq!(rate(2, 3), 66.67);
        assert_eq!(rate(18, 40), 45.0);
        assert_eq!(round2(74.994), 74.99);
    }

    #[test]
    fn record_percentage_ignores_stored_value() {
        let mut row = record(15, 20);
        row.attendance_percentage = 12.0;
        assert_eq!(record_percentage(&row), 75.0);
    }

    #[test]
    fn buckets_keep_first_seen_order() {
        let mut buckets = Buckets::default();
        buckets.add("OS", &record(10, 20));
        buckets.add("DS", &record(5, 10));
        buckets.add("OS", &record(20, 20));

        let entries = buckets.into_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "OS");
        assert_eq!(
            entries[0].1,
            Bucket {
                present: 30,
                absent: 10,
                total: 40
            }
        );
        assert_eq!(entries[0].1.rate(), 75.0);
        assert_eq!(entries[1].0, "DS");
    }
}
