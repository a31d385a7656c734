use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use utoipa::ToSchema;

/// How a clock event was reported.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, sqlx::Type, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ClockMethod {
    Gps,
    Manual,
    Qr,
}

impl Default for ClockMethod {
    fn default() -> Self {
        ClockMethod::Gps
    }
}

/// One attendance record per (user_id, date). Created on the first
/// clock-in of the day, mutated once on clock-out, never deleted here.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "2026-08-24", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "09:00:00", value_type = String)]
    pub clock_in: Option<NaiveTime>,
    #[schema(example = "17:30:00", value_type = String)]
    pub clock_out: Option<NaiveTime>,
    pub clock_in_lat: Option<f64>,
    pub clock_in_lon: Option<f64>,
    pub clock_out_lat: Option<f64>,
    pub clock_out_lon: Option<f64>,
    pub method: ClockMethod,
    pub qr_code: Option<String>,
    #[schema(example = 8.5)]
    pub worked_hours: Option<f64>,
    pub notes: Option<String>,
}

/// Fields needed to create a record on clock-in.
#[derive(Debug, Clone)]
pub struct NewAttendanceRecord {
    pub user_id: u64,
    pub date: NaiveDate,
    pub clock_in: NaiveTime,
    pub clock_in_lat: Option<f64>,
    pub clock_in_lon: Option<f64>,
    pub method: ClockMethod,
    pub qr_code: Option<String>,
    pub notes: Option<String>,
}

/// Fields written on clock-out, guarded by `clock_out IS NULL`.
#[derive(Debug, Clone)]
pub struct ClockOutUpdate {
    pub clock_out: NaiveTime,
    pub clock_out_lat: Option<f64>,
    pub clock_out_lon: Option<f64>,
    pub worked_hours: f64,
    pub notes: Option<String>,
}

/// Derived, read-only view of a user's day. Never mutates state.
#[derive(Debug, Serialize, ToSchema)]
pub struct TodayStatus {
    #[schema(example = "2026-08-24", format = "date", value_type = String)]
    pub date: NaiveDate,
    pub has_entry: bool,
    pub has_exit: bool,
    pub can_clock_in: bool,
    pub can_clock_out: bool,
    #[schema(example = 8.5)]
    pub worked_hours: f64,
    pub record: Option<AttendanceRecord>,
}

impl TodayStatus {
    pub fn derive(date: NaiveDate, record: Option<AttendanceRecord>) -> Self {
        let has_entry = record.as_ref().is_some_and(|r| r.clock_in.is_some());
        let has_exit = record.as_ref().is_some_and(|r| r.clock_out.is_some());
        let worked_hours = record.as_ref().and_then(|r| r.worked_hours).unwrap_or(0.0);

        Self {
            date,
            has_entry,
            has_exit,
            can_clock_in: !has_entry,
            can_clock_out: has_entry && !has_exit,
            worked_hours,
            record,
        }
    }
}

/// Period statistics over whatever page of records the caller supplies.
#[derive(Debug, PartialEq, Serialize, ToSchema)]
pub struct PeriodStats {
    #[schema(example = 15.5)]
    pub total_hours_worked: f64,
    #[schema(example = 2)]
    pub days_worked: u32,
    #[schema(example = 1)]
    pub incomplete_records: u32,
    #[schema(example = 7.75)]
    pub average_hours_per_day: f64,
}

impl PeriodStats {
    pub fn from_records(records: &[AttendanceRecord]) -> Self {
        let total: f64 = records.iter().filter_map(|r| r.worked_hours).sum();
        let days_worked = records
            .iter()
            .filter(|r| r.clock_in.is_some() && r.clock_out.is_some())
            .count() as u32;
        let incomplete_records = records
            .iter()
            .filter(|r| r.clock_in.is_some() && r.clock_out.is_none())
            .count() as u32;

        let average = if days_worked > 0 {
            round2(total / days_worked as f64)
        } else {
            0.0
        };

        Self {
            total_hours_worked: round2(total),
            days_worked,
            incomplete_records,
            average_hours_per_day: average,
        }
    }
}

/// Elapsed hours between clock-in and clock-out, floored at zero and
/// rounded to two decimals.
pub fn worked_hours(clock_in: NaiveTime, clock_out: NaiveTime) -> f64 {
    let secs = (clock_out - clock_in).num_seconds().max(0);
    round2(secs as f64 / 3600.0)
}

pub fn round2(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        id: u64,
        clock_in: Option<&str>,
        clock_out: Option<&str>,
        worked: Option<f64>,
    ) -> AttendanceRecord {
        let parse = |s: &str| NaiveTime::parse_from_str(s, "%H:%M:%S").unwrap();
        AttendanceRecord {
            id,
            user_id: 1,
            date: NaiveDate::from_ymd_opt(2026, 8, 24).unwrap(),
            clock_in: clock_in.map(parse),
            clock_out: clock_out.map(parse),
            clock_in_lat: None,
            clock_in_lon: None,
            clock_out_lat: None,
            clock_out_lon: None,
            method: ClockMethod::Manual,
            qr_code: None,
            worked_hours: worked,
            notes: None,
        }
    }

    #[test]
    fn worked_hours_for_a_standard_shift() {
        let start = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let end = NaiveTime::from_hms_opt(17, 30, 0).unwrap();
        assert_eq!(worked_hours(start, end), 8.5);
    }

    #[test]
    fn worked_hours_never_negative() {
        let start = NaiveTime::from_hms_opt(17, 0, 0).unwrap();
        let end = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert_eq!(worked_hours(start, end), 0.0);
    }

    #[test]
    fn stats_over_mixed_records() {
        let records = vec![
            record(1, Some("09:00:00"), Some("17:00:00"), Some(8.0)),
            record(2, Some("09:30:00"), Some("17:00:00"), Some(7.5)),
            record(3, Some("09:00:00"), None, None),
        ];

        let stats = PeriodStats::from_records(&records);
        assert_eq!(stats.total_hours_worked, 15.5);
        assert_eq!(stats.days_worked, 2);
        assert_eq!(stats.incomplete_records, 1);
        assert_eq!(stats.average_hours_per_day, 7.75);
    }

    #[test]
    fn stats_over_empty_page() {
        let stats = PeriodStats::from_records(&[]);
        assert_eq!(stats.total_hours_worked, 0.0);
        assert_eq!(stats.days_worked, 0);
        assert_eq!(stats.average_hours_per_day, 0.0);
    }

    #[test]
    fn today_status_without_record() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        let status = TodayStatus::derive(date, None);
        assert!(!status.has_entry);
        assert!(!status.has_exit);
        assert!(status.can_clock_in);
        assert!(!status.can_clock_out);
        assert_eq!(status.worked_hours, 0.0);
        assert!(status.record.is_none());
    }

    #[test]
    fn today_status_after_clock_in_only() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        let status = TodayStatus::derive(date, Some(record(1, Some("09:00:00"), None, None)));
        assert!(status.has_entry);
        assert!(!status.has_exit);
        assert!(!status.can_clock_in);
        assert!(status.can_clock_out);
    }
}
