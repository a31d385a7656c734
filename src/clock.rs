//! Per-(user, day) attendance state machine:
//! `NO_ENTRY` -> `CLOCKED_IN` -> `CLOCKED_OUT`, terminal for that date.
//!
//! The store guarantees "check then insert" is atomic per (user_id, date),
//! so under concurrent duplicate submissions at most one clock-in wins.

use crate::{
    model::attendance::{
        AttendanceRecord, ClockMethod, ClockOutUpdate, NewAttendanceRecord, TodayStatus,
        worked_hours,
    },
    store::{AttendanceStore, StoreError},
    utils::geo::Coordinate,
};
use chrono::{NaiveDate, NaiveTime};
use derive_more::Display;

#[derive(Debug, Display)]
pub enum ClockError {
    #[display(fmt = "already clocked in today")]
    DuplicateEntry,
    #[display(fmt = "already clocked out today")]
    DuplicateExit,
    #[display(fmt = "no clock-in recorded for this day")]
    NoEntryFound,
    #[display(fmt = "{}", _0)]
    Store(StoreError),
}

impl std::error::Error for ClockError {}

impl From<StoreError> for ClockError {
    fn from(e: StoreError) -> Self {
        ClockError::Store(e)
    }
}

impl ClockError {
    /// Machine-readable kind for API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ClockError::DuplicateEntry => "DUPLICATE_ENTRY",
            ClockError::DuplicateExit => "DUPLICATE_EXIT",
            ClockError::NoEntryFound => "NO_ENTRY_FOUND",
            ClockError::Store(_) => "STORE_UNAVAILABLE",
        }
    }
}

/// A clock-in action. Date and time must come from one timestamp captured
/// at the moment of the action, never recomputed separately.
#[derive(Debug, Clone)]
pub struct ClockInEvent {
    pub user_id: u64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub coordinate: Option<Coordinate>,
    pub method: ClockMethod,
    pub qr_code: Option<String>,
    pub notes: Option<String>,
    /// GPS-validation summary produced by the fence check, appended to notes.
    pub gps_note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClockOutEvent {
    pub user_id: u64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub coordinate: Option<Coordinate>,
    pub notes: Option<String>,
    pub gps_note: Option<String>,
}

/// Valid only from `NO_ENTRY`. Creates the day's record; a second
/// submission for the same (user, date) fails with `DUPLICATE_ENTRY` and
/// leaves the original untouched.
pub async fn clock_in<S: AttendanceStore>(
    store: &S,
    event: ClockInEvent,
) -> Result<AttendanceRecord, ClockError> {
    if let Some(existing) = store.find_record(event.user_id, event.date).await? {
        if existing.clock_in.is_some() {
            return Err(ClockError::DuplicateEntry);
        }
    }

    let merged = merge_notes(None, event.notes.as_deref(), event.gps_note.as_deref());
    let record = NewAttendanceRecord {
        user_id: event.user_id,
        date: event.date,
        clock_in: event.time,
        clock_in_lat: event.coordinate.map(|c| c.latitude),
        clock_in_lon: event.coordinate.map(|c| c.longitude),
        method: event.method,
        qr_code: event.qr_code.clone(),
        notes: merged.clone(),
    };

    // The unique key on (user_id, date) closes the race left open by the
    // read above.
    let id = match store.insert_record(record).await {
        Ok(id) => id,
        Err(StoreError::Duplicate) => return Err(ClockError::DuplicateEntry),
        Err(e) => return Err(ClockError::Store(e)),
    };

    Ok(AttendanceRecord {
        id,
        user_id: event.user_id,
        date: event.date,
        clock_in: Some(event.time),
        clock_out: None,
        clock_in_lat: event.coordinate.map(|c| c.latitude),
        clock_in_lon: event.coordinate.map(|c| c.longitude),
        clock_out_lat: None,
        clock_out_lon: None,
        method: event.method,
        qr_code: event.qr_code,
        worked_hours: None,
        notes: merged,
    })
}

/// Valid only from `CLOCKED_IN`. Computes worked hours and appends the
/// outgoing GPS summary to the notes. A shift spanning midnight lands on
/// a new calendar date and is rejected with `NO_ENTRY_FOUND`.
pub async fn clock_out<S: AttendanceStore>(
    store: &S,
    event: ClockOutEvent,
) -> Result<AttendanceRecord, ClockError> {
    let Some(mut record) = store.find_record(event.user_id, event.date).await? else {
        return Err(ClockError::NoEntryFound);
    };
    let Some(entry_time) = record.clock_in else {
        return Err(ClockError::NoEntryFound);
    };
    if record.clock_out.is_some() {
        return Err(ClockError::DuplicateExit);
    }

    let hours = worked_hours(entry_time, event.time);
    let merged = merge_notes(
        record.notes.as_deref(),
        event.notes.as_deref(),
        event.gps_note.as_deref(),
    );

    let update = ClockOutUpdate {
        clock_out: event.time,
        clock_out_lat: event.coordinate.map(|c| c.latitude),
        clock_out_lon: event.coordinate.map(|c| c.longitude),
        worked_hours: hours,
        notes: merged.clone(),
    };

    // Guarded update: a concurrent exit that won the race leaves zero
    // affected rows.
    if !store.set_clock_out(record.id, update).await? {
        return Err(ClockError::DuplicateExit);
    }

    record.clock_out = Some(event.time);
    record.clock_out_lat = event.coordinate.map(|c| c.latitude);
    record.clock_out_lon = event.coordinate.map(|c| c.longitude);
    record.worked_hours = Some(hours);
    record.notes = merged;
    Ok(record)
}

/// Read-only view of the user's day.
pub async fn today_status<S: AttendanceStore>(
    store: &S,
    user_id: u64,
    date: NaiveDate,
) -> Result<TodayStatus, ClockError> {
    let record = store.find_record(user_id, date).await?;
    Ok(TodayStatus::derive(date, record))
}

/// Notes are append-only: existing text first, then the caller's note,
/// then the GPS summary, joined with " | ".
fn merge_notes(
    existing: Option<&str>,
    notes: Option<&str>,
    gps_note: Option<&str>,
) -> Option<String> {
    let parts: Vec<&str> = [existing, notes, gps_note]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(" | "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::HistoryFilter;
    use std::{
        collections::HashMap,
        sync::{
            Mutex,
            atomic::{AtomicU64, Ordering},
        },
    };

    #[derive(Default)]
    struct MemStore {
        rows: Mutex<HashMap<(u64, NaiveDate), AttendanceRecord>>,
        next_id: AtomicU64,
    }

    impl AttendanceStore for MemStore {
        async fn find_record(
            &self,
            user_id: u64,
            date: NaiveDate,
        ) -> Result<Option<AttendanceRecord>, StoreError> {
            Ok(self.rows.lock().unwrap().get(&(user_id, date)).cloned())
        }

        async fn insert_record(&self, record: NewAttendanceRecord) -> Result<u64, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            let key = (record.user_id, record.date);
            if rows.contains_key(&key) {
                return Err(StoreError::Duplicate);
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            rows.insert(
                key,
                AttendanceRecord {
                    id,
                    user_id: record.user_id,
                    date: record.date,
                    clock_in: Some(record.clock_in),
                    clock_out: None,
                    clock_in_lat: record.clock_in_lat,
                    clock_in_lon: record.clock_in_lon,
                    clock_out_lat: None,
                    clock_out_lon: None,
                    method: record.method,
                    qr_code: record.qr_code,
                    worked_hours: None,
                    notes: record.notes,
                },
            );
            Ok(id)
        }

        async fn set_clock_out(&self, id: u64, update: ClockOutUpdate) -> Result<bool, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            let Some(row) = rows.values_mut().find(|r| r.id == id) else {
                return Ok(false);
            };
            if row.clock_out.is_some() {
                return Ok(false);
            }
            row.clock_out = Some(update.clock_out);
            row.clock_out_lat = update.clock_out_lat;
            row.clock_out_lon = update.clock_out_lon;
            row.worked_hours = Some(update.worked_hours);
            row.notes = update.notes;
            Ok(true)
        }

        async fn query_records(
            &self,
            user_id: u64,
            filter: HistoryFilter,
        ) -> Result<(Vec<AttendanceRecord>, i64), StoreError> {
            let rows = self.rows.lock().unwrap();
            let mut matching: Vec<AttendanceRecord> = rows
                .values()
                .filter(|r| r.user_id == user_id)
                .filter(|r| filter.from.is_none_or(|from| r.date >= from))
                .filter(|r| filter.to.is_none_or(|to| r.date <= to))
                .cloned()
                .collect();
            matching.sort_by(|a, b| b.date.cmp(&a.date));
            let total = matching.len() as i64;
            Ok((matching, total))
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 24).unwrap()
    }

    fn entry(user_id: u64, h: u32, m: u32) -> ClockInEvent {
        ClockInEvent {
            user_id,
            date: date(),
            time: NaiveTime::from_hms_opt(h, m, 0).unwrap(),
            coordinate: None,
            method: ClockMethod::Manual,
            qr_code: None,
            notes: None,
            gps_note: None,
        }
    }

    fn exit(user_id: u64, h: u32, m: u32) -> ClockOutEvent {
        ClockOutEvent {
            user_id,
            date: date(),
            time: NaiveTime::from_hms_opt(h, m, 0).unwrap(),
            coordinate: None,
            notes: None,
            gps_note: None,
        }
    }

    #[actix_web::test]
    async fn full_day_yields_worked_hours() {
        let store = MemStore::default();
        clock_in(&store, entry(1, 9, 0)).await.unwrap();

        let record = clock_out(&store, exit(1, 17, 30)).await.unwrap();
        assert_eq!(record.worked_hours, Some(8.5));
        assert_eq!(record.clock_out, Some(NaiveTime::from_hms_opt(17, 30, 0).unwrap()));
    }

    #[actix_web::test]
    async fn second_clock_in_is_rejected_and_original_kept() {
        let store = MemStore::default();
        clock_in(&store, entry(1, 9, 0)).await.unwrap();

        let err = clock_in(&store, entry(1, 10, 0)).await.unwrap_err();
        assert!(matches!(err, ClockError::DuplicateEntry));
        assert_eq!(err.kind(), "DUPLICATE_ENTRY");

        let kept = store.find_record(1, date()).await.unwrap().unwrap();
        assert_eq!(kept.clock_in, NaiveTime::from_hms_opt(9, 0, 0));
    }

    #[actix_web::test]
    async fn clock_out_without_entry_fails() {
        let store = MemStore::default();
        let err = clock_out(&store, exit(1, 17, 0)).await.unwrap_err();
        assert!(matches!(err, ClockError::NoEntryFound));
        assert_eq!(err.kind(), "NO_ENTRY_FOUND");
    }

    #[actix_web::test]
    async fn second_clock_out_is_rejected() {
        let store = MemStore::default();
        clock_in(&store, entry(1, 9, 0)).await.unwrap();
        clock_out(&store, exit(1, 17, 0)).await.unwrap();

        let err = clock_out(&store, exit(1, 18, 0)).await.unwrap_err();
        assert!(matches!(err, ClockError::DuplicateExit));
    }

    #[actix_web::test]
    async fn shift_spanning_midnight_is_two_dates() {
        let store = MemStore::default();
        clock_in(&store, entry(1, 23, 0)).await.unwrap();

        let mut late_exit = exit(1, 7, 0);
        late_exit.date = date().succ_opt().unwrap();
        let err = clock_out(&store, late_exit).await.unwrap_err();
        assert!(matches!(err, ClockError::NoEntryFound));
    }

    #[actix_web::test]
    async fn gps_notes_are_appended_not_overwritten() {
        let store = MemStore::default();
        let mut event = entry(1, 9, 0);
        event.method = ClockMethod::Gps;
        event.notes = Some("late bus".into());
        event.gps_note = Some("GPS validated | distance=12m | max=500m".into());
        clock_in(&store, event).await.unwrap();

        let mut out = exit(1, 17, 0);
        out.gps_note = Some("GPS validated | distance=40m | max=500m".into());
        let record = clock_out(&store, out).await.unwrap();

        let notes = record.notes.unwrap();
        assert!(notes.starts_with("late bus | GPS validated | distance=12m"));
        assert!(notes.ends_with("GPS validated | distance=40m | max=500m"));
    }

    #[actix_web::test]
    async fn concurrent_duplicate_clock_ins_yield_one_winner() {
        let store = MemStore::default();

        let (a, b) = futures::join!(
            clock_in(&store, entry(7, 9, 0)),
            clock_in(&store, entry(7, 9, 0))
        );
        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        let duplicates = [&a, &b]
            .iter()
            .filter(|r| matches!(r, Err(ClockError::DuplicateEntry)))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(duplicates, 1);
    }

    #[actix_web::test]
    async fn status_reflects_the_day_state() {
        let store = MemStore::default();

        let fresh = today_status(&store, 1, date()).await.unwrap();
        assert!(fresh.can_clock_in && !fresh.can_clock_out);

        clock_in(&store, entry(1, 9, 0)).await.unwrap();
        let open = today_status(&store, 1, date()).await.unwrap();
        assert!(!open.can_clock_in && open.can_clock_out);

        clock_out(&store, exit(1, 17, 30)).await.unwrap();
        let done = today_status(&store, 1, date()).await.unwrap();
        assert!(!done.can_clock_in && !done.can_clock_out);
        assert_eq!(done.worked_hours, 8.5);
    }
}
