use crate::{
    model::{
        attendance::{AttendanceRecord, ClockOutUpdate, NewAttendanceRecord},
        site_config::SiteConfig,
    },
    utils::site_config_cache::ConfigStore,
};
use chrono::NaiveDate;
use derive_more::Display;
use sqlx::MySqlPool;

#[derive(Debug, Display)]
pub enum StoreError {
    /// Unique-key violation: a row for this (user_id, date) already exists.
    #[display(fmt = "duplicate record")]
    Duplicate,
    #[display(fmt = "store unavailable: {}", _0)]
    Unavailable(String),
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            // 23000 = integrity constraint violation (duplicate key)
            if db_err.code().as_deref() == Some("23000") {
                return StoreError::Duplicate;
            }
        }
        StoreError::Unavailable(e.to_string())
    }
}

/// Abstract attendance repository. The MySQL implementation below is the
/// production one; tests drive the state machine with an in-memory store.
pub trait AttendanceStore {
    async fn find_record(
        &self,
        user_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError>;

    /// Must be atomic per (user_id, date): under concurrent duplicate
    /// submissions at most one insert succeeds, the rest observe
    /// `StoreError::Duplicate`.
    async fn insert_record(&self, record: NewAttendanceRecord) -> Result<u64, StoreError>;

    /// Applies the clock-out fields only if no clock-out is recorded yet.
    /// Returns false when another writer already closed the record.
    async fn set_clock_out(&self, id: u64, update: ClockOutUpdate) -> Result<bool, StoreError>;

    async fn query_records(
        &self,
        user_id: u64,
        filter: HistoryFilter,
    ) -> Result<(Vec<AttendanceRecord>, i64), StoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Clone)]
pub struct MySqlAttendanceStore {
    pool: MySqlPool,
}

impl MySqlAttendanceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

impl AttendanceStore for MySqlAttendanceStore {
    async fn find_record(
        &self,
        user_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let record = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT id, user_id, date, clock_in, clock_out,
                   clock_in_lat, clock_in_lon, clock_out_lat, clock_out_lon,
                   method, qr_code, worked_hours, notes
            FROM attendance
            WHERE user_id = ? AND date = ?
            "#,
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert_record(&self, record: NewAttendanceRecord) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance
            (user_id, date, clock_in, clock_in_lat, clock_in_lon, method, qr_code, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.user_id)
        .bind(record.date)
        .bind(record.clock_in)
        .bind(record.clock_in_lat)
        .bind(record.clock_in_lon)
        .bind(record.method)
        .bind(record.qr_code)
        .bind(record.notes)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_id())
    }

    async fn set_clock_out(&self, id: u64, update: ClockOutUpdate) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET clock_out = ?, clock_out_lat = ?, clock_out_lon = ?,
                worked_hours = ?, notes = ?
            WHERE id = ? AND clock_out IS NULL
            "#,
        )
        .bind(update.clock_out)
        .bind(update.clock_out_lat)
        .bind(update.clock_out_lon)
        .bind(update.worked_hours)
        .bind(update.notes)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn query_records(
        &self,
        user_id: u64,
        filter: HistoryFilter,
    ) -> Result<(Vec<AttendanceRecord>, i64), StoreError> {
        let mut conditions = vec!["user_id = ?"];
        if filter.from.is_some() {
            conditions.push("date >= ?");
        }
        if filter.to.is_some() {
            conditions.push("date <= ?");
        }
        let where_clause = format!("WHERE {}", conditions.join(" AND "));

        let count_sql = format!("SELECT COUNT(*) FROM attendance {}", where_clause);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(user_id);
        if let Some(from) = filter.from {
            count_query = count_query.bind(from);
        }
        if let Some(to) = filter.to {
            count_query = count_query.bind(to);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let per_page = filter.per_page.clamp(1, 100);
        let page = filter.page.max(1);
        let offset = (page - 1) * per_page;

        let data_sql = format!(
            r#"
            SELECT id, user_id, date, clock_in, clock_out,
                   clock_in_lat, clock_in_lon, clock_out_lat, clock_out_lon,
                   method, qr_code, worked_hours, notes
            FROM attendance
            {}
            ORDER BY date DESC, clock_in DESC
            LIMIT ? OFFSET ?
            "#,
            where_clause
        );

        let mut data_query = sqlx::query_as::<_, AttendanceRecord>(&data_sql).bind(user_id);
        if let Some(from) = filter.from {
            data_query = data_query.bind(from);
        }
        if let Some(to) = filter.to {
            data_query = data_query.bind(to);
        }
        let records = data_query
            .bind(per_page as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok((records, total))
    }
}

/// The process-wide cache instance registered as actix app data.
pub type SharedSiteConfig = crate::utils::site_config_cache::SiteConfigCache<MySqlConfigStore>;

#[derive(Clone)]
pub struct MySqlConfigStore {
    pool: MySqlPool,
}

impl MySqlConfigStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Upsert of the single approved-site row; callers invalidate the
    /// cache afterwards so the next read refetches.
    pub async fn save(&self, config: &SiteConfig) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO site_config (id, latitude, longitude, radius_m)
            VALUES (1, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                latitude = VALUES(latitude),
                longitude = VALUES(longitude),
                radius_m = VALUES(radius_m)
            "#,
        )
        .bind(config.site.latitude)
        .bind(config.site.longitude)
        .bind(config.radius_m)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl ConfigStore for MySqlConfigStore {
    async fn fetch(&self) -> Result<Option<SiteConfig>, StoreError> {
        let row = sqlx::query_as::<_, (f64, f64, u32)>(
            "SELECT latitude, longitude, radius_m FROM site_config WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(lat, lon, radius_m)| SiteConfig::new(lat, lon, radius_m)))
    }
}
