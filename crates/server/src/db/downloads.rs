//! Download repository and the dedup guard.
//!
//! Duplicate suppression leans entirely on the `UNIQUE(user_id, app_name)`
//! index: the insert is attempted unconditionally and a uniqueness violation
//! is translated into [`LogOutcome::AlreadyExists`]. There is no pre-check,
//! so concurrent identical requests cannot race past each other.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use salespulse_core::{Download, TimeWindow};

use super::RepositoryError;

/// Internal row type for download queries.
#[derive(Debug, sqlx::FromRow)]
struct DownloadRow {
    user_id: String,
    app_name: String,
    timestamp: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<DownloadRow> for Download {
    fn from(row: DownloadRow) -> Self {
        Self {
            user_id: row.user_id,
            app_name: row.app_name,
            timestamp: row.timestamp,
            created_at: row.created_at,
        }
    }
}

/// Result of attempting to log a download.
#[derive(Debug, Clone)]
pub enum LogOutcome {
    /// A fresh record was stored.
    Inserted(Download),
    /// The `(userId, appName)` pair was already logged; nothing was written.
    AlreadyExists,
}

/// Filter over download events, ranged on the client-supplied event time.
#[derive(Debug, Clone)]
pub struct DownloadFilter {
    pub app_name: Option<String>,
    pub window: TimeWindow,
}

/// Repository for download database operations.
pub struct DownloadRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DownloadRepository<'a> {
    /// Create a new download repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a download, or confirm one already exists for the pair.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` for any failure other than the
    /// uniqueness violation, which is a successful [`LogOutcome::AlreadyExists`].
    pub async fn insert_or_confirm(
        &self,
        download: &Download,
    ) -> Result<LogOutcome, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO downloads (user_id, app_name, timestamp, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&download.user_id)
        .bind(&download.app_name)
        .bind(download.timestamp)
        .bind(download.created_at)
        .execute(self.pool)
        .await;

        match result {
            Ok(_) => Ok(LogOutcome::Inserted(download.clone())),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Ok(LogOutcome::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Matching downloads in event-time order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &DownloadFilter) -> Result<Vec<Download>, RepositoryError> {
        let mut qb = filtered_query(
            "SELECT user_id, app_name, timestamp, created_at FROM downloads",
            filter,
        );
        qb.push(" ORDER BY timestamp ASC");

        let rows: Vec<DownloadRow> = qb.build_query_as().fetch_all(self.pool).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Number of distinct users with a matching download.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn distinct_user_count(
        &self,
        filter: &DownloadFilter,
    ) -> Result<u64, RepositoryError> {
        let mut qb = filtered_query("SELECT COUNT(DISTINCT user_id) FROM downloads", filter);
        let count: i64 = qb.build_query_scalar().fetch_one(self.pool).await?;
        Ok(count.try_into().unwrap_or_default())
    }
}

fn filtered_query(select: &str, filter: &DownloadFilter) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new(select);
    qb.push(" WHERE timestamp >= ")
        .push_bind(filter.window.start)
        .push(" AND timestamp <= ")
        .push_bind(filter.window.end);
    if let Some(app) = &filter.app_name {
        qb.push(" AND app_name = ").push_bind(app.clone());
    }
    qb
}
