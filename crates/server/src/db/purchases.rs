//! Purchase repository: the append-only purchase log.
//!
//! Filtered reads are built with `QueryBuilder` so the same filter serves the
//! paginated list, the totals pass, and every aggregation endpoint.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use salespulse_core::Purchase;

use super::RepositoryError;

const SELECT_COLUMNS: &str = "SELECT currency_code, price, price_formatted, kind, is_sandbox, \
     app_name, store_front, is_trial, trial_period, created_at FROM purchases";

/// Internal row type for purchase queries.
#[derive(Debug, sqlx::FromRow)]
struct PurchaseRow {
    currency_code: String,
    price: f64,
    price_formatted: Option<String>,
    kind: String,
    is_sandbox: bool,
    app_name: String,
    store_front: Option<String>,
    is_trial: bool,
    trial_period: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<PurchaseRow> for Purchase {
    fn from(row: PurchaseRow) -> Self {
        Self {
            currency_code: row.currency_code,
            price: row.price,
            price_formatted: row.price_formatted,
            kind: row.kind,
            is_sandbox: row.is_sandbox,
            app_name: row.app_name,
            store_front: row.store_front,
            is_trial: row.is_trial,
            trial_period: row.trial_period,
            created_at: row.created_at,
        }
    }
}

/// Filter over the purchase log.
#[derive(Debug, Clone)]
pub struct PurchaseFilter {
    pub app_name: Option<String>,
    pub include_sandbox: bool,
    /// `Some(true)` = trials only, `Some(false)` = paid only, `None` = both.
    pub trial: Option<bool>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl Default for PurchaseFilter {
    fn default() -> Self {
        Self {
            app_name: None,
            include_sandbox: true,
            trial: None,
            since: None,
            until: None,
        }
    }
}

/// A pagination window.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

/// Repository for purchase database operations.
pub struct PurchaseRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PurchaseRepository<'a> {
    /// Create a new purchase repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a purchase to the log.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, purchase: &Purchase) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO purchases (currency_code, price, price_formatted, kind, is_sandbox, \
             app_name, store_front, is_trial, trial_period, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&purchase.currency_code)
        .bind(purchase.price)
        .bind(&purchase.price_formatted)
        .bind(&purchase.kind)
        .bind(purchase.is_sandbox)
        .bind(&purchase.app_name)
        .bind(&purchase.store_front)
        .bind(purchase.is_trial)
        .bind(&purchase.trial_period)
        .bind(purchase.created_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Matching purchases, newest first. `page` limits the result; `None`
    /// returns the full match set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &PurchaseFilter,
        page: Option<Page>,
    ) -> Result<Vec<Purchase>, RepositoryError> {
        let mut qb = filtered_query(filter);
        qb.push(" ORDER BY created_at DESC, id DESC");
        if let Some(page) = page {
            qb.push(" LIMIT ")
                .push_bind(page.limit)
                .push(" OFFSET ")
                .push_bind(page.offset);
        }

        let rows: Vec<PurchaseRow> = qb.build_query_as().fetch_all(self.pool).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Distinct app names seen in the purchase log.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn distinct_apps(&self) -> Result<Vec<String>, RepositoryError> {
        let apps = sqlx::query_scalar("SELECT DISTINCT app_name FROM purchases ORDER BY app_name")
            .fetch_all(self.pool)
            .await?;
        Ok(apps)
    }
}

fn filtered_query(filter: &PurchaseFilter) -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new(SELECT_COLUMNS);
    qb.push(" WHERE 1 = 1");
    if let Some(app) = &filter.app_name {
        qb.push(" AND app_name = ").push_bind(app.clone());
    }
    if !filter.include_sandbox {
        qb.push(" AND is_sandbox = 0");
    }
    if let Some(trial) = filter.trial {
        qb.push(" AND is_trial = ").push_bind(trial);
    }
    if let Some(since) = filter.since {
        qb.push(" AND created_at >= ").push_bind(since);
    }
    if let Some(until) = filter.until {
        qb.push(" AND created_at <= ").push_bind(until);
    }
    qb
}
