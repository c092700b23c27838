//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::services::push::PushSender;
use crate::services::rates::RateSource;

/// Application state shared across all handlers.
///
/// External collaborators are held as injected handles so handlers can be
/// exercised against fake gateways and an in-memory store.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pool: SqlitePool,
    rates: Arc<dyn RateSource>,
    push: Option<Arc<dyn PushSender>>,
}

impl AppState {
    /// Assemble the state from its parts. `push` is `None` when the push
    /// relay is not configured; purchase logging then skips fan-out.
    #[must_use]
    pub fn new(
        pool: SqlitePool,
        rates: Arc<dyn RateSource>,
        push: Option<Arc<dyn PushSender>>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner { pool, rates, push }),
        }
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }

    #[must_use]
    pub fn rates(&self) -> &dyn RateSource {
        self.inner.rates.as_ref()
    }

    #[must_use]
    pub fn push(&self) -> Option<&dyn PushSender> {
        self.inner.push.as_deref()
    }
}
