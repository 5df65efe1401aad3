use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use shared::{Counts, Provider, Window};
use uuid::Uuid;

mod pg;

#[cfg(test)]
pub(crate) mod mem;

pub use pg::PgStore;

/// Pre-aggregated window totals for one user/provider pair. A materialized,
/// possibly-stale view over the daily rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalsRecord {
    pub user_id: Uuid,
    pub provider: Provider,
    pub all_time: i64,
    pub last_30d: i64,
    pub last_365d: i64,
}

impl TotalsRecord {
    pub fn window_total(&self, window: Window) -> i64 {
        match window {
            Window::AllTime => self.all_time,
            Window::Last30d => self.last_30d,
            Window::Last365d => self.last_365d,
        }
    }
}

/// One leaderboard row as answered by the relational store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRow {
    pub user_id: Uuid,
    pub score: i64,
}

/// Source of truth for daily counts and rolling totals.
///
/// `upsert_daily` overwrites: a row always reflects the latest known counts
/// for that day, never an accumulation across refreshes. Totals are always
/// recomputed from daily rows, never maintained incrementally.
#[async_trait]
pub trait ContribStore: Send + Sync {
    async fn upsert_daily(
        &self,
        user_id: Uuid,
        provider: Provider,
        day: NaiveDate,
        counts: Counts,
    ) -> anyhow::Result<()>;

    /// Re-derives the three window totals from the daily rows, anchored at
    /// `now`: all-time unbounded, 30d/365d over `[today - N, tomorrow)`.
    async fn recompute_totals(
        &self,
        user_id: Uuid,
        provider: Provider,
        now: DateTime<Utc>,
    ) -> anyhow::Result<TotalsRecord>;

    async fn totals_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<TotalsRecord>>;

    /// Top users by the window column summed across providers, descending,
    /// user id as the tie-break so pages are stable.
    async fn combined_page(
        &self,
        window: Window,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<ScoreRow>>;

    /// Top users by one provider's window column, descending.
    async fn provider_page(
        &self,
        provider: Provider,
        window: Window,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<ScoreRow>>;
}
