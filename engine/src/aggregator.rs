use std::sync::Arc;

use anyhow::ensure;
use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use shared::{day_string, days_inclusive, Counts, Provider, UtcWindow};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::ContribStore;
use crate::providers::ContributionProvider;

pub const DEFAULT_BACKFILL_CONCURRENCY: usize = 4;
const MIN_BACKFILL_CONCURRENCY: usize = 1;
const MAX_BACKFILL_CONCURRENCY: usize = 8;

#[derive(Debug, Clone)]
pub struct RefreshDay {
    pub user_id: Uuid,
    pub day: NaiveDate,
    pub github_login: Option<String>,
    pub gitlab_username: Option<String>,
    pub skip_totals_recompute: bool,
}

#[derive(Debug, Clone)]
pub struct RefreshRange {
    pub user_id: Uuid,
    pub from_day: NaiveDate,
    pub to_day: NaiveDate,
    pub github_login: Option<String>,
    pub gitlab_username: Option<String>,
    pub concurrency: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderUpdate {
    pub provider: Provider,
    pub counts: Counts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayOutcome {
    pub day: String,
    pub updated: Vec<ProviderUpdate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeOutcome {
    pub days_refreshed: Vec<String>,
}

/// Orchestrates providers against the rolling-totals store: fetch a day's
/// counts, overwrite the daily row, re-derive the window totals.
pub struct Aggregator<S> {
    store: S,
    github: Option<Arc<dyn ContributionProvider>>,
    gitlab: Option<Arc<dyn ContributionProvider>>,
    default_concurrency: usize,
}

impl<S: ContribStore> Aggregator<S> {
    pub fn new(
        store: S,
        github: Option<Arc<dyn ContributionProvider>>,
        gitlab: Option<Arc<dyn ContributionProvider>>,
    ) -> Self {
        Self {
            store,
            github,
            gitlab,
            default_concurrency: DEFAULT_BACKFILL_CONCURRENCY,
        }
    }

    /// Default worker count for range backfills that don't ask for one,
    /// clamped to [1, 8].
    pub fn with_backfill_concurrency(mut self, concurrency: usize) -> Self {
        self.default_concurrency =
            concurrency.clamp(MIN_BACKFILL_CONCURRENCY, MAX_BACKFILL_CONCURRENCY);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Refreshes one user/day. The GitHub and GitLab branches run
    /// concurrently and are independent: one branch failing does not undo
    /// the other's upsert, but either error aborts the call.
    #[instrument(skip(self, req), fields(user = %req.user_id, day = %req.day))]
    pub async fn refresh_user_day(&self, req: &RefreshDay) -> anyhow::Result<DayOutcome> {
        let window = UtcWindow::day(req.day);
        let (github, gitlab) = tokio::join!(
            self.refresh_provider(
                req,
                Provider::Github,
                self.github.as_deref(),
                req.github_login.as_deref(),
                window,
            ),
            self.refresh_provider(
                req,
                Provider::Gitlab,
                self.gitlab.as_deref(),
                req.gitlab_username.as_deref(),
                window,
            ),
        );

        let mut updated = Vec::new();
        if let Some(counts) = github? {
            updated.push(ProviderUpdate {
                provider: Provider::Github,
                counts,
            });
        }
        if let Some(counts) = gitlab? {
            updated.push(ProviderUpdate {
                provider: Provider::Gitlab,
                counts,
            });
        }

        Ok(DayOutcome {
            day: day_string(req.day),
            updated,
        })
    }

    async fn refresh_provider(
        &self,
        req: &RefreshDay,
        provider: Provider,
        client: Option<&dyn ContributionProvider>,
        identity: Option<&str>,
        window: UtcWindow,
    ) -> anyhow::Result<Option<Counts>> {
        let (Some(client), Some(identity)) = (client, identity) else {
            return Ok(None);
        };

        let counts = client.totals_for_window(identity, window).await?;
        self.store
            .upsert_daily(req.user_id, provider, req.day, counts)
            .await?;
        if !req.skip_totals_recompute {
            self.store
                .recompute_totals(req.user_id, provider, Utc::now())
                .await?;
        }
        Ok(Some(counts))
    }

    /// Backfills every day in the inclusive range through a bounded worker
    /// pool that pulls the next day as soon as a slot frees, then recomputes
    /// totals once per active provider.
    #[instrument(skip(self, req), fields(user = %req.user_id, from = %req.from_day, to = %req.to_day))]
    pub async fn refresh_user_day_range(&self, req: &RefreshRange) -> anyhow::Result<RangeOutcome> {
        ensure!(
            req.from_day <= req.to_day,
            "Invalid backfill range: {} is after {}",
            req.from_day,
            req.to_day
        );

        let concurrency = req
            .concurrency
            .unwrap_or(self.default_concurrency)
            .clamp(MIN_BACKFILL_CONCURRENCY, MAX_BACKFILL_CONCURRENCY);

        let outcomes: Vec<DayOutcome> = stream::iter(days_inclusive(req.from_day, req.to_day))
            .map(|day| {
                let day_req = RefreshDay {
                    user_id: req.user_id,
                    day,
                    github_login: req.github_login.clone(),
                    gitlab_username: req.gitlab_username.clone(),
                    skip_totals_recompute: true,
                };
                async move { self.refresh_user_day(&day_req).await }
            })
            .buffer_unordered(concurrency)
            .try_collect()
            .await?;

        // Window totals are anchored at the current wall clock, not at the
        // end of the backfilled range.
        let now = Utc::now();
        if self.github.is_some() && req.github_login.is_some() {
            self.store
                .recompute_totals(req.user_id, Provider::Github, now)
                .await?;
        }
        if self.gitlab.is_some() && req.gitlab_username.is_some() {
            self.store
                .recompute_totals(req.user_id, Provider::Gitlab, now)
                .await?;
        }

        let mut days_refreshed: Vec<String> =
            outcomes.into_iter().map(|outcome| outcome.day).collect();
        days_refreshed.sort();
        info!("Backfilled {} days", days_refreshed.len());

        Ok(RangeOutcome { days_refreshed })
    }
}
