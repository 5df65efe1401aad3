use async_trait::async_trait;
use shared::{Counts, UtcWindow};

mod github;
mod gitlab;

pub use github::{GithubDayTotals, GithubProvider, RateLimitInfo};
pub use gitlab::{
    GitlabDayTotals, GitlabProvider, GITLAB_DEFAULT_BASE_URL, GITLAB_DEFAULT_MAX_PAGES,
    GITLAB_DEFAULT_PAGE_SIZE,
};

/// A contribution source that can report a user's commit/PR/issue activity
/// inside a half-open UTC time range. An identity that does not resolve
/// yields zero counts, indistinguishable from a quiet day.
#[async_trait]
pub trait ContributionProvider: Send + Sync {
    async fn totals_for_window(&self, identity: &str, window: UtcWindow) -> anyhow::Result<Counts>;
}
