use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use shared::{Counts, UtcWindow};
use tracing::{debug, instrument};

use super::ContributionProvider;

pub const GITLAB_DEFAULT_BASE_URL: &str = "https://gitlab.com";
pub const GITLAB_DEFAULT_PAGE_SIZE: u32 = 100;
pub const GITLAB_DEFAULT_MAX_PAGES: u32 = 10;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const MIN_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;
const MIN_PAGES: u32 = 1;
const MAX_PAGES: u32 = 50;
const MIN_RETRY_AFTER_SECS: u64 = 1;
const MAX_RETRY_AFTER_SECS: u64 = 10;

#[derive(Debug, Clone, Deserialize)]
struct GitlabUser {
    id: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct Event {
    created_at: DateTime<Utc>,
    action_name: String,
    target_type: Option<String>,
    push_data: Option<PushData>,
}

#[derive(Debug, Clone, Deserialize)]
struct PushData {
    commit_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GitlabDayTotals {
    pub counts: Counts,
    pub pages_fetched: u32,
    /// Set when the page ceiling was hit before the feed ran out, meaning
    /// older events inside the window may have been missed.
    pub truncated: bool,
}

/// GitLab has no windowed aggregate, so the provider resolves the username
/// to a numeric id and reduces the paginated activity-events feed itself.
pub struct GitlabProvider {
    http: Client,
    base_url: String,
    token: Option<String>,
    per_page: u32,
    max_pages: u32,
}

impl GitlabProvider {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            per_page: GITLAB_DEFAULT_PAGE_SIZE,
            max_pages: GITLAB_DEFAULT_MAX_PAGES,
        })
    }

    /// Page size is clamped to [20, 100], the page ceiling to [1, 50].
    pub fn with_paging(mut self, per_page: u32, max_pages: u32) -> Self {
        self.per_page = per_page.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);
        self.max_pages = max_pages.clamp(MIN_PAGES, MAX_PAGES);
        self
    }

    #[instrument(skip(self))]
    pub async fn events_for_window(
        &self,
        username: &str,
        window: UtcWindow,
    ) -> anyhow::Result<GitlabDayTotals> {
        let Some(user_id) = self.resolve_user_id(username).await? else {
            return Ok(GitlabDayTotals {
                counts: Counts::default(),
                pages_fetched: 0,
                truncated: false,
            });
        };

        let url = format!("{}/api/v4/users/{}/events", self.base_url, user_id);
        let mut counts = Counts::default();
        let mut pages_fetched = 0;
        let mut exhausted = false;

        for page in 1..=self.max_pages {
            let query = [
                ("per_page".to_string(), self.per_page.to_string()),
                ("page".to_string(), page.to_string()),
            ];
            let response = self.get_with_retry(&url, &query).await?.error_for_status()?;
            let events: Vec<Event> = response
                .json()
                .await
                .context("Malformed GitLab events payload")?;
            pages_fetched += 1;

            counts = counts + reduce_events(&events, window);

            if events.len() < self.per_page as usize || page_before_window(&events, window) {
                exhausted = true;
                break;
            }
        }

        Ok(GitlabDayTotals {
            counts,
            pages_fetched,
            truncated: !exhausted,
        })
    }

    #[instrument(skip(self))]
    async fn resolve_user_id(&self, username: &str) -> anyhow::Result<Option<u64>> {
        let url = format!("{}/api/v4/users", self.base_url);
        let query = [("username".to_string(), username.to_string())];
        let response = self.get_with_retry(&url, &query).await?.error_for_status()?;
        let users: Vec<GitlabUser> = response
            .json()
            .await
            .context("Malformed GitLab user lookup payload")?;
        Ok(users.first().map(|user| user.id))
    }

    /// On 429, waits for the advertised Retry-After (clamped to [1, 10]
    /// seconds) and retries exactly once.
    async fn get_with_retry(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> anyhow::Result<Response> {
        let response = self.send(url, query).await?;
        if response.status() != StatusCode::TOO_MANY_REQUESTS {
            return Ok(response);
        }

        let header = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let wait = retry_after_secs(header.as_deref());
        debug!("GitLab rate limited on {url}, retrying in {wait}s");
        tokio::time::sleep(Duration::from_secs(wait)).await;

        let response = self.send(url, query).await?;
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            bail!("GitLab rate limit still exceeded after retry: {url}");
        }
        Ok(response)
    }

    async fn send(&self, url: &str, query: &[(String, String)]) -> anyhow::Result<Response> {
        let mut request = self.http.get(url).query(query);
        if let Some(token) = &self.token {
            request = request.header("PRIVATE-TOKEN", token);
        }
        Ok(request.send().await?)
    }
}

#[async_trait]
impl ContributionProvider for GitlabProvider {
    async fn totals_for_window(&self, identity: &str, window: UtcWindow) -> anyhow::Result<Counts> {
        Ok(self.events_for_window(identity, window).await?.counts)
    }
}

/// "Created contribution" semantics: a push counts its commits, an opened
/// merge request or issue counts once, every other action (close, merge,
/// comment, ...) is ignored.
fn reduce_events(events: &[Event], window: UtcWindow) -> Counts {
    let mut counts = Counts::default();
    for event in events {
        if !window.contains(event.created_at) {
            continue;
        }
        if let Some(commit_count) = event.push_data.as_ref().and_then(|push| push.commit_count) {
            counts.commits += commit_count.max(0);
        } else if event.action_name == "opened" {
            match event.target_type.as_deref() {
                Some("MergeRequest") => counts.prs += 1,
                Some("Issue") => counts.issues += 1,
                _ => {}
            }
        }
    }
    counts
}

/// The feed is newest-first; once a whole page predates the window there is
/// nothing left to find on later pages.
fn page_before_window(events: &[Event], window: UtcWindow) -> bool {
    !events.is_empty() && events.iter().all(|event| event.created_at < window.from)
}

fn retry_after_secs(header: Option<&str>) -> u64 {
    header
        .and_then(|value| value.parse().ok())
        .unwrap_or(MIN_RETRY_AFTER_SECS)
        .clamp(MIN_RETRY_AFTER_SECS, MAX_RETRY_AFTER_SECS)
}
