use anyhow::{bail, Context};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use octocrab::Octocrab;
use serde::Deserialize;
use shared::{Counts, UtcWindow};
use tracing::instrument;

use super::ContributionProvider;

/// One windowed query covers the whole day; GitHub pre-aggregates the three
/// totals server-side.
const CONTRIBUTIONS_QUERY: &str = r#"
query($login: String!, $from: DateTime!, $to: DateTime!) {
    user(login: $login) {
        contributionsCollection(from: $from, to: $to) {
            totalCommitContributions
            totalPullRequestContributions
            totalIssueContributions
        }
    }
    rateLimit {
        limit
        remaining
        resetAt
    }
}
"#;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GithubDayTotals {
    pub counts: Counts,
    pub rate_limit: Option<RateLimitInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContributionsCollection {
    total_commit_contributions: i64,
    total_pull_request_contributions: i64,
    total_issue_contributions: i64,
}

#[derive(Clone)]
pub struct GithubProvider {
    octocrab: Octocrab,
}

impl GithubProvider {
    pub fn new(token: &str) -> anyhow::Result<Self> {
        let octocrab = Octocrab::builder()
            .personal_token(token.to_string())
            .build()?;
        Ok(Self { octocrab })
    }

    #[instrument(skip(self))]
    pub async fn contributions_for_window(
        &self,
        login: &str,
        window: UtcWindow,
    ) -> anyhow::Result<GithubDayTotals> {
        let payload = serde_json::json!({
            "query": CONTRIBUTIONS_QUERY,
            "variables": {
                "login": login,
                "from": window.from.to_rfc3339_opts(SecondsFormat::Secs, true),
                "to": window.to.to_rfc3339_opts(SecondsFormat::Secs, true),
            },
        });
        let response: serde_json::Value = self.octocrab.graphql(&payload).await?;
        parse_contributions(&response)
    }
}

#[async_trait]
impl ContributionProvider for GithubProvider {
    async fn totals_for_window(&self, identity: &str, window: UtcWindow) -> anyhow::Result<Counts> {
        Ok(self
            .contributions_for_window(identity, window)
            .await?
            .counts)
    }
}

fn parse_contributions(response: &serde_json::Value) -> anyhow::Result<GithubDayTotals> {
    let rate_limit = parse_rate_limit(response);

    if let Some(errors) = response.get("errors").and_then(serde_json::Value::as_array) {
        if !errors.is_empty() {
            let only_not_found = errors
                .iter()
                .all(|error| error.get("type").and_then(serde_json::Value::as_str) == Some("NOT_FOUND"));
            if !only_not_found {
                bail!("GitHub GraphQL error: {errors:?}");
            }
            // An unknown login is reported as NOT_FOUND alongside a null
            // user; the caller cannot tell it apart from zero activity.
            return Ok(GithubDayTotals {
                counts: Counts::default(),
                rate_limit,
            });
        }
    }

    let user = response.pointer("/data/user");
    if user.map_or(true, serde_json::Value::is_null) {
        return Ok(GithubDayTotals {
            counts: Counts::default(),
            rate_limit,
        });
    }

    let collection = response
        .pointer("/data/user/contributionsCollection")
        .cloned()
        .context("Malformed GitHub response: missing contributionsCollection")?;
    let collection: ContributionsCollection = serde_json::from_value(collection)
        .context("Malformed GitHub response: bad contributionsCollection")?;

    Ok(GithubDayTotals {
        counts: Counts::new(
            collection.total_commit_contributions,
            collection.total_pull_request_contributions,
            collection.total_issue_contributions,
        ),
        rate_limit,
    })
}

fn parse_rate_limit(response: &serde_json::Value) -> Option<RateLimitInfo> {
    response
        .pointer("/data/rateLimit")
        .and_then(|value| serde_json::from_value(value.clone()).ok())
}
