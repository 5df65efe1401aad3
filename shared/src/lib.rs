use std::ops::Add;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

mod day;

pub use day::*;
pub use strum::IntoEnumIterator;

/// Contribution source a daily record was ingested from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Provider {
    Github,
    Gitlab,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Github => "github",
            Provider::Gitlab => "gitlab",
        }
    }
}

/// Leaderboard scope: a single provider or all providers summed together.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Scope {
    Combined,
    Github,
    Gitlab,
}

impl From<Provider> for Scope {
    fn from(provider: Provider) -> Self {
        match provider {
            Provider::Github => Scope::Github,
            Provider::Gitlab => Scope::Gitlab,
        }
    }
}

/// Rolling window over which daily counts are summed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum Window {
    #[serde(rename = "all")]
    #[strum(serialize = "all")]
    AllTime,
    #[serde(rename = "30d")]
    #[strum(serialize = "30d")]
    Last30d,
    #[serde(rename = "365d")]
    #[strum(serialize = "365d")]
    Last365d,
}

impl Window {
    /// Inclusive lower bound of the window anchored at `today`,
    /// or `None` when the window is unbounded. The exclusive upper
    /// bound is always tomorrow.
    pub fn lower_bound(&self, today: chrono::NaiveDate) -> Option<chrono::NaiveDate> {
        let days = match self {
            Window::AllTime => return None,
            Window::Last30d => 30,
            Window::Last365d => 365,
        };
        today.checked_sub_days(chrono::Days::new(days))
    }
}

/// Per-day contribution counts for one provider. GitLab merge requests
/// are carried in `prs`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub commits: i64,
    pub prs: i64,
    pub issues: i64,
}

impl Counts {
    pub fn new(commits: i64, prs: i64, issues: i64) -> Self {
        Self {
            commits,
            prs,
            issues,
        }
    }

    /// A contribution is a commit, a PR/MR or an issue.
    pub fn total(&self) -> i64 {
        self.commits + self.prs + self.issues
    }

    pub fn is_zero(&self) -> bool {
        self.total() == 0
    }
}

impl Add for Counts {
    type Output = Counts;

    fn add(self, other: Counts) -> Counts {
        Counts {
            commits: self.commits + other.commits,
            prs: self.prs + other.prs,
            issues: self.issues + other.issues,
        }
    }
}
