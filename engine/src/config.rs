use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;

use crate::aggregator::Aggregator;
use crate::cache::RedisStore;
use crate::db::PgStore;
use crate::providers::{ContributionProvider, GithubProvider, GitlabProvider};

#[derive(Debug, Deserialize)]
pub struct Env {
    pub database_url: String,
    pub redis_url: String,
    pub github_token: String,
    pub gitlab_token: Option<String>,
    pub gitlab_base_url: Option<String>,
    pub gitlab_page_size: Option<u32>,
    pub gitlab_max_pages: Option<u32>,
    pub backfill_concurrency: Option<usize>,
}

impl Env {
    pub fn load() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        envy::from_env::<Env>().context("Failed to load environment variables")
    }

    pub fn gitlab_base_url(&self) -> &str {
        self.gitlab_base_url
            .as_deref()
            .unwrap_or(crate::providers::GITLAB_DEFAULT_BASE_URL)
    }
}

/// Connected handles the hosting application drives the engine through.
pub struct EngineDeps {
    pub store: PgStore,
    pub fast: RedisStore,
    pub aggregator: Aggregator<PgStore>,
}

pub async fn build(env: &Env) -> anyhow::Result<EngineDeps> {
    let store = PgStore::connect(&env.database_url).await?;
    store.run_migrations().await?;
    let fast = RedisStore::connect(&env.redis_url).await?;

    let github =
        Some(Arc::new(GithubProvider::new(&env.github_token)?) as Arc<dyn ContributionProvider>);

    let mut gitlab = GitlabProvider::new(env.gitlab_base_url(), env.gitlab_token.clone())?;
    if env.gitlab_page_size.is_some() || env.gitlab_max_pages.is_some() {
        gitlab = gitlab.with_paging(
            env.gitlab_page_size.unwrap_or(crate::providers::GITLAB_DEFAULT_PAGE_SIZE),
            env.gitlab_max_pages.unwrap_or(crate::providers::GITLAB_DEFAULT_MAX_PAGES),
        );
    }
    let gitlab = Some(Arc::new(gitlab) as Arc<dyn ContributionProvider>);

    let mut aggregator = Aggregator::new(store.clone(), github, gitlab);
    if let Some(concurrency) = env.backfill_concurrency {
        aggregator = aggregator.with_backfill_concurrency(concurrency);
    }
    Ok(EngineDeps {
        store,
        fast,
        aggregator,
    })
}
