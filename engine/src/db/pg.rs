use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use shared::{Counts, Provider, Window};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ContribStore, ScoreRow, TotalsRecord};

const UPSERT_DAILY: &str = r#"
INSERT INTO contrib_daily (user_id, provider, date_utc, commits, prs, issues, created_at, updated_at)
VALUES ($1, $2::contrib_provider, $3, $4, $5, $6, now(), now())
ON CONFLICT (user_id, provider, date_utc) DO UPDATE
SET commits = EXCLUDED.commits,
    prs = EXCLUDED.prs,
    issues = EXCLUDED.issues,
    updated_at = now()
"#;

const RECOMPUTE_TOTALS: &str = r#"
WITH sums AS (
    SELECT
        CAST(COALESCE(SUM(commits + prs + issues), 0) AS INT) AS all_time,
        CAST(COALESCE(SUM(commits + prs + issues)
            FILTER (WHERE date_utc >= $3 AND date_utc < $4), 0) AS INT) AS last_30d,
        CAST(COALESCE(SUM(commits + prs + issues)
            FILTER (WHERE date_utc >= $5 AND date_utc < $4), 0) AS INT) AS last_365d
    FROM contrib_daily
    WHERE user_id = $1 AND provider = $2::contrib_provider
)
INSERT INTO contrib_totals (user_id, provider, all_time, last_30d, last_365d, updated_at)
SELECT $1, $2::contrib_provider, all_time, last_30d, last_365d, now()
FROM sums
ON CONFLICT (user_id, provider) DO UPDATE
SET all_time = EXCLUDED.all_time,
    last_30d = EXCLUDED.last_30d,
    last_365d = EXCLUDED.last_365d,
    updated_at = now()
RETURNING all_time, last_30d, last_365d
"#;

const TOTALS_FOR_USER: &str = r#"
SELECT user_id, provider::TEXT AS provider, all_time, last_30d, last_365d
FROM contrib_totals
WHERE user_id = $1
ORDER BY provider
"#;

fn combined_page_sql(window: Window) -> &'static str {
    match window {
        Window::AllTime => {
            "SELECT user_id, CAST(SUM(all_time) AS BIGINT) AS score FROM contrib_totals \
             GROUP BY user_id ORDER BY score DESC, user_id LIMIT $1 OFFSET $2"
        }
        Window::Last30d => {
            "SELECT user_id, CAST(SUM(last_30d) AS BIGINT) AS score FROM contrib_totals \
             GROUP BY user_id ORDER BY score DESC, user_id LIMIT $1 OFFSET $2"
        }
        Window::Last365d => {
            "SELECT user_id, CAST(SUM(last_365d) AS BIGINT) AS score FROM contrib_totals \
             GROUP BY user_id ORDER BY score DESC, user_id LIMIT $1 OFFSET $2"
        }
    }
}

fn provider_page_sql(window: Window) -> &'static str {
    match window {
        Window::AllTime => {
            "SELECT user_id, CAST(all_time AS BIGINT) AS score FROM contrib_totals \
             WHERE provider = $3::contrib_provider ORDER BY score DESC, user_id LIMIT $1 OFFSET $2"
        }
        Window::Last30d => {
            "SELECT user_id, CAST(last_30d AS BIGINT) AS score FROM contrib_totals \
             WHERE provider = $3::contrib_provider ORDER BY score DESC, user_id LIMIT $1 OFFSET $2"
        }
        Window::Last365d => {
            "SELECT user_id, CAST(last_365d AS BIGINT) AS score FROM contrib_totals \
             WHERE provider = $3::contrib_provider ORDER BY score DESC, user_id LIMIT $1 OFFSET $2"
        }
    }
}

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .connect(url)
            .await
            .context("Failed to connect to the database")?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ContribStore for PgStore {
    async fn upsert_daily(
        &self,
        user_id: Uuid,
        provider: Provider,
        day: NaiveDate,
        counts: Counts,
    ) -> anyhow::Result<()> {
        sqlx::query(UPSERT_DAILY)
            .bind(user_id)
            .bind(provider.as_str())
            .bind(day)
            .bind(counts.commits as i32)
            .bind(counts.prs as i32)
            .bind(counts.issues as i32)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn recompute_totals(
        &self,
        user_id: Uuid,
        provider: Provider,
        now: DateTime<Utc>,
    ) -> anyhow::Result<TotalsRecord> {
        let today = now.date_naive();
        let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
        let since_30d = Window::Last30d.lower_bound(today).unwrap_or(NaiveDate::MIN);
        let since_365d = Window::Last365d.lower_bound(today).unwrap_or(NaiveDate::MIN);

        let (all_time, last_30d, last_365d) = sqlx::query_as::<_, (i32, i32, i32)>(RECOMPUTE_TOTALS)
            .bind(user_id)
            .bind(provider.as_str())
            .bind(since_30d)
            .bind(tomorrow)
            .bind(since_365d)
            .fetch_one(&self.pool)
            .await?;

        Ok(TotalsRecord {
            user_id,
            provider,
            all_time: all_time.into(),
            last_30d: last_30d.into(),
            last_365d: last_365d.into(),
        })
    }

    async fn totals_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<TotalsRecord>> {
        let rows = sqlx::query_as::<_, (Uuid, String, i32, i32, i32)>(TOTALS_FOR_USER)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|(user_id, provider, all_time, last_30d, last_365d)| {
                let provider = provider
                    .parse::<Provider>()
                    .with_context(|| format!("Unknown provider in contrib_totals: {provider}"))?;
                Ok(TotalsRecord {
                    user_id,
                    provider,
                    all_time: all_time.into(),
                    last_30d: last_30d.into(),
                    last_365d: last_365d.into(),
                })
            })
            .collect()
    }

    async fn combined_page(
        &self,
        window: Window,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<ScoreRow>> {
        let rows = sqlx::query_as::<_, (Uuid, i64)>(combined_page_sql(window))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(user_id, score)| ScoreRow { user_id, score })
            .collect())
    }

    async fn provider_page(
        &self,
        provider: Provider,
        window: Window,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<ScoreRow>> {
        let rows = sqlx::query_as::<_, (Uuid, i64)>(provider_page_sql(window))
            .bind(limit)
            .bind(offset)
            .bind(provider.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(user_id, score)| ScoreRow { user_id, score })
            .collect())
    }
}
