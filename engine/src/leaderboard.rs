//! Leaderboard projection: pushes a user's window totals into the fast
//! store's sorted sets and serves paginated top-K reads, falling back to the
//! relational store when the fast store has nothing for a key.

use anyhow::Context;
use shared::{IntoEnumIterator, Scope, Window};
use tracing::instrument;
use uuid::Uuid;

use crate::cache::{keys, FastStore, WriteBatch};
use crate::db::{ContribStore, ScoreRow};

const MIN_PAGE_LIMIT: i64 = 1;
const MAX_PAGE_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy)]
pub struct PageQuery {
    pub scope: Scope,
    pub window: Window,
    pub limit: i64,
    pub cursor: i64,
}

/// Which store actually answered a page. An availability choice, not a
/// freshness check: a stale fast-store page still wins over the relational
/// store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSource {
    Redis,
    Db,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardPage {
    pub entries: Vec<ScoreRow>,
    pub next_cursor: Option<i64>,
    pub source: PageSource,
}

/// Projects the user's current totals into every board: per-provider scores
/// for the providers present, combined scores always (zero included, so
/// users with no contributions yet are still ranked), membership in the
/// known-users set. One pipelined batch.
#[instrument(skip(store, fast))]
pub async fn sync_user_leaderboards<S, F>(
    store: &S,
    fast: &F,
    user_id: Uuid,
) -> anyhow::Result<()>
where
    S: ContribStore,
    F: FastStore,
{
    let totals = store.totals_for_user(user_id).await?;
    let member = user_id.to_string();

    let mut batch = WriteBatch::default();
    for window in Window::iter() {
        let combined: i64 = totals
            .iter()
            .map(|record| record.window_total(window))
            .sum();
        batch.zadd(keys::leaderboard(Scope::Combined, window), member.clone(), combined);
    }
    for record in &totals {
        for window in Window::iter() {
            batch.zadd(
                keys::leaderboard(record.provider.into(), window),
                member.clone(),
                record.window_total(window),
            );
        }
    }
    batch.sadd(keys::users().to_string(), member);

    fast.apply(batch).await
}

/// Drops the user's score from every scope × window board. The known-users
/// set is left alone so the user's metadata stays resolvable.
pub async fn remove_user_from_leaderboards<F: FastStore>(
    fast: &F,
    user_id: Uuid,
) -> anyhow::Result<()> {
    let member = user_id.to_string();
    let mut batch = WriteBatch::default();
    for scope in Scope::iter() {
        for window in Window::iter() {
            batch.zrem(keys::leaderboard(scope, window), member.clone());
        }
    }
    fast.apply(batch).await
}

/// Top `limit` of the combined board for one window, best first.
pub async fn top_combined<F: FastStore>(
    fast: &F,
    limit: i64,
    window: Window,
) -> anyhow::Result<Vec<ScoreRow>> {
    if limit <= 0 {
        return Ok(Vec::new());
    }
    let key = keys::leaderboard(Scope::Combined, window);
    let entries = fast.ztop_desc(&key, 0, (limit - 1) as isize).await?;
    parse_members(entries)
}

/// One page of a board. Fast store first; when it has no entries for the
/// key (never synced, or genuinely empty), the relational store answers
/// with the identical shape.
#[instrument(skip(store, fast))]
pub async fn get_leaderboard_page<S, F>(
    store: &S,
    fast: &F,
    query: PageQuery,
) -> anyhow::Result<LeaderboardPage>
where
    S: ContribStore,
    F: FastStore,
{
    let limit = query.limit.clamp(MIN_PAGE_LIMIT, MAX_PAGE_LIMIT);
    let cursor = query.cursor.max(0);

    let key = keys::leaderboard(query.scope, query.window);
    let cached = fast
        .ztop_desc(&key, cursor as isize, (cursor + limit - 1) as isize)
        .await?;
    if !cached.is_empty() {
        let entries = parse_members(cached)?;
        return Ok(LeaderboardPage {
            next_cursor: next_cursor(entries.len(), limit, cursor),
            entries,
            source: PageSource::Redis,
        });
    }

    let entries = match query.scope {
        Scope::Combined => store.combined_page(query.window, limit, cursor).await?,
        Scope::Github => {
            store
                .provider_page(shared::Provider::Github, query.window, limit, cursor)
                .await?
        }
        Scope::Gitlab => {
            store
                .provider_page(shared::Provider::Gitlab, query.window, limit, cursor)
                .await?
        }
    };
    Ok(LeaderboardPage {
        next_cursor: next_cursor(entries.len(), limit, cursor),
        entries,
        source: PageSource::Db,
    })
}

fn next_cursor(returned: usize, limit: i64, cursor: i64) -> Option<i64> {
    (returned as i64 == limit).then_some(cursor + limit)
}

fn parse_members(entries: Vec<(String, i64)>) -> anyhow::Result<Vec<ScoreRow>> {
    entries
        .into_iter()
        .map(|(member, score)| {
            let user_id = Uuid::parse_str(&member)
                .with_context(|| format!("Leaderboard member is not a user id: {member}"))?;
            Ok(ScoreRow { user_id, score })
        })
        .collect()
}
