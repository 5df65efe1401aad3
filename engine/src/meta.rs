//! Display metadata for leaderboard rows: one hash per user in the fast
//! store, batched resolution for a page of user ids.

use std::collections::HashMap;

use tracing::instrument;
use uuid::Uuid;

use crate::cache::{keys, FastStore, WriteBatch};
use crate::db::ContribStore;
use crate::leaderboard::sync_user_leaderboards;

const FIELD_GITHUB_LOGIN: &str = "githubLogin";
const FIELD_GITLAB_USERNAME: &str = "gitlabUsername";
const FIELD_USERNAME: &str = "username";
const FIELD_AVATAR_URL: &str = "avatarUrl";

#[derive(Debug, Clone, Default)]
pub struct UserMetaInput {
    pub github_login: Option<String>,
    pub gitlab_username: Option<String>,
}

/// Resolved display profile. `username` always resolves to something
/// renderable, worst case a truncated user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMeta {
    pub user_id: Uuid,
    pub username: String,
    pub avatar_url: Option<String>,
    pub github_login: Option<String>,
    pub gitlab_username: Option<String>,
}

/// Stores the non-empty identity fields plus the derived display fields,
/// and registers the user in the known-users set. With `seed_leaderboards`
/// the user's boards are synced in the same call, so a brand-new profile is
/// immediately rankable.
#[instrument(skip(store, fast, meta))]
pub async fn set_user_meta<S, F>(
    store: &S,
    fast: &F,
    user_id: Uuid,
    meta: &UserMetaInput,
    seed_leaderboards: bool,
) -> anyhow::Result<()>
where
    S: ContribStore,
    F: FastStore,
{
    let github_login = non_empty(meta.github_login.as_deref());
    let gitlab_username = non_empty(meta.gitlab_username.as_deref());

    let mut fields = Vec::new();
    if let Some(login) = github_login {
        fields.push((FIELD_GITHUB_LOGIN.to_string(), login.to_string()));
    }
    if let Some(username) = gitlab_username {
        fields.push((FIELD_GITLAB_USERNAME.to_string(), username.to_string()));
    }
    if let Some(display) = github_login.or(gitlab_username) {
        fields.push((FIELD_USERNAME.to_string(), display.to_string()));
    }
    if let Some(login) = github_login {
        fields.push((FIELD_AVATAR_URL.to_string(), github_avatar_url(login)));
    }

    let mut batch = WriteBatch::default();
    if !fields.is_empty() {
        batch.hset(keys::user_meta(user_id), fields);
    }
    batch.sadd(keys::users().to_string(), user_id.to_string());
    fast.apply(batch).await?;

    if seed_leaderboards {
        sync_user_leaderboards(store, fast, user_id).await?;
    }
    Ok(())
}

/// Batched hash reads, one `UserMeta` per requested id in order. Ids with
/// no stored hash still resolve to a truncated-id username.
pub async fn get_user_metas<F: FastStore>(
    fast: &F,
    user_ids: &[Uuid],
) -> anyhow::Result<Vec<UserMeta>> {
    let meta_keys: Vec<String> = user_ids.iter().map(|id| keys::user_meta(*id)).collect();
    let hashes = fast.hgetall_many(&meta_keys).await?;

    Ok(user_ids
        .iter()
        .zip(hashes)
        .map(|(user_id, hash)| resolve(*user_id, hash))
        .collect())
}

fn resolve(user_id: Uuid, hash: HashMap<String, String>) -> UserMeta {
    let github_login = hash.get(FIELD_GITHUB_LOGIN).cloned();
    let gitlab_username = hash.get(FIELD_GITLAB_USERNAME).cloned();

    let username = hash
        .get(FIELD_USERNAME)
        .or(github_login.as_ref())
        .or(gitlab_username.as_ref())
        .cloned()
        .unwrap_or_else(|| truncated_id(user_id));

    let avatar_url = hash
        .get(FIELD_AVATAR_URL)
        .cloned()
        .or_else(|| github_login.as_deref().map(github_avatar_url));

    UserMeta {
        user_id,
        username,
        avatar_url,
        github_login,
        gitlab_username,
    }
}

fn github_avatar_url(login: &str) -> String {
    format!("https://github.com/{login}.png")
}

fn truncated_id(user_id: Uuid) -> String {
    let id = user_id.to_string();
    id[..8].to_string()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
