//! Fast-store key namespace.
//!
//! `lb:total:{all|30d|365d}` combined boards, `lb:{provider}:{window}` per
//! provider, `lb:users` the set of known user ids, `lb:user:{id}` display
//! metadata. Lock keys are namespaced by purpose, not under `lb:`.

use chrono::NaiveDate;
use shared::{compact_day_string, Provider, Scope, Window};
use uuid::Uuid;

pub fn leaderboard(scope: Scope, window: Window) -> String {
    match scope {
        Scope::Combined => format!("lb:total:{window}"),
        Scope::Github => format!("lb:github:{window}"),
        Scope::Gitlab => format!("lb:gitlab:{window}"),
    }
}

pub fn users() -> &'static str {
    "lb:users"
}

pub fn user_meta(user_id: Uuid) -> String {
    format!("lb:user:{user_id}")
}

pub fn daily_lock(provider: Provider, user_id: Uuid, day: NaiveDate) -> String {
    format!(
        "daily:{provider}:{user_id}:{}",
        compact_day_string(day)
    )
}

pub fn backfill_lock(provider: Provider, user_id: Uuid) -> String {
    format!("backfill:{provider}:{user_id}")
}
