//! Short-TTL mutual exclusion on top of the fast store, keyed per
//! provider/user/day (daily refresh) or provider/user (backfill). There is
//! no wait-and-retry: contention fails fast and the scheduler is expected
//! to skip the cycle.

use std::fmt;
use std::future::Future;

use tracing::warn;

use crate::cache::FastStore;

pub const DEFAULT_LOCK_TTL_SECS: u64 = 120;

/// Returned by `with_lock` when someone else holds the key. Transient:
/// treat as "skip this cycle", never as fatal.
#[derive(Debug, Clone)]
pub struct LockBusy {
    pub key: String,
}

impl fmt::Display for LockBusy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lock in use: {}", self.key)
    }
}

impl std::error::Error for LockBusy {}

pub fn is_lock_busy(error: &anyhow::Error) -> bool {
    error.downcast_ref::<LockBusy>().is_some()
}

pub async fn acquire_lock<F: FastStore>(
    fast: &F,
    key: &str,
    ttl_secs: u64,
) -> anyhow::Result<bool> {
    fast.set_nx_ex(key, ttl_secs).await
}

/// Best-effort: a failed delete only means the key lives out its TTL.
pub async fn release_lock<F: FastStore>(fast: &F, key: &str) {
    if let Err(error) = fast.del(key).await {
        warn!("Failed to release lock {key}: {error:#}");
    }
}

pub async fn with_lock<F, Fut, T>(
    fast: &F,
    key: &str,
    ttl_secs: u64,
    f: impl FnOnce() -> Fut,
) -> anyhow::Result<T>
where
    F: FastStore,
    Fut: Future<Output = anyhow::Result<T>>,
{
    if !acquire_lock(fast, key, ttl_secs).await? {
        return Err(LockBusy {
            key: key.to_string(),
        }
        .into());
    }

    let result = f().await;
    release_lock(fast, key).await;
    result
}
