use std::collections::HashMap;

use async_trait::async_trait;

pub mod keys;
mod redis_store;

#[cfg(test)]
pub(crate) mod mem;

pub use redis_store::RedisStore;

/// A set of fast-store writes applied as one pipelined batch.
#[derive(Debug, Default)]
pub struct WriteBatch {
    pub(crate) zadd: Vec<(String, String, i64)>,
    pub(crate) zrem: Vec<(String, String)>,
    pub(crate) sadd: Vec<(String, String)>,
    pub(crate) hset: Vec<(String, Vec<(String, String)>)>,
}

impl WriteBatch {
    pub fn zadd(&mut self, key: String, member: String, score: i64) {
        self.zadd.push((key, member, score));
    }

    pub fn zrem(&mut self, key: String, member: String) {
        self.zrem.push((key, member));
    }

    pub fn sadd(&mut self, key: String, member: String) {
        self.sadd.push((key, member));
    }

    pub fn hset(&mut self, key: String, fields: Vec<(String, String)>) {
        self.hset.push((key, fields));
    }

    pub fn is_empty(&self) -> bool {
        self.zadd.is_empty() && self.zrem.is_empty() && self.sadd.is_empty() && self.hset.is_empty()
    }
}

/// Read-optimized projection over sorted sets, plus the primitives the
/// distributed lock needs. Only the cache sync writes scores; readers never
/// write, which is what keeps the pipelined batches safe without
/// transactions.
#[async_trait]
pub trait FastStore: Send + Sync {
    async fn apply(&self, batch: WriteBatch) -> anyhow::Result<()>;

    /// Members of a sorted set by descending score, positions
    /// `[start, stop]` inclusive.
    async fn ztop_desc(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> anyhow::Result<Vec<(String, i64)>>;

    /// One HGETALL per key, pipelined; missing keys yield empty maps.
    async fn hgetall_many(
        &self,
        keys: &[String],
    ) -> anyhow::Result<Vec<HashMap<String, String>>>;

    /// Atomic set-if-absent with expiry; the lock primitive.
    async fn set_nx_ex(&self, key: &str, ttl_secs: u64) -> anyhow::Result<bool>;

    async fn del(&self, key: &str) -> anyhow::Result<()>;
}
