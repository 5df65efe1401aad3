//! In-memory `FastStore` for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{FastStore, WriteBatch};

#[derive(Default)]
pub(crate) struct MemFastStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    zsets: HashMap<String, HashMap<String, i64>>,
    sets: HashMap<String, HashSet<String>>,
    hashes: HashMap<String, HashMap<String, String>>,
    locks: HashMap<String, Instant>,
}

impl MemFastStore {
    pub(crate) fn zscore(&self, key: &str, member: &str) -> Option<i64> {
        self.inner
            .lock()
            .unwrap()
            .zsets
            .get(key)
            .and_then(|zset| zset.get(member))
            .copied()
    }

    pub(crate) fn zcard(&self, key: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .zsets
            .get(key)
            .map_or(0, HashMap::len)
    }

    pub(crate) fn set_contains(&self, key: &str, member: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .sets
            .get(key)
            .is_some_and(|set| set.contains(member))
    }

    pub(crate) fn hash(&self, key: &str) -> HashMap<String, String> {
        self.inner
            .lock()
            .unwrap()
            .hashes
            .get(key)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl FastStore for MemFastStore {
    async fn apply(&self, batch: WriteBatch) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        for (key, member, score) in batch.zadd {
            inner.zsets.entry(key).or_default().insert(member, score);
        }
        for (key, member) in batch.zrem {
            if let Some(zset) = inner.zsets.get_mut(&key) {
                zset.remove(&member);
            }
        }
        for (key, member) in batch.sadd {
            inner.sets.entry(key).or_default().insert(member);
        }
        for (key, fields) in batch.hset {
            inner.hashes.entry(key).or_default().extend(fields);
        }
        Ok(())
    }

    async fn ztop_desc(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> anyhow::Result<Vec<(String, i64)>> {
        let inner = self.inner.lock().unwrap();
        let mut entries: Vec<(String, i64)> = inner
            .zsets
            .get(key)
            .map(|zset| zset.iter().map(|(m, s)| (m.clone(), *s)).collect())
            .unwrap_or_default();
        // ZREVRANGE tie-break: equal scores come back in reverse
        // lexicographic member order.
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(b.0.cmp(&a.0)));

        let len = entries.len() as isize;
        let start = start.max(0);
        if start >= len || stop < start {
            return Ok(Vec::new());
        }
        let stop = stop.min(len - 1);
        Ok(entries[start as usize..=stop as usize].to_vec())
    }

    async fn hgetall_many(
        &self,
        keys: &[String],
    ) -> anyhow::Result<Vec<HashMap<String, String>>> {
        let inner = self.inner.lock().unwrap();
        Ok(keys
            .iter()
            .map(|key| inner.hashes.get(key).cloned().unwrap_or_default())
            .collect())
    }

    async fn set_nx_ex(&self, key: &str, ttl_secs: u64) -> anyhow::Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        inner.locks.retain(|_, expires| *expires > now);
        if inner.locks.contains_key(key) {
            return Ok(false);
        }
        inner
            .locks
            .insert(key.to_string(), now + Duration::from_secs(ttl_secs));
        Ok(true)
    }

    async fn del(&self, key: &str) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.locks.remove(key);
        inner.zsets.remove(key);
        inner.sets.remove(key);
        inner.hashes.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tied_scores_come_back_in_reverse_member_order() {
        let fast = MemFastStore::default();
        let mut batch = WriteBatch::default();
        batch.zadd("board".to_string(), "alpha".to_string(), 5);
        batch.zadd("board".to_string(), "bravo".to_string(), 5);
        batch.zadd("board".to_string(), "zulu".to_string(), 9);
        fast.apply(batch).await.unwrap();

        let top = fast.ztop_desc("board", 0, 2).await.unwrap();

        assert_eq!(
            top,
            vec![
                ("zulu".to_string(), 9),
                ("bravo".to_string(), 5),
                ("alpha".to_string(), 5),
            ]
        );
    }

    #[tokio::test]
    async fn range_bounds_are_inclusive_and_clipped() {
        let fast = MemFastStore::default();
        let mut batch = WriteBatch::default();
        batch.zadd("board".to_string(), "a".to_string(), 3);
        batch.zadd("board".to_string(), "b".to_string(), 2);
        batch.zadd("board".to_string(), "c".to_string(), 1);
        fast.apply(batch).await.unwrap();

        let page = fast.ztop_desc("board", 1, 5).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].0, "b");

        assert!(fast.ztop_desc("board", 3, 5).await.unwrap().is_empty());
        assert!(fast.ztop_desc("missing", 0, 9).await.unwrap().is_empty());
    }
}
