use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use bb8_redis::redis::AsyncCommands;
use bb8_redis::{bb8, redis, RedisConnectionManager};

use super::{FastStore, WriteBatch};

#[derive(Clone)]
pub struct RedisStore {
    pool: bb8::Pool<RedisConnectionManager>,
}

impl RedisStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let manager = RedisConnectionManager::new(url).context("Invalid Redis URL")?;
        let pool = bb8::Pool::builder()
            .build(manager)
            .await
            .context("Failed to connect to Redis")?;
        Ok(Self { pool })
    }

    async fn conn(
        &self,
    ) -> anyhow::Result<bb8::PooledConnection<'_, RedisConnectionManager>> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl FastStore for RedisStore {
    async fn apply(&self, batch: WriteBatch) -> anyhow::Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for (key, member, score) in &batch.zadd {
            pipe.zadd(key, member, *score).ignore();
        }
        for (key, member) in &batch.zrem {
            pipe.zrem(key, member).ignore();
        }
        for (key, member) in &batch.sadd {
            pipe.sadd(key, member).ignore();
        }
        for (key, fields) in &batch.hset {
            pipe.hset_multiple(key, fields).ignore();
        }

        let mut conn = self.conn().await?;
        let () = pipe.query_async(&mut *conn).await?;
        Ok(())
    }

    async fn ztop_desc(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> anyhow::Result<Vec<(String, i64)>> {
        let mut conn = self.conn().await?;
        let entries: Vec<(String, i64)> = conn.zrevrange_withscores(key, start, stop).await?;
        Ok(entries)
    }

    async fn hgetall_many(
        &self,
        keys: &[String],
    ) -> anyhow::Result<Vec<HashMap<String, String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for key in keys {
            pipe.hgetall(key);
        }

        let mut conn = self.conn().await?;
        let hashes: Vec<HashMap<String, String>> = pipe.query_async(&mut *conn).await?;
        Ok(hashes)
    }

    async fn set_nx_ex(&self, key: &str, ttl_secs: u64) -> anyhow::Result<bool> {
        let mut conn = self.conn().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut *conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn del(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }
}
