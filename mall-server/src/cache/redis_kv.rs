//! Redis backend

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::KvStore;
use crate::BoxError;

/// Redis cache over a reconnecting connection manager
#[derive(Clone)]
pub struct RedisKv {
    conn: ConnectionManager,
}

impl RedisKv {
    pub async fn connect(redis_url: &str) -> Result<Self, BoxError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn hincrby(&self, key: &str, field: i64, delta: i64) -> Result<i64, BoxError> {
        let mut conn = self.conn.clone();
        let value: i64 = conn.hincr(key, field, delta).await?;
        Ok(value)
    }

    async fn hset(&self, key: &str, field: i64, value: i64) -> Result<(), BoxError> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset(key, field, value).await?;
        Ok(())
    }

    async fn hdel(&self, key: &str, fields: &[i64]) -> Result<(), BoxError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.hdel(key, fields).await?;
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<i64, i64>, BoxError> {
        let mut conn = self.conn.clone();
        let map: HashMap<i64, i64> = conn.hgetall(key).await?;
        Ok(map)
    }

    async fn sadd(&self, key: &str, members: &[i64]) -> Result<(), BoxError> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.sadd(key, members).await?;
        Ok(())
    }

    async fn srem(&self, key: &str, members: &[i64]) -> Result<(), BoxError> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.srem(key, members).await?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<HashSet<i64>, BoxError> {
        let mut conn = self.conn.clone();
        let members: HashSet<i64> = conn.smembers(key).await?;
        Ok(members)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), BoxError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, BoxError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn del(&self, key: &str) -> Result<(), BoxError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}
