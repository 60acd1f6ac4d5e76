//! Key-value cache layer
//!
//! Backs the authenticated cart (`cart_{user_id}` hash of sku → count,
//! `selected_{user_id}` set of sku ids) and short-lived SMS state. Every
//! method is a single atomic operation on one key.

mod memory;
mod redis_kv;

pub use memory::MemoryKv;
pub use redis_kv::RedisKv;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::BoxError;

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Add `delta` to a hash field, creating it at zero; returns the new value
    async fn hincrby(&self, key: &str, field: i64, delta: i64) -> Result<i64, BoxError>;
    async fn hset(&self, key: &str, field: i64, value: i64) -> Result<(), BoxError>;
    async fn hdel(&self, key: &str, fields: &[i64]) -> Result<(), BoxError>;
    async fn hgetall(&self, key: &str) -> Result<HashMap<i64, i64>, BoxError>;

    async fn sadd(&self, key: &str, members: &[i64]) -> Result<(), BoxError>;
    async fn srem(&self, key: &str, members: &[i64]) -> Result<(), BoxError>;
    async fn smembers(&self, key: &str) -> Result<HashSet<i64>, BoxError>;

    async fn get(&self, key: &str) -> Result<Option<String>, BoxError>;
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), BoxError>;
    /// Set only if absent; returns `false` when the key already existed
    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, BoxError>;
    async fn del(&self, key: &str) -> Result<(), BoxError>;
}

pub fn cart_key(user_id: i64) -> String {
    format!("cart_{user_id}")
}

pub fn selected_key(user_id: i64) -> String {
    format!("selected_{user_id}")
}

pub fn sms_code_key(mobile: &str) -> String {
    format!("sms_{mobile}")
}

pub fn send_flag_key(mobile: &str) -> String {
    format!("send_flag_{mobile}")
}
