//! In-memory cache for tests and the development fallback

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

use super::KvStore;
use crate::BoxError;

enum Value {
    Str(String),
    Hash(HashMap<i64, i64>),
    Set(HashSet<i64>),
}

struct Slot {
    value: Value,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

#[derive(Default)]
pub struct MemoryKv {
    slots: DashMap<String, Slot>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `key` with expired values already evicted
    fn live_entry(&self, key: &str) -> Entry<'_, String, Slot> {
        let now = Instant::now();
        let entry = self.slots.entry(key.to_string());
        match entry {
            Entry::Occupied(occupied) if !occupied.get().is_live(now) => {
                occupied.remove();
                self.slots.entry(key.to_string())
            }
            other => other,
        }
    }

    fn with_hash<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut HashMap<i64, i64>) -> T,
    ) -> Result<T, BoxError> {
        let mut slot = self.live_entry(key).or_insert_with(|| Slot {
            value: Value::Hash(HashMap::new()),
            expires_at: None,
        });
        match &mut slot.value {
            Value::Hash(map) => Ok(f(map)),
            _ => Err(WRONG_TYPE.into()),
        }
    }

    fn with_set<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut HashSet<i64>) -> T,
    ) -> Result<T, BoxError> {
        let mut slot = self.live_entry(key).or_insert_with(|| Slot {
            value: Value::Set(HashSet::new()),
            expires_at: None,
        });
        match &mut slot.value {
            Value::Set(set) => Ok(f(set)),
            _ => Err(WRONG_TYPE.into()),
        }
    }

    /// Drop empty collections, as Redis does
    fn prune(&self, key: &str) {
        self.slots.remove_if(key, |_, slot| match &slot.value {
            Value::Hash(map) => map.is_empty(),
            Value::Set(set) => set.is_empty(),
            Value::Str(_) => false,
        });
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn hincrby(&self, key: &str, field: i64, delta: i64) -> Result<i64, BoxError> {
        self.with_hash(key, |map| {
            let value = map.entry(field).or_insert(0);
            let next = value.checked_add(delta)?;
            *value = next;
            Some(next)
        })?
        .ok_or_else(|| "ERR increment or decrement would overflow".into())
    }

    async fn hset(&self, key: &str, field: i64, value: i64) -> Result<(), BoxError> {
        self.with_hash(key, |map| {
            map.insert(field, value);
        })
    }

    async fn hdel(&self, key: &str, fields: &[i64]) -> Result<(), BoxError> {
        self.with_hash(key, |map| {
            for field in fields {
                map.remove(field);
            }
        })?;
        self.prune(key);
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<i64, i64>, BoxError> {
        let map = self.with_hash(key, |map| map.clone())?;
        self.prune(key);
        Ok(map)
    }

    async fn sadd(&self, key: &str, members: &[i64]) -> Result<(), BoxError> {
        self.with_set(key, |set| set.extend(members.iter().copied()))?;
        self.prune(key);
        Ok(())
    }

    async fn srem(&self, key: &str, members: &[i64]) -> Result<(), BoxError> {
        self.with_set(key, |set| {
            for member in members {
                set.remove(member);
            }
        })?;
        self.prune(key);
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<HashSet<i64>, BoxError> {
        let set = self.with_set(key, |set| set.clone())?;
        self.prune(key);
        Ok(set)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
        match self.live_entry(key) {
            Entry::Occupied(occupied) => match &occupied.get().value {
                Value::Str(s) => Ok(Some(s.clone())),
                _ => Err(WRONG_TYPE.into()),
            },
            Entry::Vacant(_) => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), BoxError> {
        self.slots.insert(
            key.to_string(),
            Slot {
                value: Value::Str(value.to_string()),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool, BoxError> {
        match self.live_entry(key) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    value: Value::Str(value.to_string()),
                    expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
                });
                Ok(true)
            }
        }
    }

    async fn del(&self, key: &str) -> Result<(), BoxError> {
        self.slots.remove(key);
        Ok(())
    }
}
