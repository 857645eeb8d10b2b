//! In-process store backend
//!
//! DashMap-backed implementation used in embedded/development mode and by
//! the test suite. TTLs run on tokio time so `tokio::time::pause` based
//! tests can exercise expiry deterministically. Atomicity of `set_nx_ex`
//! and `del_if_eq` comes from DashMap's per-shard entry locking.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use tokio::time::Instant;

use super::{StoreBackend, StoreError, StoreResult};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    Zset(HashMap<String, f64>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn live(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn expiring(value: Value, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Some(Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-memory [`StoreBackend`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a live entry, dropping it if the TTL lapsed
    fn get_live(&self, key: &str) -> Option<Entry> {
        let expired = match self.map.get(key) {
            Some(entry) if entry.is_expired() => true,
            Some(entry) => return Some(entry.clone()),
            None => return None,
        };
        if expired {
            self.map.remove_if(key, |_, e| e.is_expired());
        }
        None
    }

    fn wrong_type(key: &str) -> StoreError {
        StoreError::Command(format!("wrong value type at key {}", key))
    }
}

#[async_trait]
impl StoreBackend for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        match self.map.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    let mut set = HashMap::new();
                    set.insert(member.to_string(), score);
                    occupied.insert(Entry::live(Value::Zset(set)));
                    return Ok(());
                }
                match &mut occupied.get_mut().value {
                    Value::Zset(set) => {
                        set.insert(member.to_string(), score);
                        Ok(())
                    }
                    _ => Err(Self::wrong_type(key)),
                }
            }
            MapEntry::Vacant(vacant) => {
                let mut set = HashMap::new();
                set.insert(member.to_string(), score);
                vacant.insert(Entry::live(Value::Zset(set)));
                Ok(())
            }
        }
    }

    async fn zrem(&self, key: &str, member: &str) -> StoreResult<()> {
        if let Some(mut entry) = self.map.get_mut(key) {
            if entry.is_expired() {
                return Ok(());
            }
            match &mut entry.value {
                Value::Zset(set) => {
                    set.remove(member);
                }
                _ => return Err(Self::wrong_type(key)),
            }
        }
        Ok(())
    }

    async fn zrange(&self, key: &str, limit: usize) -> StoreResult<Vec<String>> {
        let Some(entry) = self.get_live(key) else {
            return Ok(Vec::new());
        };
        let Value::Zset(set) = entry.value else {
            return Err(Self::wrong_type(key));
        };
        let mut members: Vec<(String, f64)> = set.into_iter().collect();
        members.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        Ok(members.into_iter().take(limit).map(|(m, _)| m).collect())
    }

    async fn zremrangebyscore_upto(&self, key: &str, max_score: f64) -> StoreResult<u64> {
        let Some(mut entry) = self.map.get_mut(key) else {
            return Ok(0);
        };
        if entry.is_expired() {
            return Ok(0);
        }
        match &mut entry.value {
            Value::Zset(set) => {
                let before = set.len();
                set.retain(|_, score| *score > max_score);
                Ok((before - set.len()) as u64)
            }
            _ => Err(Self::wrong_type(key)),
        }
    }

    async fn zcard(&self, key: &str) -> StoreResult<u64> {
        match self.get_live(key) {
            Some(Entry {
                value: Value::Zset(set),
                ..
            }) => Ok(set.len() as u64),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(0),
        }
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        match self.get_live(key) {
            Some(Entry {
                value: Value::Hash(hash),
                ..
            }) => Ok(hash),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(HashMap::new()),
        }
    }

    async fn hgetall_many(&self, keys: &[String]) -> StoreResult<Vec<HashMap<String, String>>> {
        let mut replies = Vec::with_capacity(keys.len());
        for key in keys {
            replies.push(self.hgetall(key).await?);
        }
        Ok(replies)
    }

    async fn hset(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()> {
        match self.map.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    let mut hash = HashMap::new();
                    for (field, value) in fields {
                        hash.insert(field.to_string(), value.clone());
                    }
                    occupied.insert(Entry::live(Value::Hash(hash)));
                    return Ok(());
                }
                match &mut occupied.get_mut().value {
                    Value::Hash(hash) => {
                        for (field, value) in fields {
                            hash.insert(field.to_string(), value.clone());
                        }
                        Ok(())
                    }
                    _ => Err(Self::wrong_type(key)),
                }
            }
            MapEntry::Vacant(vacant) => {
                let mut hash = HashMap::new();
                for (field, value) in fields {
                    hash.insert(field.to_string(), value.clone());
                }
                vacant.insert(Entry::live(Value::Hash(hash)));
                Ok(())
            }
        }
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self.get_live(key) {
            Some(Entry {
                value: Value::Str(s),
                ..
            }) => Ok(Some(s)),
            Some(_) => Err(Self::wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.map.insert(
            key.to_string(),
            Entry::expiring(Value::Str(value.to_string()), ttl),
        );
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        match self.map.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(Entry::expiring(Value::Str(value.to_string()), ttl));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry::expiring(Value::Str(value.to_string()), ttl));
                Ok(true)
            }
        }
    }

    async fn del(&self, key: &str) -> StoreResult<()> {
        self.map.remove(key);
        Ok(())
    }

    async fn del_if_eq(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let removed = self.map.remove_if(key, |_, entry| {
            if entry.is_expired() {
                return false;
            }
            matches!(&entry.value, Value::Str(s) if s == expected)
        });
        Ok(removed.is_some())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<()> {
        if let Some(mut entry) = self.map.get_mut(key) {
            if !entry.is_expired() {
                entry.expires_at = Some(Instant::now() + ttl);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn zset_orders_by_score_then_member() {
        let store = MemoryStore::new();
        store.zadd("z", "b", 2.0).await.unwrap();
        store.zadd("z", "c", 1.0).await.unwrap();
        store.zadd("z", "a", 2.0).await.unwrap();

        let members = store.zrange("z", 10).await.unwrap();
        assert_eq!(members, vec!["c", "a", "b"]);

        let members = store.zrange("z", 2).await.unwrap();
        assert_eq!(members.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn set_nx_ex_expires_and_can_be_retaken() {
        let store = MemoryStore::new();
        assert!(store
            .set_nx_ex("lock", "order-1", Duration::from_secs(30))
            .await
            .unwrap());
        assert!(!store
            .set_nx_ex("lock", "order-2", Duration::from_secs(30))
            .await
            .unwrap());

        tokio::time::advance(Duration::from_secs(31)).await;

        assert_eq!(store.get("lock").await.unwrap(), None);
        assert!(store
            .set_nx_ex("lock", "order-2", Duration::from_secs(30))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn del_if_eq_rejects_foreign_value() {
        let store = MemoryStore::new();
        store
            .set_nx_ex("lock", "order-1", Duration::from_secs(30))
            .await
            .unwrap();

        assert!(!store.del_if_eq("lock", "order-9").await.unwrap());
        assert_eq!(store.get("lock").await.unwrap().as_deref(), Some("order-1"));

        assert!(store.del_if_eq("lock", "order-1").await.unwrap());
        assert_eq!(store.get("lock").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_nx_ex_has_one_winner_under_races() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .set_nx_ex("lock", &format!("order-{}", i), Duration::from_secs(30))
                    .await
                    .unwrap()
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
