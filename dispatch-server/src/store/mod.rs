//! Shared low-latency store
//!
//! Every cross-order interaction (courier status, reservation locks, demand
//! counters) is mediated by atomic operations on this store; the dispatch
//! service itself holds no shared mutable fleet state. The trait exposes
//! only the primitives the components need, shaped after the original key
//! scheme:
//!
//! | Key | Structure | Used by |
//! |-----|-----------|---------|
//! | `couriers:h3:{cell}:{vehicle}` | sorted set | geo index |
//! | `courier:{id}:profile` | hash | fleet repository |
//! | `courier:{id}:state` | hash | fleet repository, state updater |
//! | `demand:h3:{cell}` | sorted set (score = unix ts) | demand counter |
//! | `lock:courier:{id}` | string (value = owning order id) | lock manager |
//! | `dispatch:{order}:plan` | string (JSON sequence plan) | orchestrator |

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Store layer errors
///
/// All variants are unrecoverable from the orchestrator's point of view;
/// expected contention (lock already held) is expressed through return
/// values, not errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store command failed: {0}")]
    Command(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Atomic primitives of the shared store
///
/// Implemented by [`RedisStore`] (production) and [`MemoryStore`]
/// (embedded mode and tests). Both honour the same TTL and atomicity
/// semantics; the invariants the lock manager relies on are
/// `set_nx_ex` (set-if-absent with expiry, one winner under races) and
/// `del_if_eq` (compare-and-delete, owner-checked release).
#[async_trait]
pub trait StoreBackend: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    // ===== Sorted sets =====

    async fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<()>;

    async fn zrem(&self, key: &str, member: &str) -> StoreResult<()>;

    /// First `limit` members ordered by ascending score
    async fn zrange(&self, key: &str, limit: usize) -> StoreResult<Vec<String>>;

    /// Remove members with score <= `max_score`; returns removed count
    async fn zremrangebyscore_upto(&self, key: &str, max_score: f64) -> StoreResult<u64>;

    async fn zcard(&self, key: &str) -> StoreResult<u64>;

    // ===== Hashes =====

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    /// Batched HGETALL over many keys in one round trip. The result
    /// aligns with the input key order; absent keys yield empty maps.
    async fn hgetall_many(&self, keys: &[String]) -> StoreResult<Vec<HashMap<String, String>>>;

    async fn hset(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()>;

    // ===== Strings / locks =====

    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Atomic "set only if absent, with expiry". Returns `true` when this
    /// caller won the key.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool>;

    async fn del(&self, key: &str) -> StoreResult<()>;

    /// Delete `key` only when its current value equals `expected`. Returns
    /// `false` (and leaves the key intact) otherwise.
    async fn del_if_eq(&self, key: &str, expected: &str) -> StoreResult<bool>;

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<()>;
}

/// Store key construction, kept in one place so the scheme stays aligned
/// across components
pub mod keys {
    use shared::VehicleClass;

    pub fn geo_cell(cell: &str, vehicle: VehicleClass) -> String {
        format!("couriers:h3:{}:{}", cell, vehicle.as_key())
    }

    pub fn courier_profile(courier_id: &str) -> String {
        format!("courier:{}:profile", courier_id)
    }

    pub fn courier_state(courier_id: &str) -> String {
        format!("courier:{}:state", courier_id)
    }

    pub fn demand(cell: &str) -> String {
        format!("demand:h3:{}", cell)
    }

    pub fn lock(courier_id: &str) -> String {
        format!("lock:courier:{}", courier_id)
    }

    pub fn plan(order_id: &str) -> String {
        format!("dispatch:{}:plan", order_id)
    }
}
