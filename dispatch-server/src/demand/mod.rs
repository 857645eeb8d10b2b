//! Demand counter
//!
//! Decaying per-cell order volume, consumed by the scorer as the
//! `h3_demand_60m` feature. Writes append the order id with its timestamp
//! as zset score; every read prunes entries older than the window first, so
//! the structure is self-trimming and bounded. The count feeds the scoring
//! feature vector only; sequencing never consults it.

use std::sync::Arc;
use std::time::Duration;

use crate::store::{keys, StoreBackend, StoreResult};

/// Hard TTL on a cell's demand key; backstop for cells that stop
/// receiving orders and would otherwise never get pruned again.
const DEMAND_KEY_TTL: Duration = Duration::from_secs(7200);

pub struct DemandCounter {
    store: Arc<dyn StoreBackend>,
    window: Duration,
}

impl DemandCounter {
    pub fn new(store: Arc<dyn StoreBackend>, window: Duration) -> Self {
        Self { store, window }
    }

    /// Record one order in its pickup cell
    pub async fn record(&self, cell: &str, order_id: &str, now_unix: f64) -> StoreResult<()> {
        let key = keys::demand(cell);
        self.store.zadd(&key, order_id, now_unix).await?;
        self.store.expire(&key, DEMAND_KEY_TTL).await?;
        Ok(())
    }

    /// Orders recorded in `cell` within the trailing window, pruning stale
    /// entries as a side effect
    pub async fn count(&self, cell: &str, now_unix: f64) -> StoreResult<u64> {
        let key = keys::demand(cell);
        let window_start = now_unix - self.window.as_secs_f64();
        self.store.zremrangebyscore_upto(&key, window_start).await?;
        self.store.zcard(&key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn counter(store: Arc<MemoryStore>) -> DemandCounter {
        DemandCounter::new(store, Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn counts_orders_in_window() {
        let store = Arc::new(MemoryStore::new());
        let demand = counter(store);
        let now = 1_700_000_000.0;

        demand.record("8852664a93fffff", "o1", now - 10.0).await.unwrap();
        demand.record("8852664a93fffff", "o2", now - 20.0).await.unwrap();

        assert_eq!(demand.count("8852664a93fffff", now).await.unwrap(), 2);
        assert_eq!(demand.count("another-cell", now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn read_prunes_entries_older_than_window() {
        let store = Arc::new(MemoryStore::new());
        let demand = counter(store.clone());
        let now = 1_700_000_000.0;

        demand.record("cell", "stale", now - 3700.0).await.unwrap();
        demand.record("cell", "fresh", now - 30.0).await.unwrap();

        assert_eq!(demand.count("cell", now).await.unwrap(), 1);

        // The stale member is actually gone, not just excluded.
        use crate::store::{keys, StoreBackend};
        let members = store.zrange(&keys::demand("cell"), 10).await.unwrap();
        assert_eq!(members, vec!["fresh"]);
    }

    #[tokio::test]
    async fn boundary_entry_at_exact_window_edge_is_pruned() {
        let store = Arc::new(MemoryStore::new());
        let demand = counter(store);
        let now = 1_700_000_000.0;

        demand.record("cell", "edge", now - 3600.0).await.unwrap();
        assert_eq!(demand.count("cell", now).await.unwrap(), 0);
    }
}
