//! Courier reservation locks
//!
//! One lock per courier, value = reserving order id, acquired atomically
//! with a TTL. The lock is the single arbiter of "who may offer to this
//! courier right now"; the status field in the courier hash is advisory
//! and may lag. Release is ownership-checked so a slow order that comes
//! back after its lock expired can never free a reservation that now
//! belongs to a different order.

use std::sync::Arc;
use std::time::Duration;

use crate::store::{keys, StoreBackend, StoreResult};

pub struct LockManager {
    store: Arc<dyn StoreBackend>,
    ttl: Duration,
}

impl LockManager {
    pub fn new(store: Arc<dyn StoreBackend>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Try to reserve `courier_id` for `order_id`. `false` means another
    /// order holds the reservation; the caller moves on to the next
    /// candidate rather than waiting.
    pub async fn try_acquire(&self, courier_id: &str, order_id: &str) -> StoreResult<bool> {
        self.store
            .set_nx_ex(&keys::lock(courier_id), order_id, self.ttl)
            .await
    }

    /// Release the reservation iff `order_id` still owns it.
    ///
    /// Returns `false` when the lock had already expired or is now held by
    /// a different order; both cases are logged and otherwise ignored, the
    /// current holder keeps its reservation.
    pub async fn release(&self, courier_id: &str, order_id: &str) -> StoreResult<bool> {
        let key = keys::lock(courier_id);
        if self.store.del_if_eq(&key, order_id).await? {
            return Ok(true);
        }
        match self.store.get(&key).await? {
            None => {
                tracing::debug!(courier_id, order_id, "reservation already expired");
            }
            Some(holder) => {
                tracing::warn!(
                    courier_id,
                    order_id,
                    holder,
                    "refused to release reservation owned by another order"
                );
            }
        }
        Ok(false)
    }

    /// Current holder, if any (diagnostics only)
    pub async fn holder(&self, courier_id: &str) -> StoreResult<Option<String>> {
        self.store.get(&keys::lock(courier_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn manager(store: Arc<MemoryStore>) -> LockManager {
        LockManager::new(store, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn second_order_cannot_steal_a_held_reservation() {
        let locks = manager(Arc::new(MemoryStore::new()));

        assert!(locks.try_acquire("D1", "ORD-A").await.unwrap());
        assert!(!locks.try_acquire("D1", "ORD-B").await.unwrap());
        assert_eq!(locks.holder("D1").await.unwrap().as_deref(), Some("ORD-A"));
    }

    #[tokio::test]
    async fn release_is_ownership_checked() {
        let locks = manager(Arc::new(MemoryStore::new()));
        locks.try_acquire("D1", "ORD-A").await.unwrap();

        // Foreign order cannot free the reservation.
        assert!(!locks.release("D1", "ORD-B").await.unwrap());
        assert_eq!(locks.holder("D1").await.unwrap().as_deref(), Some("ORD-A"));

        assert!(locks.release("D1", "ORD-A").await.unwrap());
        assert!(locks.try_acquire("D1", "ORD-B").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_reservation_can_be_retaken() {
        let locks = manager(Arc::new(MemoryStore::new()));
        locks.try_acquire("D1", "ORD-A").await.unwrap();

        tokio::time::advance(Duration::from_secs(31)).await;

        assert!(locks.try_acquire("D1", "ORD-B").await.unwrap());
        // The late release from the first order must not touch it.
        assert!(!locks.release("D1", "ORD-A").await.unwrap());
        assert_eq!(locks.holder("D1").await.unwrap().as_deref(), Some("ORD-B"));
    }

    #[tokio::test]
    async fn concurrent_orders_elect_exactly_one_holder() {
        let store = Arc::new(MemoryStore::new());
        let locks = Arc::new(manager(store));

        let mut handles = Vec::new();
        for i in 0..16 {
            let locks = locks.clone();
            handles.push(tokio::spawn(async move {
                locks.try_acquire("D1", &format!("ORD-{i}")).await.unwrap()
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
