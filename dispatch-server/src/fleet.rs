//! Fleet repository
//!
//! Read/write access to courier profile and state hashes in the shared
//! store. The dispatch service never owns these records: it hydrates them
//! for one matching attempt and writes back status transitions after the
//! reservation lock has arbitrated them.

use std::sync::Arc;

use shared::{CourierId, CourierProfile, CourierState, CourierStatus};

use crate::store::{keys, StoreBackend, StoreResult};

pub struct FleetRepository {
    store: Arc<dyn StoreBackend>,
    global_mean_accept_rate: f64,
}

impl FleetRepository {
    pub fn new(store: Arc<dyn StoreBackend>, global_mean_accept_rate: f64) -> Self {
        Self {
            store,
            global_mean_accept_rate,
        }
    }

    /// Live state, `None` for unknown/expired couriers
    pub async fn state(&self, courier_id: &str) -> StoreResult<Option<CourierState>> {
        let fields = self.store.hgetall(&keys::courier_state(courier_id)).await?;
        Ok(CourierState::from_fields(&fields, self.global_mean_accept_rate))
    }

    pub async fn profile(&self, courier_id: &str) -> StoreResult<Option<CourierProfile>> {
        let fields = self
            .store
            .hgetall(&keys::courier_profile(courier_id))
            .await?;
        Ok(CourierProfile::from_fields(&fields))
    }

    /// State and profile for a whole candidate batch, fetched in one
    /// pipelined round trip. Results align with `courier_ids`; couriers
    /// with a missing or unparsable hash come back as `None`.
    pub async fn snapshots(
        &self,
        courier_ids: &[CourierId],
    ) -> StoreResult<Vec<(CourierId, Option<CourierState>, Option<CourierProfile>)>> {
        let mut hash_keys = Vec::with_capacity(courier_ids.len() * 2);
        for courier_id in courier_ids {
            hash_keys.push(keys::courier_state(courier_id));
            hash_keys.push(keys::courier_profile(courier_id));
        }
        let replies = self.store.hgetall_many(&hash_keys).await?;

        let mut snapshots = Vec::with_capacity(courier_ids.len());
        for (courier_id, pair) in courier_ids.iter().zip(replies.chunks(2)) {
            let state = pair
                .first()
                .and_then(|fields| CourierState::from_fields(fields, self.global_mean_accept_rate));
            let profile = pair.get(1).and_then(CourierProfile::from_fields);
            snapshots.push((courier_id.clone(), state, profile));
        }
        Ok(snapshots)
    }

    /// Onboard or re-seed a courier (profile plus a fresh IDLE state)
    pub async fn register(
        &self,
        courier_id: &str,
        profile: &CourierProfile,
        lat: f64,
        lon: f64,
    ) -> StoreResult<()> {
        self.store
            .hset(&keys::courier_profile(courier_id), &profile.to_fields())
            .await?;
        let state = CourierState::fresh(lat, lon, self.global_mean_accept_rate);
        self.write_state(courier_id, &state).await
    }

    pub async fn write_state(&self, courier_id: &str, state: &CourierState) -> StoreResult<()> {
        self.store
            .hset(&keys::courier_state(courier_id), &state.to_fields())
            .await
    }

    /// Status-only transition; the reservation lock must already have been
    /// won (or released) by the caller.
    pub async fn set_status(&self, courier_id: &str, status: CourierStatus) -> StoreResult<()> {
        self.store
            .hset(
                &keys::courier_state(courier_id),
                &[("status", status.to_string())],
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use shared::VehicleClass;

    #[tokio::test]
    async fn register_then_hydrate() {
        let store = Arc::new(MemoryStore::new());
        let fleet = FleetRepository::new(store, 0.60);

        let profile = CourierProfile {
            vehicle_class: VehicleClass::Bike,
            max_load_kg: 30,
            joined_date: "2023-04-01".into(),
        };
        fleet.register("D1", &profile, 10.77, 106.69).await.unwrap();

        let state = fleet.state("D1").await.unwrap().unwrap();
        assert_eq!(state.status, CourierStatus::Idle);
        assert_eq!(state.accept_rate, 0.60);

        let profile = fleet.profile("D1").await.unwrap().unwrap();
        assert_eq!(profile.vehicle_class, VehicleClass::Bike);

        assert!(fleet.state("D-unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn snapshots_hydrate_a_batch_in_input_order() {
        let store = Arc::new(MemoryStore::new());
        let fleet = FleetRepository::new(store, 0.60);
        let profile = CourierProfile {
            vehicle_class: VehicleClass::Bike,
            max_load_kg: 30,
            joined_date: "2023-04-01".into(),
        };
        fleet.register("D1", &profile, 10.77, 106.69).await.unwrap();
        fleet.register("D3", &profile, 10.78, 106.70).await.unwrap();

        let ids = vec!["D1".to_string(), "D-gone".to_string(), "D3".to_string()];
        let snapshots = fleet.snapshots(&ids).await.unwrap();

        assert_eq!(snapshots.len(), 3);
        assert_eq!(snapshots[0].0, "D1");
        assert!(snapshots[0].1.is_some());
        assert!(snapshots[0].2.is_some());
        assert!(snapshots[1].1.is_none());
        assert!(snapshots[1].2.is_none());
        let d3_state = snapshots[2].1.as_ref().unwrap();
        assert!((d3_state.lat - 10.78).abs() < 1e-9);
    }

    #[tokio::test]
    async fn set_status_preserves_other_fields() {
        let store = Arc::new(MemoryStore::new());
        let fleet = FleetRepository::new(store, 0.60);
        let profile = CourierProfile {
            vehicle_class: VehicleClass::Bike,
            max_load_kg: 30,
            joined_date: "2023-04-01".into(),
        };
        fleet.register("D1", &profile, 10.77, 106.69).await.unwrap();

        fleet
            .set_status("D1", CourierStatus::Offered)
            .await
            .unwrap();
        let state = fleet.state("D1").await.unwrap().unwrap();
        assert_eq!(state.status, CourierStatus::Offered);
        assert!((state.lat - 10.77).abs() < 1e-9);
    }
}
