//! Geo index
//!
//! Courier cell membership over H3 hexagonal cells at resolution 8
//! (~0.74 km² per cell). Each `(cell, vehicle class)` pair maps to a small
//! sorted set of courier ids in the shared store.
//!
//! Retrieval expands ring by ring from the pickup cell ("the net"): ring 0
//! is the cell itself, ring k the concentric hexagon ring at grid distance
//! k, bounded at `max_ring`. Expansion stops early once `max_count` ids are
//! collected, and stops at a ring boundary once `min_count` is reached.
//! A sparse service area yields a partial or empty list; scarcity is a
//! normal condition here, never an error.
//!
//! Status filtering to IDLE happens during state hydration (the membership
//! set itself is status-agnostic, matching the original key scheme).

use std::sync::Arc;

use h3o::{CellIndex, LatLng, Resolution};
use thiserror::Error;

use shared::{CourierId, VehicleClass};

use crate::store::{keys, StoreBackend, StoreError};

/// Fixed cell resolution (~0.74 km² per cell)
pub const CELL_RESOLUTION: Resolution = Resolution::Eight;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("invalid coordinates: lat={lat} lon={lon}")]
    InvalidCoordinates { lat: f64, lon: f64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Maps a WGS84 position to its H3 cell at the fixed resolution
pub fn cell_for(lat: f64, lon: f64) -> Result<CellIndex, GeoError> {
    let position = LatLng::new(lat, lon).map_err(|_| GeoError::InvalidCoordinates { lat, lon })?;
    Ok(position.to_cell(CELL_RESOLUTION))
}

/// Great-circle distance between two positions, km
pub fn distance_km(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> Result<f64, GeoError> {
    let a = LatLng::new(lat_a, lon_a).map_err(|_| GeoError::InvalidCoordinates {
        lat: lat_a,
        lon: lon_a,
    })?;
    let b = LatLng::new(lat_b, lon_b).map_err(|_| GeoError::InvalidCoordinates {
        lat: lat_b,
        lon: lon_b,
    })?;
    Ok(a.distance_km(b))
}

/// Courier cell membership index
pub struct GeoIndex {
    store: Arc<dyn StoreBackend>,
    max_ring: u32,
}

impl GeoIndex {
    pub fn new(store: Arc<dyn StoreBackend>, max_ring: u32) -> Self {
        Self { store, max_ring }
    }

    /// Upsert a courier's position.
    ///
    /// Writes lat/lon and the current cell into the courier state hash and
    /// moves the membership entry when the courier crossed a cell boundary.
    /// The zset score is the update timestamp, so stale entries sort first
    /// and the freshest couriers are retrieved last within a cell.
    pub async fn upsert_location(
        &self,
        courier_id: &str,
        lat: f64,
        lon: f64,
        vehicle: VehicleClass,
    ) -> Result<(), GeoError> {
        let cell = cell_for(lat, lon)?.to_string();
        let state_key = keys::courier_state(courier_id);

        let previous = self.store.hgetall(&state_key).await?;
        if let Some(old_cell) = previous.get("cell") {
            if *old_cell != cell {
                self.store
                    .zrem(&keys::geo_cell(old_cell, vehicle), courier_id)
                    .await?;
            }
        }

        let now = chrono::Utc::now().timestamp() as f64;
        self.store
            .zadd(&keys::geo_cell(&cell, vehicle), courier_id, now)
            .await?;
        self.store
            .hset(
                &state_key,
                &[
                    ("lat", lat.to_string()),
                    ("lon", lon.to_string()),
                    ("cell", cell),
                ],
            )
            .await?;
        Ok(())
    }

    /// Drop a courier from the index (going offline)
    pub async fn remove(&self, courier_id: &str, vehicle: VehicleClass) -> Result<(), GeoError> {
        let state = self.store.hgetall(&keys::courier_state(courier_id)).await?;
        if let Some(cell) = state.get("cell") {
            self.store
                .zrem(&keys::geo_cell(cell, vehicle), courier_id)
                .await?;
        }
        Ok(())
    }

    /// Ring-expanding candidate retrieval around a pickup point.
    ///
    /// Returns up to `max_count` courier ids of the requested vehicle
    /// class, unsorted across cells. The list may be shorter than
    /// `min_count` (or empty) when the area is sparse.
    pub async fn query(
        &self,
        lat: f64,
        lon: f64,
        vehicle: VehicleClass,
        min_count: usize,
        max_count: usize,
    ) -> Result<Vec<CourierId>, GeoError> {
        let center = cell_for(lat, lon)?;
        let mut found: Vec<CourierId> = Vec::new();

        'rings: for k in 0..=self.max_ring {
            // Pentagon distortion yields None entries; skip them.
            for cell in center.grid_ring_fast(k).flatten() {
                let key = keys::geo_cell(&cell.to_string(), vehicle);
                let remaining = max_count - found.len();
                let members = self.store.zrange(&key, remaining).await?;
                for member in members {
                    if !found.contains(&member) {
                        found.push(member);
                    }
                }
                if found.len() >= max_count {
                    break 'rings;
                }
            }
            if found.len() >= min_count {
                tracing::debug!(
                    ring = k,
                    candidates = found.len(),
                    "candidate retrieval satisfied"
                );
                break;
            }
        }

        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const LAT: f64 = 10.7721;
    const LON: f64 = 106.6983;

    fn index(store: Arc<MemoryStore>) -> GeoIndex {
        GeoIndex::new(store, 5)
    }

    /// Center coordinates of a cell `k` rings away from the given point
    fn point_at_ring(lat: f64, lon: f64, k: u32) -> (f64, f64) {
        let cell = cell_for(lat, lon).unwrap();
        let neighbour = cell.grid_ring_fast(k).flatten().next().unwrap();
        let center = LatLng::from(neighbour);
        (center.lat(), center.lng())
    }

    #[tokio::test]
    async fn finds_courier_in_same_cell() {
        let store = Arc::new(MemoryStore::new());
        let geo = index(store);
        geo.upsert_location("D1", LAT, LON, VehicleClass::Bike)
            .await
            .unwrap();

        let found = geo
            .query(LAT, LON, VehicleClass::Bike, 1, 100)
            .await
            .unwrap();
        assert_eq!(found, vec!["D1"]);
    }

    #[tokio::test]
    async fn vehicle_classes_are_isolated() {
        let store = Arc::new(MemoryStore::new());
        let geo = index(store);
        geo.upsert_location("D1", LAT, LON, VehicleClass::Truck500)
            .await
            .unwrap();

        let found = geo
            .query(LAT, LON, VehicleClass::Bike, 1, 100)
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn expands_rings_until_min_count() {
        let store = Arc::new(MemoryStore::new());
        let geo = index(store);

        let (n_lat, n_lon) = point_at_ring(LAT, LON, 2);
        geo.upsert_location("D-far", n_lat, n_lon, VehicleClass::Bike)
            .await
            .unwrap();

        let found = geo
            .query(LAT, LON, VehicleClass::Bike, 1, 100)
            .await
            .unwrap();
        assert_eq!(found, vec!["D-far"]);
    }

    #[tokio::test]
    async fn larger_max_count_never_returns_fewer() {
        let store = Arc::new(MemoryStore::new());
        let geo = index(store);

        for i in 0..4 {
            geo.upsert_location(&format!("C{}", i), LAT, LON, VehicleClass::Bike)
                .await
                .unwrap();
        }
        let (n_lat, n_lon) = point_at_ring(LAT, LON, 1);
        for i in 0..4 {
            geo.upsert_location(&format!("N{}", i), n_lat, n_lon, VehicleClass::Bike)
                .await
                .unwrap();
        }

        let mut previous = 0;
        for max_count in [1, 2, 4, 6, 8, 100] {
            let found = geo
                .query(LAT, LON, VehicleClass::Bike, 5, max_count)
                .await
                .unwrap();
            assert!(found.len() >= previous, "shrank at max_count={}", max_count);
            assert!(found.len() <= max_count);
            previous = found.len();
        }
    }

    #[tokio::test]
    async fn empty_area_returns_empty_not_error() {
        let store = Arc::new(MemoryStore::new());
        let geo = index(store);
        let found = geo
            .query(LAT, LON, VehicleClass::Bike, 5, 100)
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn moving_courier_leaves_old_cell() {
        let store = Arc::new(MemoryStore::new());
        let geo = index(store);

        geo.upsert_location("D1", LAT, LON, VehicleClass::Bike)
            .await
            .unwrap();
        let (far_lat, far_lon) = point_at_ring(LAT, LON, 5);
        geo.upsert_location("D1", far_lat, far_lon, VehicleClass::Bike)
            .await
            .unwrap();

        // Searching only the origin cell (max_ring 0) must come up empty.
        let store2 = geo.store.clone();
        let narrow = GeoIndex::new(store2, 0);
        let found = narrow
            .query(LAT, LON, VehicleClass::Bike, 1, 100)
            .await
            .unwrap();
        assert!(found.is_empty());

        let found = narrow
            .query(far_lat, far_lon, VehicleClass::Bike, 1, 100)
            .await
            .unwrap();
        assert_eq!(found, vec!["D1"]);
    }

    #[test]
    fn rejects_invalid_coordinates() {
        assert!(cell_for(120.0, 106.0).is_err());
        assert!(distance_km(0.0, 0.0, 95.0, 0.0).is_err());
    }
}
