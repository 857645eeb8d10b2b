//! Courier profile and live state
//!
//! The courier record is owned by the shared store, split the way the
//! original key scheme splits it:
//!
//! | Key | Contents |
//! |-----|----------|
//! | `courier:{id}:profile` | static attributes (vehicle class, capacity, join date) |
//! | `courier:{id}:state` | dynamic fields (status, position, counters, estimates) |
//!
//! The dispatch service only ever reads these records and attempts status
//! transitions; it never owns them. Values round-trip as strings because
//! the store is a flat hash.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{CourierStatus, VehicleClass};

/// Static courier attributes, written once at onboarding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierProfile {
    pub vehicle_class: VehicleClass,
    pub max_load_kg: u32,
    /// ISO-8601 date the courier joined the fleet
    pub joined_date: String,
}

impl CourierProfile {
    /// Flatten into store hash fields
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("vehicle_class", self.vehicle_class.to_string()),
            ("max_load_kg", self.max_load_kg.to_string()),
            ("joined_date", self.joined_date.clone()),
        ]
    }

    /// Parse from store hash fields; `None` when the record is absent or
    /// the vehicle class is unreadable (a profile without one is useless).
    pub fn from_fields(fields: &HashMap<String, String>) -> Option<Self> {
        let vehicle_class = fields.get("vehicle_class")?.parse().ok()?;
        Some(Self {
            vehicle_class,
            max_load_kg: parse_or(fields, "max_load_kg", 0),
            joined_date: fields.get("joined_date").cloned().unwrap_or_default(),
        })
    }
}

/// Live courier state, continuously mutated by location ingestion and the
/// async state updater
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierState {
    pub status: CourierStatus,
    pub lat: f64,
    pub lon: f64,
    pub minutes_active: i64,
    /// 0.0 = fresh, 1.0 = exhausted
    pub fatigue_index: f64,
    pub cancel_rate: f64,
    pub orders_completed: i64,
    /// Offers this courier has seen (lifetime)
    pub requests_seen: i64,
    /// Offers this courier accepted (lifetime)
    pub accepts: i64,
    /// Bayesian-smoothed acceptance rate, recomputed by the state updater
    pub accept_rate: f64,
}

impl CourierState {
    /// Fresh IDLE state for a newly hydrated courier
    pub fn fresh(lat: f64, lon: f64, global_mean_accept_rate: f64) -> Self {
        Self {
            status: CourierStatus::Idle,
            lat,
            lon,
            minutes_active: 0,
            fatigue_index: 0.0,
            cancel_rate: 0.0,
            orders_completed: 0,
            requests_seen: 0,
            accepts: 0,
            accept_rate: global_mean_accept_rate,
        }
    }

    /// Flatten into store hash fields
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("status", self.status.to_string()),
            ("lat", self.lat.to_string()),
            ("lon", self.lon.to_string()),
            ("minutes_active", self.minutes_active.to_string()),
            ("fatigue_index", self.fatigue_index.to_string()),
            ("cancel_rate", self.cancel_rate.to_string()),
            ("orders_completed", self.orders_completed.to_string()),
            ("requests_seen", self.requests_seen.to_string()),
            ("accepts", self.accepts.to_string()),
            ("accept_rate", self.accept_rate.to_string()),
        ]
    }

    /// Parse from store hash fields with per-field fallbacks.
    ///
    /// Returns `None` only for an empty hash (expired or never-seen
    /// courier); individually malformed fields fall back to defaults so a
    /// single bad write cannot take a courier out of circulation.
    pub fn from_fields(fields: &HashMap<String, String>, global_mean_accept_rate: f64) -> Option<Self> {
        if fields.is_empty() {
            return None;
        }
        let status = fields
            .get("status")
            .and_then(|s| s.parse().ok())
            .unwrap_or(CourierStatus::Idle);
        Some(Self {
            status,
            lat: parse_or(fields, "lat", 0.0),
            lon: parse_or(fields, "lon", 0.0),
            minutes_active: parse_or(fields, "minutes_active", 0),
            fatigue_index: parse_or(fields, "fatigue_index", 0.0),
            cancel_rate: parse_or(fields, "cancel_rate", 0.0),
            orders_completed: parse_or(fields, "orders_completed", 0),
            requests_seen: parse_or(fields, "requests_seen", 0),
            accepts: parse_or(fields, "accepts", 0),
            accept_rate: parse_or(fields, "accept_rate", global_mean_accept_rate),
        })
    }
}

fn parse_or<T: std::str::FromStr>(fields: &HashMap<String, String>, key: &str, default: T) -> T {
    fields
        .get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn state_round_trips_through_fields() {
        let state = CourierState {
            status: CourierStatus::Offered,
            lat: 10.77,
            lon: 106.69,
            minutes_active: 312,
            fatigue_index: 0.42,
            cancel_rate: 0.05,
            orders_completed: 17,
            requests_seen: 40,
            accepts: 28,
            accept_rate: 0.67,
        };
        let fields: HashMap<String, String> = state
            .to_fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let parsed = CourierState::from_fields(&fields, 0.60).unwrap();
        assert_eq!(parsed.status, CourierStatus::Offered);
        assert_eq!(parsed.requests_seen, 40);
        assert!((parsed.accept_rate - 0.67).abs() < 1e-9);
    }

    #[test]
    fn missing_courier_is_none_but_bad_field_is_default() {
        assert!(CourierState::from_fields(&HashMap::new(), 0.60).is_none());

        let fields = hash(&[("status", "IDLE"), ("fatigue_index", "not-a-number")]);
        let parsed = CourierState::from_fields(&fields, 0.60).unwrap();
        assert_eq!(parsed.fatigue_index, 0.0);
        assert_eq!(parsed.accept_rate, 0.60);
    }
}
