//! Common types for the shared crate
//!
//! Closed domain enums and id aliases used across the dispatch system.
//! All enums carry stable snake_case wire names because they round-trip
//! through the shared store as plain strings.

use serde::{Deserialize, Serialize};

/// Courier identifier (e.g. "D10293")
pub type CourierId = String;

/// Order identifier (e.g. "ORD-2024-000123")
pub type OrderId = String;

/// Vehicle class of a courier or an order request
///
/// Closed set: the geo index is keyed per vehicle class, so adding a
/// variant requires a store key migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    Bike,
    #[serde(rename = "truck_500")]
    Truck500,
    #[serde(rename = "truck_1000")]
    Truck1000,
}

impl VehicleClass {
    /// Stable store-key segment for this class
    pub fn as_key(&self) -> &'static str {
        match self {
            VehicleClass::Bike => "bike",
            VehicleClass::Truck500 => "truck_500",
            VehicleClass::Truck1000 => "truck_1000",
        }
    }

    /// Whether a courier of this class may serve an order requesting `requested`.
    ///
    /// Exact match always serves; a 1t truck may additionally take 500kg
    /// truck orders. Bikes never substitute for trucks and vice versa.
    pub fn can_serve(&self, requested: VehicleClass) -> bool {
        match (self, requested) {
            (a, b) if *a == b => true,
            (VehicleClass::Truck1000, VehicleClass::Truck500) => true,
            _ => false,
        }
    }
}

impl std::str::FromStr for VehicleClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bike" => Ok(VehicleClass::Bike),
            "truck_500" => Ok(VehicleClass::Truck500),
            "truck_1000" => Ok(VehicleClass::Truck1000),
            other => Err(format!("unknown vehicle class: {}", other)),
        }
    }
}

impl std::fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_key())
    }
}

/// Service tier of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceTier {
    Standard,
    Fast,
    Priority,
}

impl ServiceTier {
    pub fn as_key(&self) -> &'static str {
        match self {
            ServiceTier::Standard => "standard",
            ServiceTier::Fast => "fast",
            ServiceTier::Priority => "priority",
        }
    }
}

impl std::fmt::Display for ServiceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_key())
    }
}

/// Courier availability status
///
/// `Idle` is the only state from which a new offer may be initiated.
/// Transitions are arbitrated by the per-courier reservation lock, never
/// by in-process state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CourierStatus {
    Idle,
    Offered,
    Busy,
}

impl CourierStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourierStatus::Idle => "IDLE",
            CourierStatus::Offered => "OFFERED",
            CourierStatus::Busy => "BUSY",
        }
    }
}

impl std::str::FromStr for CourierStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IDLE" => Ok(CourierStatus::Idle),
            "OFFERED" => Ok(CourierStatus::Offered),
            "BUSY" => Ok(CourierStatus::Busy),
            other => Err(format!("unknown courier status: {}", other)),
        }
    }
}

impl std::fmt::Display for CourierStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vehicle_class_round_trips_through_key() {
        for class in [
            VehicleClass::Bike,
            VehicleClass::Truck500,
            VehicleClass::Truck1000,
        ] {
            assert_eq!(class.as_key().parse::<VehicleClass>().unwrap(), class);
        }
    }

    #[test]
    fn truck_1000_covers_truck_500() {
        assert!(VehicleClass::Truck1000.can_serve(VehicleClass::Truck500));
        assert!(!VehicleClass::Truck500.can_serve(VehicleClass::Truck1000));
        assert!(!VehicleClass::Bike.can_serve(VehicleClass::Truck500));
        assert!(!VehicleClass::Truck500.can_serve(VehicleClass::Bike));
    }

    #[test]
    fn status_serde_uses_uppercase() {
        let json = serde_json::to_string(&CourierStatus::Idle).unwrap();
        assert_eq!(json, "\"IDLE\"");
        assert_eq!(
            "OFFERED".parse::<CourierStatus>().unwrap(),
            CourierStatus::Offered
        );
    }
}
