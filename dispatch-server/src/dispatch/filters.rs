//! Candidate eligibility filters
//!
//! Cheap, deterministic checks applied after geo retrieval and before any
//! scoring call is made. A candidate rejected here never costs a feature
//! row. Filters run in registration order and the first rejection wins.

use shared::{CourierProfile, CourierState, CourierStatus, Order};

pub trait CandidateFilter: Send + Sync {
    fn name(&self) -> &'static str;

    fn accepts(
        &self,
        order: &Order,
        courier_id: &str,
        profile: &CourierProfile,
        state: &CourierState,
    ) -> bool;
}

/// The courier's vehicle must be able to carry the requested class.
/// Heavier trucks serve lighter truck requests; bikes are their own class.
pub struct VehicleClassFilter;

impl CandidateFilter for VehicleClassFilter {
    fn name(&self) -> &'static str {
        "vehicle_class"
    }

    fn accepts(
        &self,
        order: &Order,
        _courier_id: &str,
        profile: &CourierProfile,
        _state: &CourierState,
    ) -> bool {
        profile.vehicle_class.can_serve(order.vehicle_class)
    }
}

/// Only IDLE couriers receive offers. OFFERED/BUSY couriers may still
/// linger in a geo cell between heartbeats.
pub struct IdleStatusFilter;

impl CandidateFilter for IdleStatusFilter {
    fn name(&self) -> &'static str {
        "idle_status"
    }

    fn accepts(
        &self,
        _order: &Order,
        _courier_id: &str,
        _profile: &CourierProfile,
        state: &CourierState,
    ) -> bool {
        state.status == CourierStatus::Idle
    }
}

/// Couriers at the fatigue ceiling are rested out of the pool.
pub struct FatigueCapFilter {
    pub cap: f64,
}

impl CandidateFilter for FatigueCapFilter {
    fn name(&self) -> &'static str {
        "fatigue_cap"
    }

    fn accepts(
        &self,
        _order: &Order,
        _courier_id: &str,
        _profile: &CourierProfile,
        state: &CourierState,
    ) -> bool {
        state.fatigue_index < self.cap
    }
}

pub fn default_filters(fatigue_cap: f64) -> Vec<Box<dyn CandidateFilter>> {
    vec![
        Box::new(VehicleClassFilter),
        Box::new(IdleStatusFilter),
        Box::new(FatigueCapFilter { cap: fatigue_cap }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::{ServiceTier, VehicleClass};

    fn order(vehicle: VehicleClass) -> Order {
        Order {
            id: "ORD-1".into(),
            pickup_lat: 10.77,
            pickup_lon: 106.69,
            dropoff_lat: 10.80,
            dropoff_lon: 106.72,
            distance_km: 4.0,
            shipping_fee: 25_000.0,
            cod_amount: 0.0,
            vehicle_class: vehicle,
            service_tier: ServiceTier::Standard,
            is_raining: false,
            created_at: Utc::now(),
        }
    }

    fn profile(vehicle: VehicleClass) -> CourierProfile {
        CourierProfile {
            vehicle_class: vehicle,
            max_load_kg: 500,
            joined_date: "2023-01-01".into(),
        }
    }

    fn idle_state() -> CourierState {
        CourierState::fresh(10.77, 106.69, 0.60)
    }

    #[test]
    fn heavier_truck_serves_lighter_request() {
        let f = VehicleClassFilter;
        let state = idle_state();

        let light = order(VehicleClass::Truck500);
        assert!(f.accepts(&light, "D1", &profile(VehicleClass::Truck1000), &state));
        assert!(f.accepts(&light, "D1", &profile(VehicleClass::Truck500), &state));
        assert!(!f.accepts(&light, "D1", &profile(VehicleClass::Bike), &state));

        // Never the other direction.
        let heavy = order(VehicleClass::Truck1000);
        assert!(!f.accepts(&heavy, "D1", &profile(VehicleClass::Truck500), &state));
    }

    #[test]
    fn busy_and_offered_couriers_are_rejected() {
        let f = IdleStatusFilter;
        let o = order(VehicleClass::Bike);
        let p = profile(VehicleClass::Bike);

        let mut state = idle_state();
        assert!(f.accepts(&o, "D1", &p, &state));

        state.status = CourierStatus::Offered;
        assert!(!f.accepts(&o, "D1", &p, &state));
        state.status = CourierStatus::Busy;
        assert!(!f.accepts(&o, "D1", &p, &state));
    }

    #[test]
    fn fatigue_cap_is_exclusive() {
        let f = FatigueCapFilter { cap: 0.95 };
        let o = order(VehicleClass::Bike);
        let p = profile(VehicleClass::Bike);

        let mut state = idle_state();
        state.fatigue_index = 0.94;
        assert!(f.accepts(&o, "D1", &p, &state));
        state.fatigue_index = 0.95;
        assert!(!f.accepts(&o, "D1", &p, &state));
    }
}
