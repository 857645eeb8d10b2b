//! Order model
//!
//! An order is created once at ingestion and immutable afterwards within
//! the dispatch core. Route geometry is out of scope; the trip distance
//! arrives precomputed from the pricing layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{OrderId, ServiceTier, VehicleClass};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub pickup_lat: f64,
    pub pickup_lon: f64,
    pub dropoff_lat: f64,
    pub dropoff_lon: f64,
    /// Trip distance in km (pickup to dropoff)
    pub distance_km: f64,
    /// Shipping fee in VND
    pub shipping_fee: f64,
    /// Cash-on-delivery amount in VND (0 when prepaid)
    pub cod_amount: f64,
    pub vehicle_class: VehicleClass,
    pub service_tier: ServiceTier,
    pub is_raining: bool,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Hour-of-day in the order's creation instant, cyclically encoded so
    /// 23:00 and 00:00 land next to each other in feature space.
    pub fn hour_encoding(&self) -> (f64, f64) {
        use chrono::Timelike;
        let hour = self.created_at.hour() as f64;
        let angle = 2.0 * std::f64::consts::PI * hour / 24.0;
        (angle.sin(), angle.cos())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn order_at_hour(hour: u32) -> Order {
        Order {
            id: "ORD-1".into(),
            pickup_lat: 10.77,
            pickup_lon: 106.69,
            dropoff_lat: 10.80,
            dropoff_lon: 106.72,
            distance_km: 4.2,
            shipping_fee: 25_000.0,
            cod_amount: 0.0,
            vehicle_class: VehicleClass::Bike,
            service_tier: ServiceTier::Standard,
            is_raining: false,
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn midnight_and_eleven_pm_are_neighbours() {
        let (s0, c0) = order_at_hour(0).hour_encoding();
        let (s23, c23) = order_at_hour(23).hour_encoding();
        let (s12, c12) = order_at_hour(12).hour_encoding();

        let near = ((s0 - s23).powi(2) + (c0 - c23).powi(2)).sqrt();
        let far = ((s0 - s12).powi(2) + (c0 - c12).powi(2)).sqrt();
        assert!(near < far);
    }
}
