//! Request types for the dispatch API and the scoring service boundary

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::types::{CourierId, OrderId, ServiceTier, VehicleClass};

/// Submit-order request body (`POST /orders`)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitOrderRequest {
    /// Caller-assigned order id; generated when absent
    pub order_id: Option<OrderId>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub pickup_lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub pickup_lon: f64,
    #[validate(range(min = -90.0, max = 90.0))]
    pub dropoff_lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub dropoff_lon: f64,
    #[validate(range(min = 0.01))]
    pub distance_km: f64,
    #[validate(range(min = 0.0))]
    pub shipping_fee: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub cod_amount: f64,
    pub vehicle_class: VehicleClass,
    #[serde(default = "default_service_tier")]
    pub service_tier: ServiceTier,
    #[serde(default)]
    pub is_raining: bool,
}

fn default_service_tier() -> ServiceTier {
    ServiceTier::Standard
}

/// Courier decision on an outstanding offer (`POST /orders/{id}/resolve`)
#[derive(Debug, Clone, Deserialize)]
pub struct ResolveOfferRequest {
    pub courier_id: CourierId,
    pub accepted: bool,
}

/// Courier GPS upsert (`PUT /couriers/{id}/location`)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LocationUpdateRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lon: f64,
    pub vehicle_class: VehicleClass,
}

/// One candidate feature bundle sent to the scoring service.
///
/// Field names and units mirror the scoring model's training schema; do not
/// rename without retraining. `service_type` uses the model's historical
/// `prioritize` spelling for the priority tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRow {
    pub driver_id: CourierId,
    pub order_id: OrderId,
    pub distance_km: f64,
    pub shipping_fee: f64,
    pub requested_vehicle_type: String,
    pub service_type: String,
    /// 1 if raining, 0 otherwise
    pub is_raining: u8,
    pub hour_sin: f64,
    pub hour_cos: f64,
    /// Orders recorded in the pickup cell over the trailing hour
    pub h3_demand_60m: f64,
    pub driver_distance_to_pickup: f64,
    pub driver_fatigue_index: f64,
    pub driver_global_accept_rate: f64,
    pub cod_amount: f64,
}

/// Wire name the scoring model was trained with for a service tier
pub fn service_tier_feature(tier: ServiceTier) -> &'static str {
    match tier {
        ServiceTier::Standard => "standard",
        ServiceTier::Fast => "fast",
        ServiceTier::Priority => "prioritize",
    }
}

/// Batch scoring request (`POST {model}/predict/batch`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBatchRequest {
    pub requests: Vec<FeatureRow>,
}
