//! Scoring boundary
//!
//! Forwards (order, candidate batch) to the external acceptance-probability
//! model and returns per-courier probabilities. This layer performs no
//! matching logic of its own: it batches, bounds the call with a timeout
//! and surfaces failures as distinct errors so the orchestrator's algorithm
//! stays independent of the model runtime. A failure is never papered over
//! with a fabricated score.

pub mod blend;
mod http;

pub use http::HttpScorer;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use shared::request::service_tier_feature;
use shared::{Candidate, CourierId, FeatureRow, Order, ScoreBatchRequest};

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("scoring request timed out after {0:?}")]
    Timeout(Duration),

    #[error("scoring service error: {0}")]
    Upstream(String),

    #[error("malformed scoring response: {0}")]
    Malformed(String),

    #[error("empty candidate batch")]
    EmptyBatch,
}

impl ScoringError {
    /// Timeouts and upstream hiccups are worth a bounded retry; malformed
    /// payloads and empty batches are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScoringError::Timeout(_) | ScoringError::Upstream(_))
    }
}

/// The opaque scoring function
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(
        &self,
        batch: ScoreBatchRequest,
    ) -> Result<HashMap<CourierId, f64>, ScoringError>;
}

/// Assemble the per-candidate feature bundles for one order.
///
/// `cell_demand` is fetched once per order (the pickup cell is shared by
/// the whole batch); hour encoding derives from the order creation time.
pub fn feature_rows(order: &Order, candidates: &[Candidate], cell_demand: f64) -> Vec<FeatureRow> {
    let (hour_sin, hour_cos) = order.hour_encoding();
    candidates
        .iter()
        .map(|candidate| FeatureRow {
            driver_id: candidate.courier_id.clone(),
            order_id: order.id.clone(),
            distance_km: order.distance_km,
            shipping_fee: order.shipping_fee,
            requested_vehicle_type: order.vehicle_class.as_key().to_string(),
            service_type: service_tier_feature(order.service_tier).to_string(),
            is_raining: order.is_raining as u8,
            hour_sin,
            hour_cos,
            h3_demand_60m: cell_demand,
            driver_distance_to_pickup: candidate.distance_to_pickup_km,
            driver_fatigue_index: candidate.fatigue_index,
            driver_global_accept_rate: candidate.accept_rate,
            cod_amount: order.cod_amount,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use shared::{ServiceTier, VehicleClass};

    fn order() -> Order {
        Order {
            id: "ORD-7".into(),
            pickup_lat: 10.77,
            pickup_lon: 106.69,
            dropoff_lat: 10.80,
            dropoff_lon: 106.72,
            distance_km: 6.5,
            shipping_fee: 32_000.0,
            cod_amount: 150_000.0,
            vehicle_class: VehicleClass::Bike,
            service_tier: ServiceTier::Priority,
            is_raining: true,
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 18, 30, 0).unwrap(),
        }
    }

    #[test]
    fn rows_carry_order_context_and_candidate_features() {
        let candidates = vec![Candidate {
            courier_id: "D1".into(),
            order_id: "ORD-7".into(),
            distance_to_pickup_km: 1.2,
            fatigue_index: 0.3,
            accept_rate: 0.61,
        }];
        let rows = feature_rows(&order(), &candidates, 14.0);

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.driver_id, "D1");
        assert_eq!(row.requested_vehicle_type, "bike");
        // The model was trained with the historical spelling.
        assert_eq!(row.service_type, "prioritize");
        assert_eq!(row.is_raining, 1);
        assert_eq!(row.h3_demand_60m, 14.0);
        assert!((row.driver_distance_to_pickup - 1.2).abs() < 1e-12);
    }
}
