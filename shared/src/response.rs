//! Response types for the dispatch API and the scoring service boundary

use serde::{Deserialize, Serialize};

use crate::models::{CourierProfile, CourierState};
use crate::types::CourierId;

/// Terminal outcome of one dispatch flow
///
/// Business scarcity is `Unmatched`, never `Failed`; `Failed` is reserved
/// for unrecoverable adapter or store errors and is retryable by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Matched,
    Unmatched,
    Failed,
}

/// Submit-order response body
///
/// ```json
/// {
///   "status": "matched",
///   "driver_id": "D10293",
///   "score": 0.81,
///   "processing_time_ms": 23
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOrderResponse {
    pub status: DispatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<CourierId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Why the order went unmatched/failed (absent on a match)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub processing_time_ms: u64,
}

/// One scored candidate as returned by the scoring service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverScore {
    pub driver_id: CourierId,
    pub prob_accept: f64,
}

/// Batch scoring response: one entry per submitted feature row
pub type ScoreBatchResponse = Vec<DriverScore>;

/// Courier inspection view (`GET /couriers/{id}`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierView {
    pub courier_id: CourierId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<CourierProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<CourierState>,
}
