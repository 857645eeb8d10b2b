//! Shared types for the RouteMatch dispatch system
//!
//! Common types used across crates: domain models, request/response DTOs
//! and the closed domain enums that round-trip through the shared store.

pub mod models;
pub mod request;
pub mod response;
pub mod types;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use models::{Candidate, CourierProfile, CourierState, Order, RankedCandidate};
pub use request::{
    FeatureRow, LocationUpdateRequest, ResolveOfferRequest, ScoreBatchRequest, SubmitOrderRequest,
};
pub use response::{
    CourierView, DispatchStatus, DriverScore, ScoreBatchResponse, SubmitOrderResponse,
};
pub use types::{CourierId, CourierStatus, OrderId, ServiceTier, VehicleClass};
