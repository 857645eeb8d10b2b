//! Ephemeral matching artifacts
//!
//! A [`Candidate`] exists only for the lifetime of one matching attempt and
//! is never persisted. A [`RankedCandidate`] is the scored, sorted form the
//! offering walk iterates over; the walk's cursor is persisted alongside the
//! ranked list so a successor instance can resume the same sequence.

use serde::{Deserialize, Serialize};

use crate::types::{CourierId, OrderId};

/// A retrieved courier paired with the features the scorer needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub courier_id: CourierId,
    pub order_id: OrderId,
    /// Great-circle distance from the courier to the pickup point, km
    pub distance_to_pickup_km: f64,
    pub fatigue_index: f64,
    /// Bayesian-smoothed acceptance rate (cold-start blended)
    pub accept_rate: f64,
}

/// A candidate after scoring, as ranked by the sequencer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub courier_id: CourierId,
    /// Acceptance probability returned by the scoring service
    pub probability: f64,
    pub distance_to_pickup_km: f64,
}
