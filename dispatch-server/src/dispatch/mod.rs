//! Dispatch pipeline
//!
//! One order flows Ingested → Retrieving → Scoring → Sequencing → Offering
//! and terminates in Matched, Unmatched or Failed. Scarcity (no couriers,
//! every candidate declined) is always Unmatched; Failed is reserved for
//! unrecoverable store or scoring errors. Instances are stateless: every
//! piece of cross-order coordination lives in the store as an atomic
//! primitive, so any instance can pick up a rejection callback for a walk
//! another instance started.

pub mod filters;
pub mod lock;
pub mod orchestrator;
pub mod sequence;
pub mod updater;

pub use lock::LockManager;
pub use orchestrator::Orchestrator;
pub use updater::{CourierEvent, StateUpdater};

use std::time::Duration;

use thiserror::Error;

use shared::{CourierId, OrderId};

use crate::geo::GeoError;
use crate::scoring::ScoringError;
use crate::store::StoreError;

/// Tunables for one orchestrator instance
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Stop ring expansion once this many candidates are found
    pub min_candidates: usize,
    /// Hard cap on retrieved candidates per order
    pub max_candidates: usize,
    /// Total scoring attempts (first try included)
    pub score_attempts: u32,
    /// Wall-clock limit for one `POST /orders` flow
    pub match_deadline: Duration,
    /// Lifetime of a persisted offer plan awaiting resolution
    pub plan_ttl: Duration,
    pub global_mean_accept_rate: f64,
    pub prior_strength: f64,
    /// Couriers at or above this fatigue index are filtered out
    pub fatigue_cap: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            min_candidates: 5,
            max_candidates: 100,
            score_attempts: 3,
            match_deadline: Duration::from_secs(5),
            plan_ttl: Duration::from_secs(600),
            global_mean_accept_rate: 0.60,
            prior_strength: 20.0,
            fatigue_cap: 0.95,
        }
    }
}

/// Unrecoverable dispatch failures; every variant maps to `status: failed`
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Geo(#[from] GeoError),

    #[error("scoring failed after {attempts} attempt(s): {source}")]
    Scoring {
        attempts: u32,
        #[source]
        source: ScoringError,
    },

    #[error("no pending offer for order {0}")]
    PlanNotFound(OrderId),

    #[error("offer for order {order_id} is pending with courier {expected}, not {got}")]
    WrongCourier {
        order_id: OrderId,
        expected: CourierId,
        got: CourierId,
    },

    #[error("offer for order {order_id} is no longer reserved by courier {courier_id}")]
    OfferGone {
        order_id: OrderId,
        courier_id: CourierId,
    },

    #[error("corrupt offer plan for order {0}: {1}")]
    PlanCorrupt(OrderId, String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// An offer is out; the order now waits on the courier's decision
    Matched {
        courier_id: CourierId,
        probability: f64,
    },
    Unmatched { reason: UnmatchedReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmatchedReason {
    /// Geo retrieval or filtering produced an empty candidate list
    NoCandidates,
    /// Every ranked candidate was locked away or declined
    CandidatesExhausted,
    DeadlineExceeded,
}

impl UnmatchedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnmatchedReason::NoCandidates => "no_candidates",
            UnmatchedReason::CandidatesExhausted => "candidates_exhausted",
            UnmatchedReason::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

/// Result of a courier's decision on an outstanding offer
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    Accepted { courier_id: CourierId },
    /// Rejection; the walk moved on and a new offer is out
    Reoffered {
        courier_id: CourierId,
        probability: f64,
    },
    /// Rejection and no candidates left
    Exhausted,
}
