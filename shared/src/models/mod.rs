//! Domain models shared between the dispatch service and its clients

pub mod candidate;
pub mod courier;
pub mod order;

pub use candidate::{Candidate, RankedCandidate};
pub use courier::{CourierProfile, CourierState};
pub use order::Order;
