//! Cold-start acceptance-rate blending
//!
//! Bayesian smoothing over a courier's raw accept/request counters. Unseen
//! couriers score the fleet-wide mean instead of zero, so new couriers are
//! offered orders at a fair rate; with history the estimate converges to
//! the observed rate. The blended value travels to the scorer as the
//! `driver_global_accept_rate` feature; exploration fairness lives inside
//! the feature vector, never as a post-hoc score bonus.

/// `(C * m + accepts) / (C + requests)`
///
/// `prior_strength` (C) is the number of virtual observations at the
/// global mean `m`; it must be positive and is clamped away from zero.
pub fn smoothed_accept_rate(
    requests: i64,
    accepts: i64,
    global_mean: f64,
    prior_strength: f64,
) -> f64 {
    debug_assert!(prior_strength > 0.0, "prior strength must be positive");
    let c = prior_strength.max(f64::EPSILON);
    let rate = (c * global_mean + accepts as f64) / (c + requests as f64);
    rate.clamp(0.0, 1.0)
}
