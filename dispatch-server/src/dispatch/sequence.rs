//! Offer sequencing
//!
//! Turns scored candidates into a deterministic offer order and tracks the
//! walk position. The plan is a plain serializable value persisted next to
//! the order, so a rejection callback landing on any instance can resume
//! the walk where it stopped.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use shared::{Candidate, CourierId, OrderId, RankedCandidate};

/// Rank candidates by acceptance probability, best first.
///
/// Ties break on distance to pickup (closer first), then courier id, so
/// the same inputs always produce the same sequence. Candidates the scorer
/// returned no probability for are dropped with a warning.
pub fn rank(candidates: &[Candidate], scores: &HashMap<CourierId, f64>) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = candidates
        .iter()
        .filter_map(|candidate| match scores.get(&candidate.courier_id) {
            Some(prob) => Some(RankedCandidate {
                courier_id: candidate.courier_id.clone(),
                probability: *prob,
                distance_to_pickup_km: candidate.distance_to_pickup_km,
            }),
            None => {
                tracing::warn!(
                    courier_id = %candidate.courier_id,
                    "scorer returned no probability for candidate, dropping"
                );
                None
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                a.distance_to_pickup_km
                    .partial_cmp(&b.distance_to_pickup_km)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.courier_id.cmp(&b.courier_id))
    });
    ranked
}

/// The persisted walk state for one order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencePlan {
    pub order_id: OrderId,
    pub candidates: Vec<RankedCandidate>,
    /// Index of the candidate currently (or next) being offered
    pub cursor: usize,
}

impl SequencePlan {
    pub fn new(order_id: OrderId, candidates: Vec<RankedCandidate>) -> Self {
        Self {
            order_id,
            candidates,
            cursor: 0,
        }
    }

    pub fn current(&self) -> Option<&RankedCandidate> {
        self.candidates.get(self.cursor)
    }

    pub fn advance(&mut self) {
        if self.cursor < self.candidates.len() {
            self.cursor += 1;
        }
    }

    pub fn exhausted(&self) -> bool {
        self.cursor >= self.candidates.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;

    fn candidate(id: &str, distance: f64) -> Candidate {
        Candidate {
            courier_id: id.into(),
            order_id: "ORD-1".into(),
            distance_to_pickup_km: distance,
            fatigue_index: 0.1,
            accept_rate: 0.6,
        }
    }

    #[test]
    fn ranks_by_probability_descending() {
        let candidates = vec![candidate("a", 1.0), candidate("b", 1.0), candidate("c", 1.0)];
        let scores = HashMap::from([
            ("a".to_string(), 0.3),
            ("b".to_string(), 0.9),
            ("c".to_string(), 0.6),
        ]);

        let ids: Vec<_> = rank(&candidates, &scores)
            .into_iter()
            .map(|r| r.courier_id)
            .collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn ties_break_on_distance_then_id() {
        let candidates = vec![
            candidate("far", 5.0),
            candidate("near", 1.0),
            candidate("also-near", 1.0),
        ];
        let scores: HashMap<_, _> = candidates
            .iter()
            .map(|c| (c.courier_id.clone(), 0.5))
            .collect();

        let ids: Vec<_> = rank(&candidates, &scores)
            .into_iter()
            .map(|r| r.courier_id)
            .collect();
        assert_eq!(ids, vec!["also-near", "near", "far"]);
    }

    #[test]
    fn ranking_is_input_order_independent() {
        let mut candidates: Vec<Candidate> = (0..20)
            .map(|i| candidate(&format!("D{i:02}"), (i % 4) as f64))
            .collect();
        let scores: HashMap<_, _> = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| (c.courier_id.clone(), ((i % 5) as f64) / 10.0))
            .collect();

        let baseline = rank(&candidates, &scores);
        let mut rng = rand::thread_rng();
        for _ in 0..10 {
            candidates.shuffle(&mut rng);
            assert_eq!(rank(&candidates, &scores), baseline);
        }
    }

    #[test]
    fn unscored_candidates_are_dropped() {
        let candidates = vec![candidate("scored", 1.0), candidate("missing", 1.0)];
        let scores = HashMap::from([("scored".to_string(), 0.5)]);

        let ranked = rank(&candidates, &scores);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].courier_id, "scored");
    }

    #[test]
    fn plan_walk_and_resume_round_trip() {
        let ranked = vec![
            RankedCandidate {
                courier_id: "a".into(),
                probability: 0.9,
                distance_to_pickup_km: 1.0,
            },
            RankedCandidate {
                courier_id: "b".into(),
                probability: 0.4,
                distance_to_pickup_km: 2.0,
            },
        ];
        let mut plan = SequencePlan::new("ORD-1".into(), ranked);
        assert_eq!(plan.current().unwrap().courier_id, "a");

        plan.advance();
        let json = serde_json::to_string(&plan).unwrap();
        let resumed: SequencePlan = serde_json::from_str(&json).unwrap();
        assert_eq!(resumed.cursor, 1);
        assert_eq!(resumed.current().unwrap().courier_id, "b");

        let mut resumed = resumed;
        resumed.advance();
        assert!(resumed.exhausted());
        assert!(resumed.current().is_none());
        // Advancing past the end is a no-op.
        resumed.advance();
        assert_eq!(resumed.cursor, 2);
    }
}
