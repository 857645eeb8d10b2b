//! Dispatch orchestrator
//!
//! Drives the full matching flow for one order and the resolution of its
//! outstanding offer. The whole flow runs under a wall-clock deadline; a
//! reservation held when the deadline fires is released before the caller
//! sees `unmatched`, so a slow order can never strand a courier.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use shared::{Candidate, CourierId, CourierStatus, Order, RankedCandidate, ScoreBatchRequest};

use crate::demand::DemandCounter;
use crate::fleet::FleetRepository;
use crate::geo::{self, GeoIndex};
use crate::metrics;
use crate::scoring::{self, blend, Scorer};
use crate::store::{keys, StoreBackend};

use super::filters::CandidateFilter;
use super::lock::LockManager;
use super::sequence::{self, SequencePlan};
use super::updater::CourierEvent;
use super::{DispatchConfig, DispatchError, DispatchOutcome, ResolveOutcome, UnmatchedReason};

/// The courier whose reservation the in-flight walk may hold.
///
/// Set pessimistically before `try_acquire`, so the deadline path can
/// always attempt an ownership-checked release; releasing a reservation
/// that was never taken is a harmless no-op.
type HeldLock = Arc<Mutex<Option<CourierId>>>;

pub struct Orchestrator {
    store: Arc<dyn StoreBackend>,
    geo: Arc<GeoIndex>,
    demand: Arc<DemandCounter>,
    fleet: Arc<FleetRepository>,
    scorer: Arc<dyn Scorer>,
    locks: Arc<LockManager>,
    filters: Vec<Box<dyn CandidateFilter>>,
    events: mpsc::UnboundedSender<CourierEvent>,
    cfg: DispatchConfig,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn StoreBackend>,
        geo: Arc<GeoIndex>,
        demand: Arc<DemandCounter>,
        fleet: Arc<FleetRepository>,
        scorer: Arc<dyn Scorer>,
        locks: Arc<LockManager>,
        filters: Vec<Box<dyn CandidateFilter>>,
        events: mpsc::UnboundedSender<CourierEvent>,
        cfg: DispatchConfig,
    ) -> Self {
        Self {
            store,
            geo,
            demand,
            fleet,
            scorer,
            locks,
            filters,
            events,
            cfg,
        }
    }

    /// Run the matching flow for one order, bounded by the match deadline.
    pub async fn dispatch(&self, order: &Order) -> Result<DispatchOutcome, DispatchError> {
        metrics::ORDERS_TOTAL.inc();
        let held: HeldLock = Arc::new(Mutex::new(None));

        match tokio::time::timeout(self.cfg.match_deadline, self.run(order, &held)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                self.abandon(order, &held).await;
                tracing::warn!(order_id = %order.id, "match deadline exceeded");
                Ok(DispatchOutcome::Unmatched {
                    reason: UnmatchedReason::DeadlineExceeded,
                })
            }
        }
    }

    /// Deadline cleanup: free the reservation the interrupted walk may
    /// hold and discard the plan. Errors here are logged, not surfaced;
    /// the order outcome is already decided.
    async fn abandon(&self, order: &Order, held: &HeldLock) {
        let courier_id = held.lock().take();
        if let Some(courier_id) = courier_id {
            match self.locks.release(&courier_id, &order.id).await {
                // We owned the reservation, so the OFFERED status write may
                // have landed too; put the courier back in the pool.
                Ok(true) => {
                    if let Err(err) = self.fleet.set_status(&courier_id, CourierStatus::Idle).await
                    {
                        tracing::error!(
                            courier_id = %courier_id,
                            error = %err,
                            "failed to reset courier status after deadline"
                        );
                    }
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::error!(
                        courier_id = %courier_id,
                        error = %err,
                        "failed to release reservation after deadline"
                    );
                }
            }
        }
        if let Err(err) = self.store.del(&keys::plan(&order.id)).await {
            tracing::error!(order_id = %order.id, error = %err, "failed to drop offer plan");
        }
    }

    async fn run(&self, order: &Order, held: &HeldLock) -> Result<DispatchOutcome, DispatchError> {
        let cell = geo::cell_for(order.pickup_lat, order.pickup_lon)?.to_string();
        let now = order.created_at.timestamp() as f64;
        self.demand.record(&cell, &order.id, now).await?;

        // Retrieving
        let ids = self
            .geo
            .query(
                order.pickup_lat,
                order.pickup_lon,
                order.vehicle_class,
                self.cfg.min_candidates,
                self.cfg.max_candidates,
            )
            .await?;
        let candidates = self.hydrate(order, ids).await?;
        if candidates.is_empty() {
            tracing::info!(order_id = %order.id, cell, "no eligible candidates");
            return Ok(DispatchOutcome::Unmatched {
                reason: UnmatchedReason::NoCandidates,
            });
        }

        // Scoring
        let cell_demand = self.demand.count(&cell, now).await? as f64;
        let batch = ScoreBatchRequest {
            requests: scoring::feature_rows(order, &candidates, cell_demand),
        };
        let scores = self.score_with_retry(batch).await?;

        // Sequencing
        let ranked = sequence::rank(&candidates, &scores);
        if ranked.is_empty() {
            tracing::warn!(order_id = %order.id, "scorer covered no candidate");
            return Ok(DispatchOutcome::Unmatched {
                reason: UnmatchedReason::NoCandidates,
            });
        }
        for candidate in &ranked {
            metrics::SCORE_DISTRIBUTION.observe(candidate.probability);
        }
        let mut plan = SequencePlan::new(order.id.clone(), ranked);

        // Offering
        match self.offer_walk(&order.id, &mut plan, held).await? {
            Some(offered) => {
                self.save_plan(&plan).await?;
                tracing::info!(
                    order_id = %order.id,
                    courier_id = %offered.courier_id,
                    probability = offered.probability,
                    "offer placed"
                );
                Ok(DispatchOutcome::Matched {
                    courier_id: offered.courier_id,
                    probability: offered.probability,
                })
            }
            None => {
                self.store.del(&keys::plan(&order.id)).await?;
                Ok(DispatchOutcome::Unmatched {
                    reason: UnmatchedReason::CandidatesExhausted,
                })
            }
        }
    }

    /// State hydration plus eligibility filtering.
    ///
    /// State and profile hashes for the whole batch are fetched in one
    /// pipelined round trip. Couriers with missing or unparsable records
    /// are skipped, never fatal: the geo index may lag behind expiry of a
    /// state hash.
    async fn hydrate(
        &self,
        order: &Order,
        ids: Vec<CourierId>,
    ) -> Result<Vec<Candidate>, DispatchError> {
        let snapshots = self.fleet.snapshots(&ids).await?;
        let mut candidates = Vec::with_capacity(snapshots.len());
        'couriers: for (courier_id, state, profile) in snapshots {
            let Some(state) = state else {
                tracing::debug!(courier_id, "indexed courier has no state, skipping");
                continue;
            };
            let Some(profile) = profile else {
                tracing::debug!(courier_id, "indexed courier has no profile, skipping");
                continue;
            };
            for filter in &self.filters {
                if !filter.accepts(order, &courier_id, &profile, &state) {
                    tracing::trace!(courier_id, filter = filter.name(), "candidate filtered");
                    continue 'couriers;
                }
            }
            let distance = geo::distance_km(
                state.lat,
                state.lon,
                order.pickup_lat,
                order.pickup_lon,
            )?;
            candidates.push(Candidate {
                courier_id,
                order_id: order.id.clone(),
                distance_to_pickup_km: distance,
                fatigue_index: state.fatigue_index,
                accept_rate: blend::smoothed_accept_rate(
                    state.requests_seen,
                    state.accepts,
                    self.cfg.global_mean_accept_rate,
                    self.cfg.prior_strength,
                ),
            });
        }
        Ok(candidates)
    }

    async fn score_with_retry(
        &self,
        batch: ScoreBatchRequest,
    ) -> Result<std::collections::HashMap<CourierId, f64>, DispatchError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.scorer.score(batch.clone()).await {
                Ok(scores) => return Ok(scores),
                Err(err) if err.is_retryable() && attempts < self.cfg.score_attempts => {
                    tracing::warn!(attempt = attempts, error = %err, "scoring attempt failed");
                }
                Err(err) => {
                    return Err(DispatchError::Scoring {
                        attempts,
                        source: err,
                    })
                }
            }
        }
    }

    /// Walk the ranked sequence from the plan cursor.
    ///
    /// A lock conflict advances to the next candidate; a win marks the
    /// courier OFFERED and pauses the walk with the reservation held.
    async fn offer_walk(
        &self,
        order_id: &str,
        plan: &mut SequencePlan,
        held: &HeldLock,
    ) -> Result<Option<RankedCandidate>, DispatchError> {
        while let Some(candidate) = plan.current().cloned() {
            *held.lock() = Some(candidate.courier_id.clone());
            if self.locks.try_acquire(&candidate.courier_id, order_id).await? {
                self.fleet
                    .set_status(&candidate.courier_id, CourierStatus::Offered)
                    .await?;
                return Ok(Some(candidate));
            }
            *held.lock() = None;
            tracing::debug!(
                order_id,
                courier_id = %candidate.courier_id,
                "courier reserved elsewhere, advancing"
            );
            plan.advance();
        }
        Ok(None)
    }

    /// Apply a courier's accept/reject decision to the outstanding offer.
    ///
    /// Rejection resumes the persisted walk without re-scoring; this may
    /// run on a different instance than the one that placed the offer.
    pub async fn resolve_offer(
        &self,
        order_id: &str,
        courier_id: &str,
        accepted: bool,
    ) -> Result<ResolveOutcome, DispatchError> {
        let mut plan = self.load_plan(order_id).await?;
        let current = plan
            .current()
            .ok_or_else(|| DispatchError::PlanNotFound(order_id.to_string()))?
            .clone();
        if current.courier_id != courier_id {
            return Err(DispatchError::WrongCourier {
                order_id: order_id.to_string(),
                expected: current.courier_id,
                got: courier_id.to_string(),
            });
        }

        // The reservation release is the resolution guard: exactly one
        // caller can delete the lock value, so a duplicate callback (or
        // one arriving after the reservation TTL lapsed) aborts here
        // instead of resuming the walk a second time.
        if !self.locks.release(courier_id, order_id).await? {
            return Err(DispatchError::OfferGone {
                order_id: order_id.to_string(),
                courier_id: courier_id.to_string(),
            });
        }

        if accepted {
            metrics::DRIVER_RESPONSE.with_label_values(&["accepted"]).inc();
            self.notify(CourierEvent::OfferAccepted {
                courier_id: courier_id.to_string(),
                order_id: order_id.to_string(),
            });
            self.store.del(&keys::plan(order_id)).await?;
            return Ok(ResolveOutcome::Accepted {
                courier_id: courier_id.to_string(),
            });
        }

        metrics::DRIVER_RESPONSE.with_label_values(&["rejected"]).inc();
        self.notify(CourierEvent::OfferRejected {
            courier_id: courier_id.to_string(),
            order_id: order_id.to_string(),
        });
        plan.advance();

        let held: HeldLock = Arc::new(Mutex::new(None));
        match self.offer_walk(order_id, &mut plan, &held).await? {
            Some(offered) => {
                self.save_plan(&plan).await?;
                Ok(ResolveOutcome::Reoffered {
                    courier_id: offered.courier_id,
                    probability: offered.probability,
                })
            }
            None => {
                self.store.del(&keys::plan(order_id)).await?;
                Ok(ResolveOutcome::Exhausted)
            }
        }
    }

    /// Record a trip outcome for the courier that accepted `order_id`.
    pub fn complete_trip(&self, order_id: &str, courier_id: &str, cancelled: bool) {
        self.notify(CourierEvent::TripCompleted {
            courier_id: courier_id.to_string(),
            order_id: order_id.to_string(),
            cancelled,
        });
    }

    fn notify(&self, event: CourierEvent) {
        // Only fails when the updater is gone, i.e. during shutdown.
        if self.events.send(event).is_err() {
            tracing::warn!("state updater channel closed, event dropped");
        }
    }

    async fn save_plan(&self, plan: &SequencePlan) -> Result<(), DispatchError> {
        let json = serde_json::to_string(plan)
            .map_err(|e| DispatchError::PlanCorrupt(plan.order_id.clone(), e.to_string()))?;
        self.store
            .set_ex(&keys::plan(&plan.order_id), &json, self.cfg.plan_ttl)
            .await?;
        Ok(())
    }

    async fn load_plan(&self, order_id: &str) -> Result<SequencePlan, DispatchError> {
        let json = self
            .store
            .get(&keys::plan(order_id))
            .await?
            .ok_or_else(|| DispatchError::PlanNotFound(order_id.to_string()))?;
        serde_json::from_str(&json)
            .map_err(|e| DispatchError::PlanCorrupt(order_id.to_string(), e.to_string()))
    }
}
