//! Asynchronous courier state updater
//!
//! Single consumer of offer-resolution and trip-completion events. All
//! counter mutations for a courier funnel through this one worker, which
//! is what makes the read-modify-write against the state hash safe without
//! per-field atomics. Handlers only enqueue; the response path never waits
//! on a state write.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use shared::{CourierId, CourierStatus, OrderId};

use crate::fleet::FleetRepository;
use crate::scoring::blend;
use crate::store::StoreResult;

/// Weight of the newest trip in the cancel-rate moving estimate
const CANCEL_RATE_ALPHA: f64 = 0.1;
/// Fatigue added per completed trip; recovery is handled by ops resets
const FATIGUE_PER_TRIP: f64 = 0.05;

#[derive(Debug, Clone)]
pub enum CourierEvent {
    OfferAccepted {
        courier_id: CourierId,
        order_id: OrderId,
    },
    OfferRejected {
        courier_id: CourierId,
        order_id: OrderId,
    },
    TripCompleted {
        courier_id: CourierId,
        order_id: OrderId,
        cancelled: bool,
    },
}

impl CourierEvent {
    fn courier_id(&self) -> &str {
        match self {
            CourierEvent::OfferAccepted { courier_id, .. }
            | CourierEvent::OfferRejected { courier_id, .. }
            | CourierEvent::TripCompleted { courier_id, .. } => courier_id,
        }
    }
}

pub struct StateUpdater {
    fleet: Arc<FleetRepository>,
    global_mean_accept_rate: f64,
    prior_strength: f64,
}

impl StateUpdater {
    pub fn new(
        fleet: Arc<FleetRepository>,
        global_mean_accept_rate: f64,
        prior_strength: f64,
    ) -> Self {
        Self {
            fleet,
            global_mean_accept_rate,
            prior_strength,
        }
    }

    pub fn channel() -> (
        mpsc::UnboundedSender<CourierEvent>,
        mpsc::UnboundedReceiver<CourierEvent>,
    ) {
        mpsc::unbounded_channel()
    }

    /// Worker loop; drains the queue until cancelled.
    pub async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<CourierEvent>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    // Apply whatever was enqueued before the signal; a
                    // dropped event is a permanently lost counter update.
                    let mut drained = 0usize;
                    while let Ok(event) = events.try_recv() {
                        drained += 1;
                        if let Err(err) = self.apply(&event).await {
                            tracing::error!(
                                courier_id = event.courier_id(),
                                error = %err,
                                "failed to apply courier event"
                            );
                        }
                    }
                    tracing::info!(drained, "state updater shutting down");
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else { break };
                    if let Err(err) = self.apply(&event).await {
                        tracing::error!(
                            courier_id = event.courier_id(),
                            error = %err,
                            "failed to apply courier event"
                        );
                    }
                }
            }
        }
    }

    /// Apply one event to the courier's state hash.
    ///
    /// Events for unknown couriers are dropped with a warning; the source
    /// of truth for fleet membership is registration, not the event stream.
    pub async fn apply(&self, event: &CourierEvent) -> StoreResult<()> {
        let courier_id = event.courier_id();
        let Some(mut state) = self.fleet.state(courier_id).await? else {
            tracing::warn!(courier_id, "dropping event for unknown courier");
            return Ok(());
        };

        match event {
            CourierEvent::OfferAccepted { order_id, .. } => {
                state.requests_seen += 1;
                state.accepts += 1;
                state.status = CourierStatus::Busy;
                tracing::debug!(courier_id, order_id = %order_id, "offer accepted");
            }
            CourierEvent::OfferRejected { order_id, .. } => {
                state.requests_seen += 1;
                state.status = CourierStatus::Idle;
                tracing::debug!(courier_id, order_id = %order_id, "offer rejected");
            }
            CourierEvent::TripCompleted {
                order_id,
                cancelled,
                ..
            } => {
                state.status = CourierStatus::Idle;
                if !cancelled {
                    state.orders_completed += 1;
                    state.fatigue_index =
                        (state.fatigue_index + FATIGUE_PER_TRIP).min(1.0);
                }
                let observed = if *cancelled { 1.0 } else { 0.0 };
                state.cancel_rate = (1.0 - CANCEL_RATE_ALPHA) * state.cancel_rate
                    + CANCEL_RATE_ALPHA * observed;
                tracing::debug!(courier_id, order_id = %order_id, cancelled, "trip finished");
            }
        }

        state.accept_rate = blend::smoothed_accept_rate(
            state.requests_seen,
            state.accepts,
            self.global_mean_accept_rate,
            self.prior_strength,
        );
        self.fleet.write_state(courier_id, &state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use shared::{CourierProfile, VehicleClass};

    async fn seeded_updater() -> (StateUpdater, Arc<FleetRepository>) {
        let store = Arc::new(MemoryStore::new());
        let fleet = Arc::new(FleetRepository::new(store, 0.60));
        let profile = CourierProfile {
            vehicle_class: VehicleClass::Bike,
            max_load_kg: 30,
            joined_date: "2023-01-01".into(),
        };
        fleet.register("D1", &profile, 10.77, 106.69).await.unwrap();
        (StateUpdater::new(fleet.clone(), 0.60, 20.0), fleet)
    }

    #[tokio::test]
    async fn accept_increments_both_counters_and_goes_busy() {
        let (updater, fleet) = seeded_updater().await;

        updater
            .apply(&CourierEvent::OfferAccepted {
                courier_id: "D1".into(),
                order_id: "ORD-1".into(),
            })
            .await
            .unwrap();

        let state = fleet.state("D1").await.unwrap().unwrap();
        assert_eq!(state.requests_seen, 1);
        assert_eq!(state.accepts, 1);
        assert_eq!(state.status, CourierStatus::Busy);
        // (20 * 0.6 + 1) / (20 + 1)
        assert!((state.accept_rate - 13.0 / 21.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn reject_counts_the_request_only() {
        let (updater, fleet) = seeded_updater().await;

        updater
            .apply(&CourierEvent::OfferRejected {
                courier_id: "D1".into(),
                order_id: "ORD-1".into(),
            })
            .await
            .unwrap();

        let state = fleet.state("D1").await.unwrap().unwrap();
        assert_eq!(state.requests_seen, 1);
        assert_eq!(state.accepts, 0);
        assert_eq!(state.status, CourierStatus::Idle);
        // (20 * 0.6) / 21, pulled just below the mean
        assert!(state.accept_rate < 0.60);
    }

    #[tokio::test]
    async fn completed_trip_returns_courier_to_idle() {
        let (updater, fleet) = seeded_updater().await;
        fleet.set_status("D1", CourierStatus::Busy).await.unwrap();

        updater
            .apply(&CourierEvent::TripCompleted {
                courier_id: "D1".into(),
                order_id: "ORD-1".into(),
                cancelled: false,
            })
            .await
            .unwrap();

        let state = fleet.state("D1").await.unwrap().unwrap();
        assert_eq!(state.status, CourierStatus::Idle);
        assert_eq!(state.orders_completed, 1);
        assert!((state.fatigue_index - 0.05).abs() < 1e-12);
        assert!(state.cancel_rate < 1e-12);
    }

    #[tokio::test]
    async fn cancelled_trip_moves_the_cancel_estimate() {
        let (updater, fleet) = seeded_updater().await;

        updater
            .apply(&CourierEvent::TripCompleted {
                courier_id: "D1".into(),
                order_id: "ORD-1".into(),
                cancelled: true,
            })
            .await
            .unwrap();

        let state = fleet.state("D1").await.unwrap().unwrap();
        assert_eq!(state.orders_completed, 0);
        assert!((state.cancel_rate - 0.1).abs() < 1e-12);
    }

    #[tokio::test]
    async fn unknown_courier_event_is_dropped() {
        let (updater, _fleet) = seeded_updater().await;
        updater
            .apply(&CourierEvent::OfferAccepted {
                courier_id: "ghost".into(),
                order_id: "ORD-1".into(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn shutdown_applies_queued_events_before_exit() {
        let (updater, fleet) = seeded_updater().await;
        let (tx, rx) = StateUpdater::channel();
        let shutdown = CancellationToken::new();

        for i in 0..3 {
            tx.send(CourierEvent::OfferRejected {
                courier_id: "D1".into(),
                order_id: format!("ORD-{}", i),
            })
            .unwrap();
        }
        shutdown.cancel();
        updater.run(rx, shutdown).await;

        let state = fleet.state("D1").await.unwrap().unwrap();
        assert_eq!(state.requests_seen, 3);
    }

    #[tokio::test]
    async fn worker_drains_queue_and_stops_on_cancel() {
        let (updater, fleet) = seeded_updater().await;
        let (tx, rx) = StateUpdater::channel();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(updater.run(rx, shutdown.clone()));

        tx.send(CourierEvent::OfferAccepted {
            courier_id: "D1".into(),
            order_id: "ORD-1".into(),
        })
        .unwrap();
        drop(tx);
        handle.await.unwrap();

        let state = fleet.state("D1").await.unwrap().unwrap();
        assert_eq!(state.accepts, 1);
    }
}
