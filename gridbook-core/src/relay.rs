//! Notification Relay.
//!
//! At-least-once delivery of result-published notifications from the Event
//! Catalog to the Settlement Engine. Each emission is assigned a delivery
//! identifier once at ingest; the identifier stays stable across
//! redeliveries while the attempt count grows. Unacknowledged deliveries
//! are re-sent by a background sweep in delivery-id order, which keeps
//! same-event ordering best-effort — the engine's processed-set is the
//! real safety net.

use crate::config::RelayConfig;
use crate::entities::notification::DeliveryId;
use crate::events::{Delivery, DeliverySender, ResultPublished, ResultPublishedReceiver};
use gridbook_sdk::objects::notification::MarketResultPayload;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Errors that can occur while relaying a notification.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Payload serialization error
    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

struct InFlight {
    payload: String,
    attempt: u32,
    last_sent_at: Instant,
}

/// The at-least-once queue between catalog and settlement engine.
pub struct NotificationRelay {
    config: RelayConfig,
    delivery_tx: DeliverySender,
    next_delivery_id: AtomicU64,
    in_flight: Mutex<HashMap<DeliveryId, InFlight>>,
}

impl NotificationRelay {
    pub fn new(config: RelayConfig, delivery_tx: DeliverySender) -> Arc<Self> {
        Arc::new(Self {
            config,
            delivery_tx,
            next_delivery_id: AtomicU64::new(1),
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    /// Run the relay: ingest catalog emissions and sweep for redeliveries
    /// until shutdown is signaled.
    pub async fn run(
        self: Arc<Self>,
        mut source_rx: ResultPublishedReceiver,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("NotificationRelay started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("NotificationRelay received shutdown signal");
                        break;
                    }
                }

                Some(emission) = source_rx.recv() => {
                    if let Err(e) = self.ingest(emission).await {
                        error!(error = %e, "Failed to ingest ResultPublished");
                    }
                }

                _ = tokio::time::sleep(self.config.sweep_interval) => {
                    self.redeliver_due().await;
                }
            }
        }

        info!("NotificationRelay shutdown complete");
    }

    /// Acknowledge a delivery. The engine calls this only after the whole
    /// settlement batch behind the delivery has been resolved.
    pub async fn ack(&self, delivery_id: DeliveryId) {
        if self.in_flight.lock().await.remove(&delivery_id).is_some() {
            debug!(delivery_id, "Delivery acknowledged");
        }
    }

    /// Number of deliveries awaiting acknowledgement.
    pub async fn unacked(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    async fn ingest(&self, emission: ResultPublished) -> Result<(), RelayError> {
        let delivery_id = self.next_delivery_id.fetch_add(1, Ordering::SeqCst);
        let payload = serde_json::to_string(&MarketResultPayload {
            event_type: MarketResultPayload::EVENT_TYPE.to_string(),
            event_id: emission.event_id,
            market_id: emission.market_id,
            winning_outcome: emission.winning_outcome,
            timestamp: time::OffsetDateTime::now_utc().unix_timestamp(),
        })?;

        self.in_flight.lock().await.insert(
            delivery_id,
            InFlight {
                payload: payload.clone(),
                attempt: 1,
                last_sent_at: Instant::now(),
            },
        );

        debug!(delivery_id, event_id = emission.event_id, "Delivering notification");
        self.send(Delivery {
            delivery_id,
            attempt: 1,
            payload,
        })
        .await;
        Ok(())
    }

    /// Re-send every delivery that has waited past the redelivery deadline,
    /// dropping the ones that exhausted their attempt budget.
    async fn redeliver_due(&self) {
        let due = {
            let mut in_flight = self.in_flight.lock().await;
            let now = Instant::now();

            let exhausted: Vec<DeliveryId> = in_flight
                .iter()
                .filter(|(_, entry)| entry.attempt >= self.config.max_attempts)
                .map(|(id, _)| *id)
                .collect();
            for id in exhausted {
                in_flight.remove(&id);
                error!(
                    delivery_id = id,
                    max_attempts = self.config.max_attempts,
                    "Giving up on unacknowledged notification"
                );
            }

            let mut due: Vec<Delivery> = in_flight
                .iter_mut()
                .filter(|(_, entry)| {
                    now.duration_since(entry.last_sent_at) >= self.config.redeliver_after
                })
                .map(|(id, entry)| {
                    entry.attempt += 1;
                    entry.last_sent_at = now;
                    Delivery {
                        delivery_id: *id,
                        attempt: entry.attempt,
                        payload: entry.payload.clone(),
                    }
                })
                .collect();
            due.sort_by_key(|d| d.delivery_id);
            due
        };

        for delivery in due {
            warn!(
                delivery_id = delivery.delivery_id,
                attempt = delivery.attempt,
                "Redelivering unacknowledged notification"
            );
            self.send(delivery).await;
        }
    }

    async fn send(&self, delivery: Delivery) {
        if self.delivery_tx.send(delivery).await.is_err() {
            error!("Delivery channel closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{delivery_channel, result_published_channel};
    use std::time::Duration;
    use uuid::Uuid;

    fn test_config() -> RelayConfig {
        RelayConfig {
            redeliver_after: Duration::from_secs(2),
            sweep_interval: Duration::from_millis(500),
            max_attempts: 12,
        }
    }

    fn emission(event_id: i64) -> ResultPublished {
        ResultPublished {
            event_id,
            market_id: Uuid::new_v4(),
            winning_outcome: Some("VER".into()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unacked_deliveries_are_resent_with_a_stable_id() {
        let (delivery_tx, mut delivery_rx) = delivery_channel();
        let (source_tx, source_rx) = result_published_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let relay = NotificationRelay::new(test_config(), delivery_tx);
        let handle = tokio::spawn(relay.clone().run(source_rx, shutdown_rx));

        source_tx.send(emission(1)).await.unwrap();

        let first = delivery_rx.recv().await.unwrap();
        assert_eq!(first.attempt, 1);

        // Not acked: the sweep must re-send the same delivery id.
        let second = delivery_rx.recv().await.unwrap();
        assert_eq!(second.delivery_id, first.delivery_id);
        assert_eq!(second.attempt, 2);
        assert_eq!(second.payload, first.payload);

        relay.ack(second.delivery_id).await;
        assert_eq!(relay.unacked().await, 0);

        // Acked: nothing further arrives.
        let silence =
            tokio::time::timeout(Duration::from_secs(10), delivery_rx.recv()).await;
        assert!(silence.is_err());

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn same_event_deliveries_keep_their_order() {
        let (delivery_tx, mut delivery_rx) = delivery_channel();
        let (source_tx, source_rx) = result_published_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let relay = NotificationRelay::new(test_config(), delivery_tx);
        let handle = tokio::spawn(relay.clone().run(source_rx, shutdown_rx));

        // Partial then final result for the same event.
        source_tx.send(emission(7)).await.unwrap();
        source_tx.send(emission(7)).await.unwrap();

        let first = delivery_rx.recv().await.unwrap();
        let second = delivery_rx.recv().await.unwrap();
        assert!(first.delivery_id < second.delivery_id);

        // Redeliveries also come back in delivery-id order.
        let re_first = delivery_rx.recv().await.unwrap();
        let re_second = delivery_rx.recv().await.unwrap();
        assert_eq!(re_first.delivery_id, first.delivery_id);
        assert_eq!(re_second.delivery_id, second.delivery_id);

        relay.ack(first.delivery_id).await;
        relay.ack(second.delivery_id).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_attempt_budget_drops_the_delivery() {
        let (delivery_tx, mut delivery_rx) = delivery_channel();
        let (source_tx, source_rx) = result_published_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let relay = NotificationRelay::new(
            RelayConfig {
                max_attempts: 2,
                ..test_config()
            },
            delivery_tx,
        );
        let handle = tokio::spawn(relay.clone().run(source_rx, shutdown_rx));

        source_tx.send(emission(9)).await.unwrap();

        assert_eq!(delivery_rx.recv().await.unwrap().attempt, 1);
        assert_eq!(delivery_rx.recv().await.unwrap().attempt, 2);

        // The budget is spent; the relay gives up instead of spinning.
        let silence =
            tokio::time::timeout(Duration::from_secs(10), delivery_rx.recv()).await;
        assert!(silence.is_err());
        assert_eq!(relay.unacked().await, 0);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn payload_round_trips_through_the_queue() {
        let (delivery_tx, mut delivery_rx) = delivery_channel();
        let (source_tx, source_rx) = result_published_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let relay = NotificationRelay::new(test_config(), delivery_tx);
        let handle = tokio::spawn(relay.clone().run(source_rx, shutdown_rx));

        let sent = emission(3);
        source_tx.send(sent.clone()).await.unwrap();

        let delivery = delivery_rx.recv().await.unwrap();
        let payload: MarketResultPayload = serde_json::from_str(&delivery.payload).unwrap();
        assert_eq!(payload.event_type, MarketResultPayload::EVENT_TYPE);
        assert_eq!(payload.event_id, sent.event_id);
        assert_eq!(payload.market_id, sent.market_id);
        assert_eq!(payload.winning_outcome, sent.winning_outcome);

        relay.ack(delivery.delivery_id).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
