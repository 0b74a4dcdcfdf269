//! Settlement Engine.
//!
//! Consumes result-published deliveries (possibly duplicated, reordered,
//! or delayed) and moves matching Pending bets to a terminal state exactly
//! once. Idempotency comes from a durable processed-set keyed on delivery
//! ids; per-bet persistence failures are isolated to the failing bet, which
//! is parked as SettlementFailed while the rest of the batch proceeds. The
//! delivery is acknowledged and marked processed only once every bet in the
//! batch has reached a terminal or SettlementFailed state, so a crash
//! mid-batch is retried by redelivery against the Pending remainder.

use crate::entities::bet::Bet;
use crate::entities::event::OutcomeName;
use crate::entities::notification::ResultNotification;
use crate::events::{Delivery, DeliveryReceiver};
use crate::ledger::{BetLedger, SettleResolution};
use crate::relay::NotificationRelay;
use crate::storage::{ProcessedDeliveryStore, StoreError};
use gridbook_sdk::objects::notification::MarketResultPayload;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Errors that can occur while processing a delivery.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// The payload did not parse; the delivery is poisonous, not transient.
    #[error("malformed notification payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Some bets could be neither settled nor parked as SettlementFailed;
    /// the delivery stays unacknowledged so redelivery retries them.
    #[error("{unresolved} bet(s) left unresolved in settlement batch")]
    BatchIncomplete { unresolved: usize },
}

/// Compare a bet's frozen snapshot against the published result.
fn resolve_bet(bet: &Bet, winning_outcome: &Option<OutcomeName>) -> SettleResolution {
    match winning_outcome {
        None => SettleResolution::Void,
        Some(winner) if bet.snapshot.outcome == *winner => SettleResolution::Won,
        Some(_) => SettleResolution::Lost,
    }
}

/// SettlementEngine consumes deliveries from the relay and settles bets
/// through the ledger.
pub struct SettlementEngine {
    ledger: Arc<BetLedger>,
    processed: Arc<dyn ProcessedDeliveryStore>,
    relay: Arc<NotificationRelay>,
}

impl SettlementEngine {
    pub fn new(
        ledger: Arc<BetLedger>,
        processed: Arc<dyn ProcessedDeliveryStore>,
        relay: Arc<NotificationRelay>,
    ) -> Self {
        Self {
            ledger,
            processed,
            relay,
        }
    }

    /// Run the SettlementEngine.
    pub async fn run(
        self,
        mut delivery_rx: DeliveryReceiver,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("SettlementEngine started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("SettlementEngine received shutdown signal");
                        break;
                    }
                }

                Some(delivery) = delivery_rx.recv() => {
                    let delivery_id = delivery.delivery_id;
                    if let Err(e) = self.process_delivery(delivery).await {
                        error!(delivery_id, error = %e, "Failed to process delivery");
                    }
                }

                else => {
                    info!("Delivery channel closed");
                    break;
                }
            }
        }

        info!("SettlementEngine shutdown complete");
    }

    async fn process_delivery(&self, delivery: Delivery) -> Result<(), SettlementError> {
        let payload: MarketResultPayload = serde_json::from_str(&delivery.payload)?;
        let notification = ResultNotification {
            event_id: payload.event_id,
            market_id: payload.market_id,
            winning_outcome: payload.winning_outcome,
            delivery_id: delivery.delivery_id,
            attempt: delivery.attempt,
        };

        if self.processed.contains(notification.delivery_id).await? {
            debug!(
                delivery_id = notification.delivery_id,
                attempt = notification.attempt,
                "Duplicate delivery, acknowledging"
            );
            self.relay.ack(notification.delivery_id).await;
            return Ok(());
        }

        let pending = self
            .ledger
            .pending_for_market(notification.market_id)
            .await?;

        let mut settled = 0usize;
        let mut failed = 0usize;
        let mut unresolved = 0usize;
        for bet in &pending {
            let resolution = resolve_bet(bet, &notification.winning_outcome);
            match self.ledger.settle(bet.id, resolution).await {
                Ok(()) => settled += 1,
                Err(settle_error) => {
                    error!(
                        bet_id = %bet.id,
                        error = %settle_error,
                        "Bet settlement failed, isolating"
                    );
                    match self.ledger.mark_settlement_failed(bet.id).await {
                        Ok(()) => failed += 1,
                        Err(mark_error) => {
                            // Still Pending; redelivery will pick it up.
                            unresolved += 1;
                            error!(
                                bet_id = %bet.id,
                                error = %mark_error,
                                "Could not park bet as settlement-failed"
                            );
                        }
                    }
                }
            }
        }

        if unresolved > 0 {
            return Err(SettlementError::BatchIncomplete { unresolved });
        }

        // Every bet is terminal (or parked); now the delivery id may be
        // retired and the relay released.
        self.processed.insert(notification.delivery_id).await?;
        self.relay.ack(notification.delivery_id).await;

        info!(
            delivery_id = notification.delivery_id,
            event_id = notification.event_id,
            market_id = %notification.market_id,
            attempt = notification.attempt,
            settled,
            failed,
            "Settlement batch processed"
        );
        Ok(())
    }
}
