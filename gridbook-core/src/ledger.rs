//! Bet Ledger.
//!
//! Durable, append-oriented record of bets. Owns bet creation and the one
//! authoritative odds snapshot per bet; the market-closed check goes to the
//! authoritative catalog, never the cache — correctness over latency.
//! Moving a bet out of Pending is the Settlement Engine's privilege, which
//! is why `settle` and `mark_settlement_failed` are crate-visible only.

use crate::catalog::{CatalogError, CatalogReader};
use crate::entities::BetState;
use crate::entities::bet::{Bet, BetId, BetInsert, OddsSnapshot, UserId};
use crate::entities::event::{MarketId, OutcomeName, price_for};
use crate::pricing::{PricingCache, PricingError};
use crate::storage::{AccountStore, BetStore, DebitOutcome, StoreError, TransitionOutcome};
use crate::utils::payout::credit_for;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Errors surfaced by [`BetLedger::place_bet`].
#[derive(Debug, Error)]
pub enum PlaceBetError {
    #[error("market not found: {0}")]
    MarketNotFound(MarketId),

    /// The market's event is Completed or ResultPublished.
    #[error("market {0} is closed for betting")]
    MarketClosed(MarketId),

    #[error("outcome {outcome} does not belong to market {market_id}")]
    InvalidOutcome {
        market_id: MarketId,
        outcome: OutcomeName,
    },

    #[error("stake must be positive")]
    NonPositiveStake,

    #[error("insufficient funds")]
    InsufficientFunds,

    /// The pricing cache could produce no odds at all, fresh or stale.
    #[error("no odds available for market {0}")]
    PricingUnavailable(MarketId),

    /// The authoritative market-closed check could not be made.
    #[error("catalog unavailable")]
    CatalogUnavailable,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How the Settlement Engine resolved a bet against the published result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleResolution {
    Won,
    Lost,
    Void,
}

impl SettleResolution {
    pub fn terminal_state(self) -> BetState {
        match self {
            SettleResolution::Won => BetState::Won,
            SettleResolution::Lost => BetState::Lost,
            SettleResolution::Void => BetState::Void,
        }
    }
}

pub struct BetLedger {
    bets: Arc<dyn BetStore>,
    accounts: Arc<dyn AccountStore>,
    catalog: Arc<dyn CatalogReader>,
    pricing: Arc<PricingCache>,
    catalog_timeout: Duration,
}

impl BetLedger {
    pub fn new(
        bets: Arc<dyn BetStore>,
        accounts: Arc<dyn AccountStore>,
        catalog: Arc<dyn CatalogReader>,
        pricing: Arc<PricingCache>,
        catalog_timeout: Duration,
    ) -> Self {
        Self {
            bets,
            accounts,
            catalog,
            pricing,
            catalog_timeout,
        }
    }

    /// Place a bet: validate against the authoritative catalog, capture an
    /// odds snapshot from the cache, debit the stake, persist a Pending
    /// bet. Each call captures its own snapshot; concurrent placements on
    /// the same market share nothing mutable.
    pub async fn place_bet(
        &self,
        user_id: UserId,
        market_id: MarketId,
        outcome: &str,
        stake: Decimal,
    ) -> Result<Bet, PlaceBetError> {
        if stake <= Decimal::ZERO {
            return Err(PlaceBetError::NonPositiveStake);
        }

        let event = tokio::time::timeout(
            self.catalog_timeout,
            self.catalog.event_for_market(market_id),
        )
        .await
        .map_err(|_| PlaceBetError::CatalogUnavailable)?
        .map_err(|error| match error {
            CatalogError::MarketNotFound(_) | CatalogError::EventNotFound(_) => {
                PlaceBetError::MarketNotFound(market_id)
            }
            other => {
                warn!(market_id = %market_id, error = %other, "Authoritative event check failed");
                PlaceBetError::CatalogUnavailable
            }
        })?;

        if !event.open_for_betting() {
            return Err(PlaceBetError::MarketClosed(market_id));
        }
        let market = event
            .market(market_id)
            .ok_or(PlaceBetError::MarketNotFound(market_id))?;
        if !market.has_outcome(outcome) {
            return Err(PlaceBetError::InvalidOutcome {
                market_id,
                outcome: outcome.into(),
            });
        }

        let quote = self.pricing.quote(market_id).await.map_err(|e| match e {
            PricingError::MarketNotFound(id) => PlaceBetError::MarketNotFound(id),
            PricingError::CatalogUnavailable(id) => PlaceBetError::PricingUnavailable(id),
        })?;
        let price =
            price_for(&quote.odds, outcome).ok_or(PlaceBetError::PricingUnavailable(market_id))?;

        match self.accounts.try_debit(user_id, stake).await? {
            DebitOutcome::Applied => {}
            DebitOutcome::Insufficient | DebitOutcome::NoAccount => {
                return Err(PlaceBetError::InsufficientFunds);
            }
        }

        let now = time::OffsetDateTime::now_utc();
        let bet = BetInsert {
            id: Uuid::now_v7(),
            user_id,
            market_id,
            outcome: outcome.into(),
            stake,
            snapshot: OddsSnapshot {
                market_id,
                outcome: outcome.into(),
                price,
                taken_at: now,
                generation: quote.generation,
                stale: quote.stale,
            },
        }
        .into_pending(now);

        if let Err(insert_error) = self.bets.insert(bet.clone()).await {
            // The stake was already taken; put it back before surfacing.
            if let Err(refund_error) = self.accounts.credit(user_id, stake).await {
                error!(
                    user_id = %user_id,
                    stake = %stake,
                    error = %refund_error,
                    "Failed to refund stake after bet insert failure"
                );
            }
            return Err(insert_error.into());
        }

        info!(
            bet_id = %bet.id,
            user_id = %user_id,
            market_id = %market_id,
            outcome = %bet.outcome,
            price = %price,
            stale = quote.stale,
            "Bet placed"
        );
        Ok(bet)
    }

    pub async fn bet(&self, id: BetId) -> Result<Option<Bet>, StoreError> {
        self.bets.get(id).await
    }

    /// All bets still Pending for a market, for settlement batches.
    pub(crate) async fn pending_for_market(
        &self,
        market_id: MarketId,
    ) -> Result<Vec<Bet>, StoreError> {
        self.bets.pending_for_market(market_id).await
    }

    /// Resolve a Pending bet. A no-op (not an error) when the bet is
    /// already terminal, so duplicate settlement attempts are harmless.
    /// Won pays out and Void refunds through the account store.
    pub(crate) async fn settle(
        &self,
        bet_id: BetId,
        resolution: SettleResolution,
    ) -> Result<(), StoreError> {
        let now = time::OffsetDateTime::now_utc();
        match self
            .bets
            .transition(bet_id, resolution.terminal_state(), now)
            .await?
        {
            TransitionOutcome::Applied(bet) => {
                let credit = credit_for(&bet, resolution);
                if credit > Decimal::ZERO {
                    self.accounts.credit(bet.user_id, credit).await?;
                }
                info!(
                    bet_id = %bet_id,
                    state = ?bet.state,
                    credit = %credit,
                    "Bet settled"
                );
                Ok(())
            }
            TransitionOutcome::AlreadyTerminal(state) => {
                debug!(bet_id = %bet_id, state = ?state, "Settle no-op, bet already terminal");
                Ok(())
            }
            TransitionOutcome::NotFound => {
                warn!(bet_id = %bet_id, "Settle requested for unknown bet");
                Ok(())
            }
        }
    }

    /// Park a bet in SettlementFailed after a persistence failure, leaving
    /// it queryable for external remediation instead of stuck Pending.
    pub(crate) async fn mark_settlement_failed(&self, bet_id: BetId) -> Result<(), StoreError> {
        let now = time::OffsetDateTime::now_utc();
        match self
            .bets
            .transition(bet_id, BetState::SettlementFailed, now)
            .await?
        {
            TransitionOutcome::Applied(_) => {
                warn!(bet_id = %bet_id, "Bet marked settlement-failed");
                Ok(())
            }
            TransitionOutcome::AlreadyTerminal(_) | TransitionOutcome::NotFound => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BreakerConfig, PricingConfig};
    use crate::pricing::breaker::CircuitBreaker;
    use crate::storage::memory::{MemoryAccountStore, MemoryBetStore};
    use crate::testutil::{MockCatalog, quoted_price, scheduled_event, winner_market};
    use crate::entities::EventStatus;

    struct Fixture {
        ledger: BetLedger,
        catalog: Arc<MockCatalog>,
        accounts: Arc<MemoryAccountStore>,
        market_id: MarketId,
        user: UserId,
    }

    async fn fixture() -> Fixture {
        let market = winner_market(1, &["VER", "HAM", "LEC"]);
        let market_id = market.id;
        let catalog = Arc::new(MockCatalog::default());
        catalog.put_event(scheduled_event(1, vec![market])).await;

        let pricing = Arc::new(PricingCache::new(
            catalog.clone(),
            PricingConfig::default(),
            CircuitBreaker::new(BreakerConfig::default()),
        ));
        let accounts = Arc::new(MemoryAccountStore::default());
        let user = Uuid::new_v4();
        accounts.credit(user, Decimal::new(100, 0)).await.unwrap();

        let ledger = BetLedger::new(
            Arc::new(MemoryBetStore::default()),
            accounts.clone(),
            catalog.clone(),
            pricing,
            Duration::from_secs(1),
        );
        Fixture {
            ledger,
            catalog,
            accounts,
            market_id,
            user,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn placement_captures_a_valid_snapshot_and_debits_the_stake() {
        let f = fixture().await;
        let bet = f
            .ledger
            .place_bet(f.user, f.market_id, "HAM", Decimal::new(10, 0))
            .await
            .unwrap();

        assert_eq!(bet.state, BetState::Pending);
        assert_eq!(bet.snapshot.outcome, "HAM");
        assert!(!bet.snapshot.stale);
        let market = f.catalog.event(1).await.unwrap().markets[0].clone();
        assert!(market.has_outcome(bet.snapshot.outcome.as_str()));
        assert_eq!(bet.snapshot.price, quoted_price(&market, "HAM"));

        let balance = f.accounts.get(f.user).await.unwrap().unwrap().balance;
        assert_eq!(balance, Decimal::new(90, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn completed_event_closes_the_market() {
        let f = fixture().await;
        f.catalog.set_event_status(1, EventStatus::Completed).await;

        let result = f
            .ledger
            .place_bet(f.user, f.market_id, "VER", Decimal::new(5, 0))
            .await;
        assert!(matches!(result, Err(PlaceBetError::MarketClosed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_outcome_is_rejected() {
        let f = fixture().await;
        let result = f
            .ledger
            .place_bet(f.user, f.market_id, "ALO", Decimal::new(5, 0))
            .await;
        assert!(matches!(result, Err(PlaceBetError::InvalidOutcome { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn short_balance_rejects_the_bet() {
        let f = fixture().await;
        let result = f
            .ledger
            .place_bet(f.user, f.market_id, "VER", Decimal::new(500, 0))
            .await;
        assert!(matches!(result, Err(PlaceBetError::InsufficientFunds)));

        // Nothing was recorded and nothing was taken.
        let balance = f.accounts.get(f.user).await.unwrap().unwrap().balance;
        assert_eq!(balance, Decimal::new(100, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn non_positive_stake_is_rejected() {
        let f = fixture().await;
        let result = f
            .ledger
            .place_bet(f.user, f.market_id, "VER", Decimal::ZERO)
            .await;
        assert!(matches!(result, Err(PlaceBetError::NonPositiveStake)));
    }

    #[tokio::test(start_paused = true)]
    async fn dead_catalog_with_cold_cache_means_pricing_unavailable() {
        let f = fixture().await;
        f.catalog.set_fail(true);

        let result = f
            .ledger
            .place_bet(f.user, f.market_id, "VER", Decimal::new(5, 0))
            .await;
        assert!(matches!(result, Err(PlaceBetError::PricingUnavailable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_quote_is_recorded_on_the_snapshot() {
        let f = fixture().await;
        // Warm the cache, then expire it with the catalog down.
        f.ledger
            .place_bet(f.user, f.market_id, "VER", Decimal::new(5, 0))
            .await
            .unwrap();
        tokio::time::advance(PricingConfig::default().entry_ttl + Duration::from_secs(1)).await;
        f.catalog.set_fail(true);

        let bet = f
            .ledger
            .place_bet(f.user, f.market_id, "HAM", Decimal::new(5, 0))
            .await
            .unwrap();
        assert!(bet.snapshot.stale);
        assert_eq!(bet.state, BetState::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_placements_capture_independent_snapshots() {
        let f = fixture().await;
        f.catalog.set_delay(Some(Duration::from_millis(20))).await;
        let ledger = Arc::new(f.ledger);

        let a = tokio::spawn({
            let ledger = ledger.clone();
            let market_id = f.market_id;
            let user = f.user;
            async move {
                ledger
                    .place_bet(user, market_id, "VER", Decimal::new(5, 0))
                    .await
            }
        });
        let b = tokio::spawn({
            let ledger = ledger.clone();
            let market_id = f.market_id;
            let user = f.user;
            async move {
                ledger
                    .place_bet(user, market_id, "LEC", Decimal::new(7, 0))
                    .await
            }
        });

        let bet_a = a.await.unwrap().unwrap();
        let bet_b = b.await.unwrap().unwrap();

        // One coalesced refresh served both placements, but each bet froze
        // its own snapshot for its own outcome.
        assert_eq!(f.catalog.odds_calls(), 1);
        assert_ne!(bet_a.id, bet_b.id);
        assert_eq!(bet_a.snapshot.outcome, "VER");
        assert_eq!(bet_b.snapshot.outcome, "LEC");
        assert_ne!(bet_a.snapshot.price, bet_b.snapshot.price);
    }
}
