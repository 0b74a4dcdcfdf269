//! The caller-facing betting core.
//!
//! [`GridBook`] assembles the components, spawns the relay and settlement
//! engine as background tasks, and exposes the caller-facing operations as
//! plain function contracts taking and returning `gridbook-sdk` objects.
//! Transport (HTTP/RPC) is an embedding server's concern.

use crate::catalog::{CatalogError, CatalogReader, EventCatalog, MarketOutcome};
use crate::config::CoreConfig;
use crate::entities::bet::{Bet, UserId};
use crate::entities::event::{Event, EventId, MarketId};
use crate::events::{delivery_channel, result_published_channel};
use crate::ledger::{BetLedger, PlaceBetError};
use crate::pricing::breaker::CircuitBreaker;
use crate::pricing::{OddsQuote, PricingCache, PricingError};
use crate::relay::NotificationRelay;
use crate::settlement::SettlementEngine;
use crate::storage::memory::{
    MemoryAccountStore, MemoryBetStore, MemoryEventStore, MemoryProcessedDeliveryStore,
};
use crate::storage::{AccountStore, BetStore, EventStore, ProcessedDeliveryStore, StoreError};
use gridbook_sdk::objects::events::{EventFilter, EventSummary, MarketSummary};
use gridbook_sdk::objects::odds::{OddsQuoteResponse, OutcomePrice};
use gridbook_sdk::objects::place_bet::{BetResponse, PlaceBetRequest};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

/// The storage backends the core runs on.
///
/// An embedding server supplies durable implementations; `in_memory` is
/// the reference wiring used by tests and local runs.
pub struct Stores {
    pub bets: Arc<dyn BetStore>,
    pub events: Arc<dyn EventStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub processed: Arc<dyn ProcessedDeliveryStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            bets: Arc::new(MemoryBetStore::default()),
            events: Arc::new(MemoryEventStore::default()),
            accounts: Arc::new(MemoryAccountStore::default()),
            processed: Arc::new(MemoryProcessedDeliveryStore::default()),
        }
    }
}

/// The assembled betting core.
pub struct GridBook {
    catalog: Arc<EventCatalog>,
    pricing: Arc<PricingCache>,
    ledger: Arc<BetLedger>,
    accounts: Arc<dyn AccountStore>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl GridBook {
    /// Wire the components and spawn the background processors. Must be
    /// called from within a tokio runtime.
    pub fn start(config: CoreConfig, stores: Stores) -> Self {
        let (result_tx, result_rx) = result_published_channel();
        let (delivery_tx, delivery_rx) = delivery_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let catalog = Arc::new(EventCatalog::new(stores.events, result_tx));
        let pricing = Arc::new(PricingCache::new(
            catalog.clone() as Arc<dyn CatalogReader>,
            config.pricing.clone(),
            CircuitBreaker::new(config.breaker.clone()),
        ));
        let ledger = Arc::new(BetLedger::new(
            stores.bets,
            stores.accounts.clone(),
            catalog.clone() as Arc<dyn CatalogReader>,
            pricing.clone(),
            config.pricing.catalog_timeout,
        ));
        let relay = NotificationRelay::new(config.relay.clone(), delivery_tx);
        let engine = SettlementEngine::new(ledger.clone(), stores.processed, relay.clone());

        let tasks = vec![
            tokio::spawn(relay.run(result_rx, shutdown_rx.clone())),
            tokio::spawn(engine.run(delivery_rx, shutdown_rx)),
        ];
        info!("GridBook core started");

        Self {
            catalog,
            pricing,
            ledger,
            accounts: stores.accounts,
            shutdown_tx,
            tasks,
        }
    }

    /// Place a bet against the current odds snapshot.
    pub async fn place_bet(&self, request: PlaceBetRequest) -> Result<BetResponse, PlaceBetError> {
        let bet = self
            .ledger
            .place_bet(
                request.user_id,
                request.market_id,
                request.outcome.as_str(),
                request.stake,
            )
            .await?;
        Ok(bet_response(&bet))
    }

    /// Current state of a bet, terminal or not.
    pub async fn bet_status(&self, bet_id: Uuid) -> Result<Option<BetResponse>, StoreError> {
        Ok(self.ledger.bet(bet_id).await?.as_ref().map(bet_response))
    }

    /// Current odds for a market, cached with bounded staleness.
    pub async fn current_odds(
        &self,
        market_id: MarketId,
    ) -> Result<OddsQuoteResponse, PricingError> {
        let quote = self.pricing.quote(market_id).await?;
        Ok(quote_response(&quote))
    }

    /// Publish an event's final result and immediately drop any cached
    /// odds for its markets, so nothing is priced from a pre-publication
    /// value afterwards.
    pub async fn publish_result(
        &self,
        event_id: EventId,
        outcomes: Vec<MarketOutcome>,
    ) -> Result<(), CatalogError> {
        let affected = self.catalog.publish_result(event_id, outcomes).await?;
        self.pricing.invalidate_markets(&affected).await;
        Ok(())
    }

    /// Close an event's markets for betting.
    pub async fn mark_completed(&self, event_id: EventId) -> Result<(), CatalogError> {
        self.catalog.mark_completed(event_id).await
    }

    /// Seed an event into the catalog (idempotent).
    pub async fn add_event(&self, event: Event) -> Result<bool, CatalogError> {
        self.catalog.insert_event(event).await
    }

    pub async fn list_events(
        &self,
        filter: &EventFilter,
        page: usize,
        size: usize,
    ) -> Result<Vec<EventSummary>, CatalogError> {
        let events = self.catalog.list_events(filter, page, size).await?;
        Ok(events.iter().map(event_summary).collect())
    }

    /// Fund a user's play-money balance.
    pub async fn deposit(&self, user_id: UserId, amount: Decimal) -> Result<(), StoreError> {
        self.accounts.credit(user_id, amount).await
    }

    pub async fn balance(&self, user_id: UserId) -> Result<Option<Decimal>, StoreError> {
        Ok(self.accounts.get(user_id).await?.map(|a| a.balance))
    }

    /// Signal the background processors and wait for them to drain.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        info!("GridBook core stopped");
    }
}

fn bet_response(bet: &Bet) -> BetResponse {
    BetResponse {
        bet_id: bet.id,
        user_id: bet.user_id,
        market_id: bet.market_id,
        outcome: bet.outcome.clone(),
        stake: bet.stake,
        price: bet.snapshot.price,
        price_stale: bet.snapshot.stale,
        status: bet.state.into(),
        created_at: bet.created_at.unix_timestamp(),
        settled_at: bet.settled_at.map(|t| t.unix_timestamp()),
    }
}

fn quote_response(quote: &OddsQuote) -> OddsQuoteResponse {
    OddsQuoteResponse {
        market_id: quote.market_id,
        prices: quote
            .odds
            .iter()
            .map(|(outcome, price)| OutcomePrice {
                outcome: outcome.clone(),
                price: *price,
            })
            .collect(),
        generation: quote.generation,
        stale: quote.stale,
        fetched_at: quote.fetched_at.unix_timestamp(),
    }
}

fn event_summary(event: &Event) -> EventSummary {
    EventSummary {
        event_id: event.id,
        name: event.name.clone(),
        country: event.country.clone(),
        year: event.year,
        status: event.status.into(),
        scheduled_at: event.scheduled_at.unix_timestamp(),
        markets: event
            .markets
            .iter()
            .map(|m| MarketSummary {
                market_id: m.id,
                kind: m.kind.into(),
                outcomes: m.outcomes.clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{market_with_odds, scheduled_event, winner_market};
    use gridbook_sdk::objects::BetStatus;
    use std::time::Duration;

    async fn wait_for_status(
        book: &GridBook,
        bet_id: Uuid,
        wanted: BetStatus,
    ) -> Option<BetResponse> {
        for _ in 0..100 {
            if let Some(response) = book.bet_status(bet_id).await.unwrap() {
                if response.status == wanted {
                    return Some(response);
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        None
    }

    #[tokio::test(start_paused = true)]
    async fn placed_bet_settles_to_won_with_the_frozen_price() {
        crate::testutil::init_tracing();
        let book = GridBook::start(CoreConfig::default(), Stores::in_memory());

        let market = market_with_odds(
            1,
            &[("A", Decimal::new(25, 1)), ("B", Decimal::new(30, 1))],
        );
        let market_id = market.id;
        book.add_event(scheduled_event(1, vec![market])).await.unwrap();

        let user = Uuid::new_v4();
        book.deposit(user, Decimal::new(100, 0)).await.unwrap();

        let placed = book
            .place_bet(PlaceBetRequest {
                user_id: user,
                market_id,
                outcome: "A".into(),
                stake: Decimal::new(10, 0),
            })
            .await
            .unwrap();
        assert_eq!(placed.status, BetStatus::Pending);
        assert_eq!(placed.price, Decimal::new(25, 1));

        book.publish_result(
            1,
            vec![MarketOutcome {
                market_id,
                winning_outcome: Some("A".into()),
            }],
        )
        .await
        .unwrap();

        let settled = wait_for_status(&book, placed.bet_id, BetStatus::Won)
            .await
            .unwrap();
        // Payout-relevant fields are exactly the snapshot's.
        assert_eq!(settled.stake, Decimal::new(10, 0));
        assert_eq!(settled.price, Decimal::new(25, 1));
        assert!(settled.settled_at.is_some());

        // 100 - 10 stake + 10 * 2.5 payout.
        assert_eq!(
            book.balance(user).await.unwrap(),
            Some(Decimal::new(115, 0))
        );

        book.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn betting_on_a_completed_event_is_rejected() {
        let book = GridBook::start(CoreConfig::default(), Stores::in_memory());

        let market = winner_market(2, &["VER", "HAM"]);
        let market_id = market.id;
        book.add_event(scheduled_event(2, vec![market])).await.unwrap();
        book.mark_completed(2).await.unwrap();

        let user = Uuid::new_v4();
        book.deposit(user, Decimal::new(50, 0)).await.unwrap();

        let result = book
            .place_bet(PlaceBetRequest {
                user_id: user,
                market_id,
                outcome: "VER".into(),
                stake: Decimal::new(5, 0),
            })
            .await;
        assert!(matches!(result, Err(PlaceBetError::MarketClosed(_))));

        book.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn placement_against_a_published_market_is_rejected() {
        let book = GridBook::start(CoreConfig::default(), Stores::in_memory());

        let market = winner_market(3, &["VER", "HAM"]);
        let market_id = market.id;
        book.add_event(scheduled_event(3, vec![market])).await.unwrap();

        // Warm the odds cache before publication.
        book.current_odds(market_id).await.unwrap();

        book.publish_result(
            3,
            vec![MarketOutcome {
                market_id,
                winning_outcome: Some("VER".into()),
            }],
        )
        .await
        .unwrap();

        let user = Uuid::new_v4();
        book.deposit(user, Decimal::new(50, 0)).await.unwrap();
        let result = book
            .place_bet(PlaceBetRequest {
                user_id: user,
                market_id,
                outcome: "VER".into(),
                stake: Decimal::new(5, 0),
            })
            .await;
        // The authoritative check wins even though the cache was warm.
        assert!(matches!(result, Err(PlaceBetError::MarketClosed(_))));

        book.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_bet_is_none() {
        let book = GridBook::start(CoreConfig::default(), Stores::in_memory());
        assert!(book.bet_status(Uuid::now_v7()).await.unwrap().is_none());
        book.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn listed_events_carry_their_markets() {
        let book = GridBook::start(CoreConfig::default(), Stores::in_memory());
        book.add_event(scheduled_event(1, vec![winner_market(1, &["VER", "HAM"])]))
            .await
            .unwrap();
        book.add_event(scheduled_event(2, vec![winner_market(2, &["VER"])]))
            .await
            .unwrap();

        let listed = book
            .list_events(&EventFilter::default(), 0, 10)
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].markets[0].outcomes.len(), 2);

        book.shutdown().await;
    }
}
