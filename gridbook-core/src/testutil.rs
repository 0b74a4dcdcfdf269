//! Shared fixtures for in-crate tests.

use crate::catalog::{CatalogError, CatalogReader};
use crate::entities::bet::{Bet, BetId};
use crate::entities::event::{Event, EventId, Market, MarketId, OddsTable, price_for};
use crate::entities::{BetState, EventStatus, MarketKind};
use crate::storage::memory::MemoryBetStore;
use crate::storage::{BetStore, StoreError, TransitionOutcome};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// A winner market whose outcomes are priced 2, 3, 4, 2, ... (the
/// historical catalog's odds universe).
pub fn winner_market(event_id: EventId, outcomes: &[&str]) -> Market {
    let prices: Vec<(&str, Decimal)> = outcomes
        .iter()
        .enumerate()
        .map(|(i, name)| (*name, Decimal::from(2 + (i as i64 % 3))))
        .collect();
    market_with_odds(event_id, &prices)
}

pub fn market_with_odds(event_id: EventId, prices: &[(&str, Decimal)]) -> Market {
    Market {
        id: Uuid::new_v4(),
        event_id,
        kind: MarketKind::Winner,
        outcomes: prices.iter().map(|(name, _)| (*name).into()).collect(),
        odds: prices
            .iter()
            .map(|(name, price)| ((*name).into(), *price))
            .collect(),
    }
}

pub fn scheduled_event(id: EventId, markets: Vec<Market>) -> Event {
    Event {
        id,
        name: "Grand Prix".into(),
        country: "Italy".into(),
        year: 2021,
        status: EventStatus::Scheduled,
        scheduled_at: time::OffsetDateTime::UNIX_EPOCH,
        occurred_at: None,
        markets,
    }
}

/// A scripted catalog for exercising the cache and ledger: counts odds
/// reads, and can be told to fail or to stall.
#[derive(Default)]
pub struct MockCatalog {
    events: Mutex<HashMap<EventId, Event>>,
    odds_calls: AtomicUsize,
    fail_odds: AtomicBool,
    odds_delay: Mutex<Option<Duration>>,
}

impl MockCatalog {
    pub async fn put_event(&self, event: Event) {
        self.events.lock().await.insert(event.id, event);
    }

    pub fn odds_calls(&self) -> usize {
        self.odds_calls.load(Ordering::SeqCst)
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail_odds.store(fail, Ordering::SeqCst);
    }

    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.odds_delay.lock().await = delay;
    }

    pub async fn set_event_status(&self, id: EventId, status: EventStatus) {
        if let Some(event) = self.events.lock().await.get_mut(&id) {
            event.status = status;
        }
    }

    pub async fn set_price(&self, market_id: MarketId, outcome: &str, price: Decimal) {
        let mut events = self.events.lock().await;
        for event in events.values_mut() {
            for market in &mut event.markets {
                if market.id == market_id {
                    for entry in &mut market.odds {
                        if entry.0 == outcome {
                            entry.1 = price;
                        }
                    }
                }
            }
        }
    }
}

#[async_trait]
impl CatalogReader for MockCatalog {
    async fn event(&self, id: EventId) -> Result<Event, CatalogError> {
        self.events
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(CatalogError::EventNotFound(id))
    }

    async fn event_for_market(&self, market_id: MarketId) -> Result<Event, CatalogError> {
        self.events
            .lock()
            .await
            .values()
            .find(|e| e.markets.iter().any(|m| m.id == market_id))
            .cloned()
            .ok_or(CatalogError::MarketNotFound(market_id))
    }

    async fn market_odds(&self, market_id: MarketId) -> Result<OddsTable, CatalogError> {
        self.odds_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.odds_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_odds.load(Ordering::SeqCst) {
            return Err(CatalogError::Store(StoreError::Unavailable(
                "injected failure".into(),
            )));
        }
        let event = self.event_for_market(market_id).await?;
        let market = event
            .market(market_id)
            .ok_or(CatalogError::MarketNotFound(market_id))?;
        Ok(market.odds.clone())
    }
}

/// Sanity helper: the price a mock market quotes for an outcome.
pub fn quoted_price(market: &Market, outcome: &str) -> Decimal {
    price_for(&market.odds, outcome).unwrap_or(Decimal::ZERO)
}

/// A bet store whose `transition` fails a configured number of times per
/// bet, for partial-failure isolation tests.
#[derive(Default)]
pub struct FlakyBetStore {
    pub inner: MemoryBetStore,
    fail_budget: Mutex<HashMap<BetId, u32>>,
}

impl FlakyBetStore {
    /// Make the next `times` transitions of this bet fail.
    pub async fn fail_transitions(&self, id: BetId, times: u32) {
        self.fail_budget.lock().await.insert(id, times);
    }
}

#[async_trait]
impl BetStore for FlakyBetStore {
    async fn insert(&self, bet: Bet) -> Result<(), StoreError> {
        self.inner.insert(bet).await
    }

    async fn get(&self, id: BetId) -> Result<Option<Bet>, StoreError> {
        self.inner.get(id).await
    }

    async fn pending_for_market(&self, market_id: MarketId) -> Result<Vec<Bet>, StoreError> {
        self.inner.pending_for_market(market_id).await
    }

    async fn transition(
        &self,
        id: BetId,
        to: BetState,
        settled_at: time::OffsetDateTime,
    ) -> Result<TransitionOutcome, StoreError> {
        {
            let mut budget = self.fail_budget.lock().await;
            if let Some(remaining) = budget.get_mut(&id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(StoreError::Unavailable("injected write failure".into()));
                }
            }
        }
        self.inner.transition(id, to, settled_at).await
    }
}

/// Opt-in log output while debugging tests:
/// `RUST_LOG=debug cargo test -- --nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
