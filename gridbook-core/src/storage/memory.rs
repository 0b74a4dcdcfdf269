//! In-memory reference implementation of the storage interfaces.
//!
//! Each store keeps its records in a single map behind a `tokio::sync::Mutex`;
//! holding the map lock for the whole read-modify-write gives the per-key
//! atomicity the traits demand. No lock is held across an await into another
//! component.

use crate::entities::account::UserAccount;
use crate::entities::bet::{Bet, BetId, UserId};
use crate::entities::event::{Event, EventId, MarketId};
use crate::entities::notification::DeliveryId;
use crate::entities::{BetState, EventStatus};
use crate::storage::{
    AccountStore, BetStore, DebitOutcome, EventStore, ProcessedDeliveryStore, StatusChange,
    StoreError, TransitionOutcome,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::Mutex;

#[derive(Default)]
pub struct MemoryBetStore {
    bets: Mutex<HashMap<BetId, Bet>>,
}

#[async_trait]
impl BetStore for MemoryBetStore {
    async fn insert(&self, bet: Bet) -> Result<(), StoreError> {
        self.bets.lock().await.insert(bet.id, bet);
        Ok(())
    }

    async fn get(&self, id: BetId) -> Result<Option<Bet>, StoreError> {
        Ok(self.bets.lock().await.get(&id).cloned())
    }

    async fn pending_for_market(&self, market_id: MarketId) -> Result<Vec<Bet>, StoreError> {
        let bets = self.bets.lock().await;
        let mut pending: Vec<Bet> = bets
            .values()
            .filter(|b| b.market_id == market_id && b.state == BetState::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|b| b.id);
        Ok(pending)
    }

    async fn transition(
        &self,
        id: BetId,
        to: BetState,
        settled_at: time::OffsetDateTime,
    ) -> Result<TransitionOutcome, StoreError> {
        let mut bets = self.bets.lock().await;
        let Some(bet) = bets.get_mut(&id) else {
            return Ok(TransitionOutcome::NotFound);
        };
        if bet.state.is_terminal() {
            return Ok(TransitionOutcome::AlreadyTerminal(bet.state));
        }
        bet.state = to;
        bet.settled_at = Some(settled_at);
        Ok(TransitionOutcome::Applied(bet.clone()))
    }
}

#[derive(Default)]
pub struct MemoryEventStore {
    events: Mutex<BTreeMap<EventId, Event>>,
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn get(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        Ok(self.events.lock().await.get(&id).cloned())
    }

    async fn by_market(&self, market_id: MarketId) -> Result<Option<Event>, StoreError> {
        let events = self.events.lock().await;
        Ok(events
            .values()
            .find(|e| e.markets.iter().any(|m| m.id == market_id))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Event>, StoreError> {
        Ok(self.events.lock().await.values().cloned().collect())
    }

    async fn insert_if_absent(&self, event: Event) -> Result<bool, StoreError> {
        let mut events = self.events.lock().await;
        if events.contains_key(&event.id) {
            return Ok(false);
        }
        events.insert(event.id, event);
        Ok(true)
    }

    async fn set_status_if(
        &self,
        id: EventId,
        allowed_from: &[EventStatus],
        to: EventStatus,
    ) -> Result<StatusChange, StoreError> {
        let mut events = self.events.lock().await;
        let Some(event) = events.get_mut(&id) else {
            return Ok(StatusChange::NotFound);
        };
        if !allowed_from.contains(&event.status) {
            return Ok(StatusChange::Refused(event.status));
        }
        event.status = to;
        Ok(StatusChange::Applied(event.clone()))
    }
}

#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<HashMap<UserId, rust_decimal::Decimal>>,
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn get(&self, user_id: UserId) -> Result<Option<UserAccount>, StoreError> {
        Ok(self
            .accounts
            .lock()
            .await
            .get(&user_id)
            .map(|balance| UserAccount {
                user_id,
                balance: *balance,
            }))
    }

    async fn try_debit(
        &self,
        user_id: UserId,
        amount: rust_decimal::Decimal,
    ) -> Result<DebitOutcome, StoreError> {
        let mut accounts = self.accounts.lock().await;
        let Some(balance) = accounts.get_mut(&user_id) else {
            return Ok(DebitOutcome::NoAccount);
        };
        if *balance < amount {
            return Ok(DebitOutcome::Insufficient);
        }
        *balance -= amount;
        Ok(DebitOutcome::Applied)
    }

    async fn credit(
        &self,
        user_id: UserId,
        amount: rust_decimal::Decimal,
    ) -> Result<(), StoreError> {
        let mut accounts = self.accounts.lock().await;
        *accounts.entry(user_id).or_default() += amount;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryProcessedDeliveryStore {
    processed: Mutex<HashSet<DeliveryId>>,
}

#[async_trait]
impl ProcessedDeliveryStore for MemoryProcessedDeliveryStore {
    async fn insert(&self, id: DeliveryId) -> Result<bool, StoreError> {
        Ok(self.processed.lock().await.insert(id))
    }

    async fn contains(&self, id: DeliveryId) -> Result<bool, StoreError> {
        Ok(self.processed.lock().await.contains(&id))
    }
}
