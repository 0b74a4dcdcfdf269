//! Durable storage interfaces.
//!
//! Persistence technology is an external collaborator; the core consumes
//! these traits only. Every mutation is a per-key atomic read-modify-write:
//! an implementation must apply the whole conditional update or none of it.
//! `memory` provides the reference implementation used by tests and
//! defaults.

pub mod memory;

use crate::entities::account::UserAccount;
use crate::entities::bet::{Bet, BetId, UserId};
use crate::entities::event::{Event, EventId, MarketId};
use crate::entities::notification::DeliveryId;
use crate::entities::{BetState, EventStatus};
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by storage implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not serve the request (connection lost, write
    /// rejected, ...). Transient from the caller's point of view.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a conditional bet state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The transition was applied; the updated record is returned.
    Applied(Bet),
    /// The bet was already in a terminal state; nothing was written.
    AlreadyTerminal(BetState),
    NotFound,
}

/// Outcome of a conditional event status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    /// The change was applied; the updated record is returned.
    Applied(Event),
    /// The event was not in an allowed source status; nothing was written.
    Refused(EventStatus),
    NotFound,
}

/// Outcome of a conditional balance debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    Applied,
    Insufficient,
    NoAccount,
}

/// Append-oriented bet records.
#[async_trait]
pub trait BetStore: Send + Sync {
    /// Insert a new bet record. Ids are assigned by the caller.
    async fn insert(&self, bet: Bet) -> Result<(), StoreError>;

    async fn get(&self, id: BetId) -> Result<Option<Bet>, StoreError>;

    /// All bets still Pending for the given market.
    async fn pending_for_market(&self, market_id: MarketId) -> Result<Vec<Bet>, StoreError>;

    /// Atomically move a bet out of Pending. Refuses (without writing) if
    /// the bet is already terminal, which is what makes duplicate
    /// settlement attempts no-ops.
    async fn transition(
        &self,
        id: BetId,
        to: BetState,
        settled_at: time::OffsetDateTime,
    ) -> Result<TransitionOutcome, StoreError>;
}

/// Event and market records.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn get(&self, id: EventId) -> Result<Option<Event>, StoreError>;

    /// The event owning the given market, if any.
    async fn by_market(&self, market_id: MarketId) -> Result<Option<Event>, StoreError>;

    /// All events, ordered by id.
    async fn list(&self) -> Result<Vec<Event>, StoreError>;

    /// Insert the event unless one with the same id exists. Returns whether
    /// the insert happened.
    async fn insert_if_absent(&self, event: Event) -> Result<bool, StoreError>;

    /// Atomically change an event's status, provided its current status is
    /// in `allowed_from`.
    async fn set_status_if(
        &self,
        id: EventId,
        allowed_from: &[EventStatus],
        to: EventStatus,
    ) -> Result<StatusChange, StoreError>;
}

/// Play-money balances.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, user_id: UserId) -> Result<Option<UserAccount>, StoreError>;

    /// Atomically debit `amount` if the balance covers it.
    async fn try_debit(
        &self,
        user_id: UserId,
        amount: rust_decimal::Decimal,
    ) -> Result<DebitOutcome, StoreError>;

    /// Credit `amount`, creating the account if it does not exist.
    async fn credit(
        &self,
        user_id: UserId,
        amount: rust_decimal::Decimal,
    ) -> Result<(), StoreError>;
}

/// Durable processed-set for settlement idempotency.
#[async_trait]
pub trait ProcessedDeliveryStore: Send + Sync {
    /// Insert the delivery id; returns false if it was already present.
    async fn insert(&self, id: DeliveryId) -> Result<bool, StoreError>;

    async fn contains(&self, id: DeliveryId) -> Result<bool, StoreError>;
}
