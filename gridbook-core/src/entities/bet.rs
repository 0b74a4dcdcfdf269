use crate::entities::BetState;
use crate::entities::event::{MarketId, OutcomeName};
use uuid::Uuid;

/// Bet identifier (UUID v7, time-ordered for the append-oriented ledger).
pub type BetId = Uuid;

/// User identifier.
pub type UserId = Uuid;

/// The odds value frozen into a bet at placement time.
///
/// Immutable once created. A bet never re-reads live odds; settlement uses
/// only this snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OddsSnapshot {
    pub market_id: MarketId,
    pub outcome: OutcomeName,
    pub price: rust_decimal::Decimal,
    pub taken_at: time::OffsetDateTime,
    /// Generation of the cache entry the price was read from.
    pub generation: u64,
    /// Whether the entry was served stale (catalog unavailable at the time).
    pub stale: bool,
}

/// A placed bet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bet {
    pub id: BetId,
    pub user_id: UserId,
    pub market_id: MarketId,
    pub outcome: OutcomeName,
    pub stake: rust_decimal::Decimal,
    pub snapshot: OddsSnapshot,
    pub state: BetState,
    pub created_at: time::OffsetDateTime,
    pub settled_at: Option<time::OffsetDateTime>,
}

/// Insert form for a new bet; the store assigns nothing, the ledger owns
/// id generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BetInsert {
    pub id: BetId,
    pub user_id: UserId,
    pub market_id: MarketId,
    pub outcome: OutcomeName,
    pub stake: rust_decimal::Decimal,
    pub snapshot: OddsSnapshot,
}

impl BetInsert {
    pub fn into_pending(self, created_at: time::OffsetDateTime) -> Bet {
        Bet {
            id: self.id,
            user_id: self.user_id,
            market_id: self.market_id,
            outcome: self.outcome,
            stake: self.stake,
            snapshot: self.snapshot,
            state: BetState::Pending,
            created_at,
            settled_at: None,
        }
    }
}
