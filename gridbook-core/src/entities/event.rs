use crate::entities::{EventStatus, MarketKind};
use compact_str::CompactString;
use smallvec::SmallVec;
use uuid::Uuid;

/// Catalog-assigned event identifier.
pub type EventId = i64;

/// Market identifier.
pub type MarketId = Uuid;

/// An outcome name within a market's outcome set.
pub type OutcomeName = CompactString;

/// Authoritative odds table for one market: price per outcome.
///
/// Ordered the same way as the market's outcome set. Small enough that a
/// linear scan beats hashing.
pub type OddsTable = SmallVec<[(OutcomeName, rust_decimal::Decimal); 8]>;

/// Price lookup in an odds table.
pub fn price_for(table: &OddsTable, outcome: &str) -> Option<rust_decimal::Decimal> {
    table
        .iter()
        .find(|(name, _)| name == outcome)
        .map(|(_, price)| *price)
}

/// A bettable proposition within an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Market {
    pub id: MarketId,
    pub event_id: EventId,
    pub kind: MarketKind,
    /// Ordered outcome set; a bet's chosen outcome must be a member.
    pub outcomes: SmallVec<[OutcomeName; 8]>,
    /// Authoritative current odds, mutable until the event completes.
    pub odds: OddsTable,
}

impl Market {
    pub fn has_outcome(&self, outcome: &str) -> bool {
        self.outcomes.iter().any(|o| o == outcome)
    }
}

/// A historical racing event and its markets.
///
/// Immutable once Completed, except for result attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: EventId,
    pub name: CompactString,
    pub country: CompactString,
    pub year: i32,
    pub status: EventStatus,
    pub scheduled_at: time::OffsetDateTime,
    /// When the event actually took place, once known.
    pub occurred_at: Option<time::OffsetDateTime>,
    pub markets: Vec<Market>,
}

impl Event {
    pub fn market(&self, market_id: MarketId) -> Option<&Market> {
        self.markets.iter().find(|m| m.id == market_id)
    }

    /// Whether bets may still be placed against this event's markets.
    pub fn open_for_betting(&self) -> bool {
        matches!(self.status, EventStatus::Scheduled)
    }
}
