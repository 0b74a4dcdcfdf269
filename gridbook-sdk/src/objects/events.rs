use crate::objects::{EventStatus, MarketKind};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

/// A market as exposed to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSummary {
    pub market_id: Uuid,
    pub kind: MarketKind,
    pub outcomes: SmallVec<[CompactString; 8]>,
}

/// An event as exposed to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSummary {
    pub event_id: i64,
    pub name: CompactString,
    pub country: CompactString,
    pub year: i32,
    pub status: EventStatus,
    /// Unix timestamp of the scheduled start.
    pub scheduled_at: i64,
    pub markets: Vec<MarketSummary>,
}

/// Optional filters for the "list events" operation.
///
/// All fields are conjunctive; `None` means "don't filter on this".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    pub country: Option<CompactString>,
    pub year: Option<i32>,
    pub status: Option<EventStatus>,
}
