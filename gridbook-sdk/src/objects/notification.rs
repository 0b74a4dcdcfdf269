//! Queue payload types for result-published notifications.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payload carried by one result-published notification.
///
/// The catalog emits one of these per affected market when an event's
/// result is published. `winning_outcome = None` declares the market
/// voided (postponed or abandoned).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketResultPayload {
    pub event_type: String,
    pub event_id: i64,
    pub market_id: Uuid,
    pub winning_outcome: Option<CompactString>,
    pub timestamp: i64,
}

impl MarketResultPayload {
    pub const EVENT_TYPE: &'static str = "market_result_published";
}
