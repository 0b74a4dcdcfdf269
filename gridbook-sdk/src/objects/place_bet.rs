use crate::objects::BetStatus;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request payload for placing a bet.
///
/// Sent by the application backend to the betting core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaceBetRequest {
    pub user_id: Uuid,
    pub market_id: Uuid,
    /// The chosen outcome; must belong to the market's outcome set.
    pub outcome: CompactString,
    pub stake: rust_decimal::Decimal,
}

/// Request payload for querying an existing bet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GetBetRequest {
    pub bet_id: Uuid,
}

/// Response returned by both the "place bet" and "get bet status" operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetResponse {
    /// Internal bet ID (UUID v7).
    pub bet_id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// The market the bet was placed on.
    pub market_id: Uuid,
    /// The chosen outcome.
    pub outcome: CompactString,
    /// Stake amount.
    pub stake: rust_decimal::Decimal,
    /// Price frozen into the bet at placement time.
    pub price: rust_decimal::Decimal,
    /// Whether the frozen price was served from a stale cache entry.
    pub price_stale: bool,
    /// Current bet status.
    pub status: BetStatus,
    /// Unix timestamp of when the bet was created.
    pub created_at: i64,
    /// Unix timestamp of settlement, if the bet is terminal.
    pub settled_at: Option<i64>,
}
