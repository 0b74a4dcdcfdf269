use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

/// A single priced outcome within a market's odds table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomePrice {
    pub outcome: CompactString,
    pub price: rust_decimal::Decimal,
}

/// Response returned by the "current odds" operation.
///
/// `stale` is set when the value was served from an expired cache entry
/// because the authoritative catalog was unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddsQuoteResponse {
    pub market_id: Uuid,
    pub prices: SmallVec<[OutcomePrice; 8]>,
    /// Cache generation the quote was served from.
    pub generation: u64,
    pub stale: bool,
    /// Unix timestamp of when the underlying entry was fetched.
    pub fetched_at: i64,
}
