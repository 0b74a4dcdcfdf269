//! Event type definitions for the notification pipeline.
//!
//! `ResultPublished` is the catalog's raw emission; the relay wraps it into
//! a `Delivery` with a stable delivery identifier and a serialized payload,
//! which is what crosses the queue boundary to the settlement engine.

use crate::entities::event::{EventId, MarketId, OutcomeName};
use crate::entities::notification::DeliveryId;

/// Raw result publication, one per affected market.
///
/// Emitted by the catalog into the relay's ingest channel. Carries
/// identifiers and the winning outcome only; consumers fetch current bet
/// state from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPublished {
    pub event_id: EventId,
    pub market_id: MarketId,
    /// `None` means the market was voided.
    pub winning_outcome: Option<OutcomeName>,
}

/// One delivery attempt of a result notification.
///
/// `delivery_id` is assigned once at relay ingest and stays stable across
/// redeliveries; `attempt` counts deliveries of the same id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub delivery_id: DeliveryId,
    pub attempt: u32,
    /// JSON-serialized `gridbook_sdk::objects::MarketResultPayload`.
    pub payload: String,
}
