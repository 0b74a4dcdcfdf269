use crate::entities::event::{EventId, MarketId, OutcomeName};

/// Relay-assigned delivery identifier.
///
/// Monotonically increasing; stable across redeliveries of the same
/// notification. The settlement engine's processed-set is keyed on it.
pub type DeliveryId = u64;

/// A result-published notification, one per affected market.
///
/// Consumed exactly-once semantically even though delivered at-least-once.
/// `winning_outcome = None` means the market was voided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultNotification {
    pub event_id: EventId,
    pub market_id: MarketId,
    pub winning_outcome: Option<OutcomeName>,
    pub delivery_id: DeliveryId,
    /// Delivery attempts so far, starting at 1.
    pub attempt: u32,
}
