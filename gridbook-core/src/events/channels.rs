//! Event channel factories and handles.

use super::types::{Delivery, ResultPublished};
use tokio::sync::mpsc;

/// Default buffer size for event channels.
///
/// Enough to absorb a full result publication burst (every market of an
/// event at once) while keeping memory bounded.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for ResultPublished events (catalog side).
pub type ResultPublishedSender = mpsc::Sender<ResultPublished>;
/// Receiver handle for ResultPublished events (relay side).
pub type ResultPublishedReceiver = mpsc::Receiver<ResultPublished>;

/// Sender handle for Delivery events (relay side).
pub type DeliverySender = mpsc::Sender<Delivery>;
/// Receiver handle for Delivery events (settlement side).
pub type DeliveryReceiver = mpsc::Receiver<Delivery>;

/// Create a new ResultPublished channel.
pub fn result_published_channel() -> (ResultPublishedSender, ResultPublishedReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}

/// Create a new Delivery channel.
pub fn delivery_channel() -> (DeliverySender, DeliveryReceiver) {
    mpsc::channel(DEFAULT_CHANNEL_BUFFER)
}
