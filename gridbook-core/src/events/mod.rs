//! Events and channels connecting the catalog, relay, and settlement engine.

pub mod channels;
pub mod types;

pub use channels::{
    DEFAULT_CHANNEL_BUFFER, DeliveryReceiver, DeliverySender, ResultPublishedReceiver,
    ResultPublishedSender, delivery_channel, result_published_channel,
};
pub use types::{Delivery, ResultPublished};
