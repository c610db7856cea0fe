//! Broker client traits.
//!
//! The drain loop and the command façade only talk to these traits, never to
//! `lapin` directly. [`AmqpConnector`](super::AmqpConnector) is the real
//! implementation and [`InMemoryBroker`](super::InMemoryBroker) the fake.

use async_trait::async_trait;

use super::message::{DeliveryStream, Message};
use crate::utils::Result;

/// Opens connections to a broker.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, uri: &str) -> Result<Box<dyn Connection>>;
}

#[async_trait]
pub trait Connection: Send + Sync {
    async fn open_channel(&self) -> Result<Box<dyn Channel>>;

    /// Best effort: failing here does not undo anything already done.
    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait Channel: Send + Sync {
    async fn declare_queue(&self, name: &str, durable: bool) -> Result<()>;

    /// Bounds how many unacknowledged messages the broker hands this channel.
    async fn set_prefetch(&self, count: u16) -> Result<()>;

    /// Registers a consumer on `queue` and returns its delivery stream.
    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<DeliveryStream>;

    /// Publishes `message` to `queue` through the default exchange, keeping
    /// its properties and body as they are.
    async fn publish(&self, queue: &str, message: &Message) -> Result<()>;

    async fn close(&self) -> Result<()>;
}
