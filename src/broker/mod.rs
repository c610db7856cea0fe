//! The `broker` module hides the AMQP client behind a small set of traits.
//!
//! - `client`: the `Connector`/`Connection`/`Channel` traits.
//! - `message`: `Message`, `Delivery` and the delivery stream type.
//! - `amqp`: the real implementation on top of `lapin`.
//! - `memory`: an in-memory broker used by the tests.

pub mod amqp;
pub mod client;
pub mod memory;
pub mod message;

pub use amqp::AmqpConnector;
pub use client::{Channel, Connection, Connector};
pub use memory::{FailurePoint, InMemoryBroker};
pub use message::{Acknowledger, Delivery, DeliveryStream, Message};
