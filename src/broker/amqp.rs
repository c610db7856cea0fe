//! `lapin`-backed implementation of the broker traits.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::ConnectionProperties;
use tracing::debug;

use super::client::{Channel, Connection, Connector};
use super::message::{Acknowledger, Delivery, DeliveryStream, Message};
use crate::utils::{Error, Result};

const REPLY_SUCCESS: u16 = 200;

/// Connects to a real AMQP 0-9-1 broker.
#[derive(Debug, Clone, Default)]
pub struct AmqpConnector;

impl AmqpConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for AmqpConnector {
    async fn connect(&self, uri: &str) -> Result<Box<dyn Connection>> {
        let inner = lapin::Connection::connect(uri, ConnectionProperties::default())
            .await
            .map_err(|e| Error::Connection(Box::new(e)))?;
        debug!("Connected to broker");
        Ok(Box::new(AmqpConnection { inner }))
    }
}

pub struct AmqpConnection {
    inner: lapin::Connection,
}

#[async_trait]
impl Connection for AmqpConnection {
    async fn open_channel(&self) -> Result<Box<dyn Channel>> {
        let inner = self
            .inner
            .create_channel()
            .await
            .map_err(|e| Error::Channel(Box::new(e)))?;
        debug!(channel = inner.id(), "Opened channel");
        Ok(Box::new(AmqpChannel { inner }))
    }

    async fn close(&self) -> Result<()> {
        self.inner
            .close(REPLY_SUCCESS, "Bye")
            .await
            .map_err(|e| Error::Close(Box::new(e)))
    }
}

pub struct AmqpChannel {
    inner: lapin::Channel,
}

#[async_trait]
impl Channel for AmqpChannel {
    async fn declare_queue(&self, name: &str, durable: bool) -> Result<()> {
        let options = QueueDeclareOptions {
            durable,
            ..QueueDeclareOptions::default()
        };
        self.inner
            .queue_declare(name, options, FieldTable::default())
            .await
            .map_err(|e| Error::Declaration {
                queue: name.to_string(),
                source: Box::new(e),
            })?;
        Ok(())
    }

    async fn set_prefetch(&self, count: u16) -> Result<()> {
        self.inner
            .basic_qos(count, BasicQosOptions::default())
            .await
            .map_err(|e| Error::Qos(Box::new(e)))
    }

    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<DeliveryStream> {
        let consumer = self
            .inner
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| Error::ConsumeRegistration {
                queue: queue.to_string(),
                source: Box::new(e),
            })?;

        let deliveries = consumer.map(|delivery| {
            delivery
                .map(|d| {
                    let message = Message {
                        body: d.data,
                        properties: d.properties,
                    };
                    Delivery::new(message, Box::new(AmqpAcker(d.acker)))
                })
                .map_err(|e| Error::Consume(Box::new(e)))
        });
        Ok(deliveries.boxed())
    }

    async fn publish(&self, queue: &str, message: &Message) -> Result<()> {
        let publish_error = |e: lapin::Error| Error::Publish {
            queue: queue.to_string(),
            source: Box::new(e),
        };
        self.inner
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &message.body,
                message.properties.clone(),
            )
            .await
            .map_err(publish_error)?
            .await
            .map_err(publish_error)?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.inner
            .close(REPLY_SUCCESS, "Bye")
            .await
            .map_err(|e| Error::Close(Box::new(e)))
    }
}

struct AmqpAcker(Acker);

#[async_trait]
impl Acknowledger for AmqpAcker {
    async fn ack(&self) -> Result<()> {
        self.0
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| Error::Ack(Box::new(e)))
    }
}
