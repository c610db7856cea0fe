//! Command façade: `export` and `copy_or_move`.
//!
//! Each call is one drain session:
//!
//! ```text
//! Connecting -> ChannelOpen -> (QueueDeclared) -> Draining -> Closing -> Done
//! ```
//!
//! Any failing step skips the rest except releasing whatever was opened.
//! Channels and the connection are closed on every exit path; a failure
//! while closing is logged and never replaces the session's own result.

use tracing::{info, warn};
use uuid::Uuid;

use crate::broker::{Channel, Connection, Connector};
use crate::config::ConnectionSettings;
use crate::drain::{self, Destination, DrainConfig, DrainReport, Sink};
use crate::utils::{Error, Result};

const TOOL_NAME: &str = "queuecat";

/// Whether the queues of a session are declared before use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueueDeclaration {
    /// Consume from / publish to the queues by name only.
    #[default]
    Skip,
    Declare { durable: bool },
}

/// Runs drain sessions against the broker reached through `connector`.
#[derive(Debug, Clone)]
pub struct Commands<C> {
    connector: C,
    connection: ConnectionSettings,
}

impl<C: Connector> Commands<C> {
    pub fn new(connector: C, connection: ConnectionSettings) -> Self {
        Self {
            connector,
            connection,
        }
    }

    /// Writes the messages of `queue` to the configured output.
    pub async fn export(
        &self,
        queue: &str,
        config: &DrainConfig,
        declaration: QueueDeclaration,
    ) -> Result<DrainReport> {
        require_queue(queue, "queue")?;
        config.validate()?;

        let conn = self.connect().await?;
        let result = async {
            let channel = conn.open_channel().await?;
            let result = export_on(channel.as_ref(), queue, config, declaration).await;
            release_channel(channel.as_ref(), "source").await;
            result
        }
        .await;
        release_connection(conn.as_ref()).await;

        let report = result?;
        info!(
            queue,
            written = report.written,
            acknowledged = report.acknowledged,
            "Export finished"
        );
        Ok(report)
    }

    /// Republishes the messages of `source` to `destination`, mirroring them
    /// to the configured output.
    ///
    /// With `auto_ack` the source copies are acknowledged, which makes this
    /// a move; without it the messages stay on `source` and are redelivered
    /// to the next consumer.
    pub async fn copy_or_move(
        &self,
        source: &str,
        destination: &str,
        config: &DrainConfig,
        declaration: QueueDeclaration,
    ) -> Result<DrainReport> {
        require_queue(source, "source queue")?;
        require_queue(destination, "destination queue")?;
        config.validate()?;

        let conn = self.connect().await?;
        let result = async {
            let consumer = conn.open_channel().await?;
            let result = async {
                let publisher = conn.open_channel().await?;
                let result = transfer_on(
                    consumer.as_ref(),
                    publisher.as_ref(),
                    source,
                    destination,
                    config,
                    declaration,
                )
                .await;
                release_channel(publisher.as_ref(), "destination").await;
                result
            }
            .await;
            release_channel(consumer.as_ref(), "source").await;
            result
        }
        .await;
        release_connection(conn.as_ref()).await;

        let report = result?;
        info!(
            source,
            destination,
            published = report.published,
            acknowledged = report.acknowledged,
            "{} finished",
            if config.auto_ack { "Move" } else { "Copy" }
        );
        Ok(report)
    }

    async fn connect(&self) -> Result<Box<dyn Connection>> {
        info!(
            host = %self.connection.host,
            port = self.connection.port,
            "Connecting to broker"
        );
        self.connector.connect(&self.connection.uri()).await
    }
}

async fn export_on(
    channel: &dyn Channel,
    queue: &str,
    config: &DrainConfig,
    declaration: QueueDeclaration,
) -> Result<DrainReport> {
    declare(channel, queue, declaration).await?;
    channel.set_prefetch(config.prefetch).await?;
    let deliveries = channel.consume(queue, &consumer_tag()).await?;

    let mut sink = Sink::open(config.output.as_deref()).await?;
    info!(queue, output = %sink.target(), "Exporting messages");
    drain::drain(deliveries, &mut sink, config, None).await
}

async fn transfer_on(
    consumer: &dyn Channel,
    publisher: &dyn Channel,
    source: &str,
    destination: &str,
    config: &DrainConfig,
    declaration: QueueDeclaration,
) -> Result<DrainReport> {
    declare(consumer, source, declaration).await?;
    declare(publisher, destination, declaration).await?;
    consumer.set_prefetch(config.prefetch).await?;
    let deliveries = consumer.consume(source, &consumer_tag()).await?;

    let mut sink = Sink::open(config.output.as_deref()).await?;
    info!(source, destination, output = %sink.target(), "Transferring messages");
    let destination = Destination {
        channel: publisher,
        queue: destination,
    };
    drain::drain(deliveries, &mut sink, config, Some(destination)).await
}

async fn declare(channel: &dyn Channel, queue: &str, declaration: QueueDeclaration) -> Result<()> {
    match declaration {
        QueueDeclaration::Skip => Ok(()),
        QueueDeclaration::Declare { durable } => channel.declare_queue(queue, durable).await,
    }
}

fn require_queue(name: &str, what: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Validation(format!("{what} not defined")));
    }
    Ok(())
}

fn consumer_tag() -> String {
    format!("{TOOL_NAME}-{}", Uuid::new_v4())
}

async fn release_channel(channel: &dyn Channel, role: &str) {
    if let Err(e) = channel.close().await {
        warn!("Failed to close {} channel: {}", role, e);
    }
}

async fn release_connection(conn: &dyn Connection) {
    if let Err(e) = conn.close().await {
        warn!("Failed to close connection: {}", e);
    }
}

#[cfg(test)]
mod tests;
