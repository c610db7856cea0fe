//! Crate-wide error type.
//!
//! Every failure of a drain session is surfaced through [`Error`]. Broker
//! causes are kept as boxed sources so the `lapin` error (or the fake's
//! injected one) is still visible in the chain.

use thiserror::Error as ThisError;

/// Boxed cause of a broker-side failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("failed to connect to the broker: {0}")]
    Connection(#[source] BoxError),

    #[error("failed to open a channel: {0}")]
    Channel(#[source] BoxError),

    #[error("failed to declare queue '{queue}': {source}")]
    Declaration {
        queue: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to register a consumer on queue '{queue}': {source}")]
    ConsumeRegistration {
        queue: String,
        #[source]
        source: BoxError,
    },

    #[error("delivery stream failed: {0}")]
    Consume(#[source] BoxError),

    #[error("failed to set prefetch: {0}")]
    Qos(#[source] BoxError),

    #[error("failed writing output: {0}")]
    Sink(#[from] std::io::Error),

    #[error("failed to publish to queue '{queue}': {source}")]
    Publish {
        queue: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to acknowledge message: {0}")]
    Ack(#[source] BoxError),

    #[error("failed to close broker resource: {0}")]
    Close(#[source] BoxError),

    #[error("{0}")]
    Validation(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
}
