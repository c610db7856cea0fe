//! The `drain` module holds the consume loop shared by every command.
//!
//! Given a delivery stream, a sink and a [`DrainConfig`], [`drain`] writes
//!
//! ```text
//! prefix + body_1 + separator + ... + body_N + postfix
//! ```
//!
//! optionally republishing each message to a destination queue and
//! acknowledging it once it has been written. With a positive stop count
//! the last body gets no trailing separator; with an unbounded count every
//! body does, since the final one is never known.

pub mod sink;

use std::path::PathBuf;

use futures::{Stream, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace, warn};

use crate::broker::{Channel, Delivery};
use crate::utils::{Error, Result};

pub use sink::{Sink, SinkTarget};

/// Strings wrapped around and between message bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFormat {
    pub prefix: String,
    pub separator: String,
    pub postfix: String,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            separator: "\n".to_string(),
            postfix: String::new(),
        }
    }
}

/// Per-invocation drain settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainConfig {
    /// Unacknowledged messages the broker may have in flight. Must be > 0.
    pub prefetch: u16,
    /// Messages to process before stopping; 0 keeps listening.
    pub count: usize,
    pub auto_ack: bool,
    pub format: OutputFormat,
    /// Output file; `None` writes to stdout.
    pub output: Option<PathBuf>,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            prefetch: 1,
            count: 0,
            auto_ack: false,
            format: OutputFormat::default(),
            output: None,
        }
    }
}

impl DrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.prefetch == 0 {
            return Err(Error::Validation(
                "prefetch must be a positive number".to_string(),
            ));
        }
        Ok(())
    }

    fn is_bounded(&self) -> bool {
        self.count > 0
    }

    /// Whether the message following `processed` earlier ones is the last
    /// one before the stop count is reached.
    fn is_final(&self, processed: usize) -> bool {
        self.is_bounded() && processed + 1 >= self.count
    }
}

/// Queue that every drained message is republished to.
#[derive(Clone, Copy)]
pub struct Destination<'a> {
    pub channel: &'a dyn Channel,
    pub queue: &'a str,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DrainEnd {
    CountReached,
    #[default]
    SourceClosed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub written: usize,
    pub published: usize,
    pub acknowledged: usize,
    pub end: DrainEnd,
}

/// Runs the drain loop until the stop count is reached or the source closes.
///
/// The prefix is written first. Once it is out, the postfix is written and
/// the sink shut down on every exit path, including a failure in the loop;
/// in that case the loop's error is returned and a cleanup failure is only
/// logged. Dropping the returned future leaves the output unterminated.
pub async fn drain<S, W>(
    mut deliveries: S,
    sink: &mut W,
    config: &DrainConfig,
    destination: Option<Destination<'_>>,
) -> Result<DrainReport>
where
    S: Stream<Item = Result<Delivery>> + Unpin,
    W: AsyncWrite + Unpin,
{
    sink.write_all(config.format.prefix.as_bytes()).await?;

    let outcome = consume(&mut deliveries, sink, config, destination).await;
    let finished = finish(sink, &config.format).await;

    match (outcome, finished) {
        (Ok(report), Ok(())) => Ok(report),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(cleanup)) => {
            warn!("Failed to terminate output after error: {}", cleanup);
            Err(e)
        }
    }
}

async fn consume<S, W>(
    deliveries: &mut S,
    sink: &mut W,
    config: &DrainConfig,
    destination: Option<Destination<'_>>,
) -> Result<DrainReport>
where
    S: Stream<Item = Result<Delivery>> + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut report = DrainReport::default();

    while let Some(delivery) = deliveries.next().await {
        let delivery = delivery?;
        let message = &delivery.message;

        if let Some(dest) = destination {
            dest.channel.publish(dest.queue, message).await?;
            report.published += 1;
        }

        sink.write_all(&message.body).await?;
        if !config.is_final(report.written) {
            sink.write_all(config.format.separator.as_bytes()).await?;
        }
        // a listening drain may never reach `finish`; each message goes out now,
        // and always before the broker is told to forget it
        sink.flush().await?;

        if config.auto_ack {
            delivery.acknowledge().await?;
            report.acknowledged += 1;
        }

        report.written += 1;
        trace!(written = report.written, bytes = message.body.len(), "Drained message");

        if config.is_bounded() && report.written >= config.count {
            report.end = DrainEnd::CountReached;
            debug!(count = config.count, "Stop count reached");
            return Ok(report);
        }
    }

    debug!("Message source closed");
    report.end = DrainEnd::SourceClosed;
    Ok(report)
}

async fn finish<W>(sink: &mut W, format: &OutputFormat) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    sink.write_all(format.postfix.as_bytes()).await?;
    sink.flush().await?;
    sink.shutdown().await?;
    Ok(())
}
