//! In-memory broker.
//!
//! Replays a fixed list of messages per queue, records what was published,
//! acknowledged, declared and closed, and can be told to fail at any single
//! step. Cloning an `InMemoryBroker` shares its state, so a test keeps one
//! handle for assertions and hands another to the code under test.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use super::client::{Channel, Connection, Connector};
use super::message::{Acknowledger, Delivery, DeliveryStream, Message};
use crate::utils::error::BoxError;
use crate::utils::{Error, Result};

/// Steps at which the in-memory broker can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    Connect,
    OpenChannel,
    Declare,
    Consume,
    /// The delivery stream yields an error in place of a message, then ends.
    Delivery,
    Prefetch,
    Publish,
    Ack,
    Close,
}

#[derive(Debug, Default)]
struct State {
    queues: HashMap<String, Vec<Message>>,
    published: Vec<(String, Message)>,
    acknowledged: Vec<Message>,
    declared: Vec<(String, bool)>,
    prefetch: Vec<u16>,
    connects: Vec<String>,
    consumer_tags: Vec<String>,
    channels_opened: usize,
    channels_closed: usize,
    connections_closed: usize,
    failures: HashMap<FailurePoint, usize>,
    close_source_after_replay: bool,
}

impl State {
    /// Returns an error when `point` is armed, counting down its allowance.
    fn check(&mut self, point: FailurePoint) -> Result<()> {
        self.check_queue(point, "")
    }

    fn check_queue(&mut self, point: FailurePoint, queue: &str) -> Result<()> {
        match self.failures.get_mut(&point) {
            Some(0) => Err(injected(point, queue)),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

fn injected(point: FailurePoint, queue: &str) -> Error {
    let cause: BoxError = format!("injected {point:?} failure").into();
    match point {
        FailurePoint::Connect => Error::Connection(cause),
        FailurePoint::OpenChannel => Error::Channel(cause),
        FailurePoint::Declare => Error::Declaration {
            queue: queue.to_string(),
            source: cause,
        },
        FailurePoint::Consume => Error::ConsumeRegistration {
            queue: queue.to_string(),
            source: cause,
        },
        FailurePoint::Delivery => Error::Consume(cause),
        FailurePoint::Prefetch => Error::Qos(cause),
        FailurePoint::Publish => Error::Publish {
            queue: queue.to_string(),
            source: cause,
        },
        FailurePoint::Ack => Error::Ack(cause),
        FailurePoint::Close => Error::Close(cause),
    }
}

/// A fake broker for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<State>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seeds `queue` with messages, appended after anything already there.
    pub fn with_messages<I>(self, queue: &str, messages: I) -> Self
    where
        I: IntoIterator<Item = Message>,
    {
        self.lock()
            .queues
            .entry(queue.to_string())
            .or_default()
            .extend(messages);
        self
    }

    /// Fails every call at `point`.
    pub fn failing_at(self, point: FailurePoint) -> Self {
        self.failing_after(point, 0)
    }

    /// Lets `successes` calls at `point` through, then fails the rest.
    pub fn failing_after(self, point: FailurePoint, successes: usize) -> Self {
        self.lock().failures.insert(point, successes);
        self
    }

    /// Ends delivery streams once the seeded messages are replayed, as if the
    /// broker closed the channel. By default a stream stays open forever.
    pub fn closing_after_replay(self) -> Self {
        self.lock().close_source_after_replay = true;
        self
    }

    /// Messages currently held by `queue`, including ones published to it.
    pub fn queue(&self, queue: &str) -> Vec<Message> {
        self.lock().queues.get(queue).cloned().unwrap_or_default()
    }

    pub fn published(&self) -> Vec<(String, Message)> {
        self.lock().published.clone()
    }

    pub fn acknowledged(&self) -> Vec<Message> {
        self.lock().acknowledged.clone()
    }

    pub fn ack_count(&self) -> usize {
        self.lock().acknowledged.len()
    }

    /// Declared queues with their durability, in declaration order.
    pub fn declared(&self) -> Vec<(String, bool)> {
        self.lock().declared.clone()
    }

    pub fn prefetch_history(&self) -> Vec<u16> {
        self.lock().prefetch.clone()
    }

    /// URIs passed to `connect`, in order.
    pub fn connect_uris(&self) -> Vec<String> {
        self.lock().connects.clone()
    }

    pub fn consumer_tags(&self) -> Vec<String> {
        self.lock().consumer_tags.clone()
    }

    pub fn channels_opened(&self) -> usize {
        self.lock().channels_opened
    }

    pub fn channels_closed(&self) -> usize {
        self.lock().channels_closed
    }

    pub fn connections_closed(&self) -> usize {
        self.lock().connections_closed
    }
}

#[async_trait]
impl Connector for InMemoryBroker {
    async fn connect(&self, uri: &str) -> Result<Box<dyn Connection>> {
        let mut state = self.lock();
        state.connects.push(uri.to_string());
        state.check(FailurePoint::Connect)?;
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl Connection for InMemoryBroker {
    async fn open_channel(&self) -> Result<Box<dyn Channel>> {
        let mut state = self.lock();
        state.check(FailurePoint::OpenChannel)?;
        state.channels_opened += 1;
        Ok(Box::new(MemoryChannel {
            broker: self.clone(),
        }))
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.lock();
        state.connections_closed += 1;
        state.check(FailurePoint::Close)
    }
}

struct MemoryChannel {
    broker: InMemoryBroker,
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn declare_queue(&self, name: &str, durable: bool) -> Result<()> {
        let mut state = self.broker.lock();
        state.check_queue(FailurePoint::Declare, name)?;
        state.declared.push((name.to_string(), durable));
        state.queues.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn set_prefetch(&self, count: u16) -> Result<()> {
        let mut state = self.broker.lock();
        state.check(FailurePoint::Prefetch)?;
        state.prefetch.push(count);
        Ok(())
    }

    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<DeliveryStream> {
        let mut state = self.broker.lock();
        state.check_queue(FailurePoint::Consume, queue)?;
        state.consumer_tags.push(consumer_tag.to_string());

        let mut snapshot = state.queues.get(queue).cloned().unwrap_or_default();
        let broken_at = state.failures.get(&FailurePoint::Delivery).copied();
        if let Some(n) = broken_at {
            snapshot.truncate(n);
        }

        let broker = self.broker.clone();
        let replay = stream::iter(snapshot).map(move |message| {
            let acker = MemoryAcker {
                broker: broker.clone(),
                message: message.clone(),
            };
            Ok::<_, Error>(Delivery::new(message, Box::new(acker)))
        });

        if broken_at.is_some() {
            let failure = injected(FailurePoint::Delivery, queue);
            Ok(replay.chain(stream::once(async move { Err(failure) })).boxed())
        } else if state.close_source_after_replay {
            Ok(replay.boxed())
        } else {
            Ok(replay.chain(stream::pending()).boxed())
        }
    }

    async fn publish(&self, queue: &str, message: &Message) -> Result<()> {
        let mut state = self.broker.lock();
        state.check_queue(FailurePoint::Publish, queue)?;
        state.published.push((queue.to_string(), message.clone()));
        state
            .queues
            .entry(queue.to_string())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.broker.lock();
        state.channels_closed += 1;
        state.check(FailurePoint::Close)
    }
}

struct MemoryAcker {
    broker: InMemoryBroker,
    message: Message,
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(&self) -> Result<()> {
        let mut state = self.broker.lock();
        state.check(FailurePoint::Ack)?;
        state.acknowledged.push(self.message.clone());
        Ok(())
    }
}
