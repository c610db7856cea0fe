use async_trait::async_trait;
use futures::stream::BoxStream;
use lapin::BasicProperties;

use crate::utils::Result;

/// A message as it sits on the broker.
///
/// The metadata is kept as `lapin`'s own property set (headers, content
/// type and encoding, delivery mode, priority, correlation id, reply-to,
/// expiration, message id, timestamp, type, user id, app id) so that a copy
/// or move republishes it without dropping a field.
///
/// # Example
///
/// ```rust
/// use lapin::BasicProperties;
/// use queuecat::broker::Message;
///
/// let msg = Message {
///     body: b"{\"order\":42}".to_vec(),
///     properties: BasicProperties::default().with_content_type("application/json".into()),
/// };
/// assert_eq!(msg.body_str(), Some("{\"order\":42}"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub body: Vec<u8>,
    pub properties: BasicProperties,
}

impl Message {
    /// Creates a message with default (empty) metadata.
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            properties: BasicProperties::default(),
        }
    }

    pub fn with_properties(mut self, properties: BasicProperties) -> Self {
        self.properties = properties;
        self
    }

    /// The body as text, if it is valid UTF-8.
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// Confirms a single delivery back to the broker.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> Result<()>;
}

/// A received message together with the handle used to acknowledge it.
pub struct Delivery {
    pub message: Message,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(message: Message, acker: Box<dyn Acknowledger>) -> Self {
        Self { message, acker }
    }

    /// Positively acknowledges this delivery.
    pub async fn acknowledge(&self) -> Result<()> {
        self.acker.ack().await
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("message", &self.message)
            .field("acker", &"dyn Acknowledger")
            .finish()
    }
}

/// Lazy sequence of deliveries from one consumer.
///
/// It ends only when the channel or connection goes away and cannot be
/// restarted.
pub type DeliveryStream = BoxStream<'static, Result<Delivery>>;
