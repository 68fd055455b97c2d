//! Port traits implemented by infrastructure crates.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Configuration;
use crate::errors::{ConfigError, PublishError};
use crate::identifiers::TopicName;
use crate::message::OutboundMessage;

/// Publishes one message to a topic on the message bus.
///
/// At-most-once: the return value is the only delivery acknowledgement.
/// Implementations own their connection and serialise access internally, so
/// a single instance is shared by every in-flight publish.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &TopicName, message: &OutboundMessage)
        -> Result<(), PublishError>;
}

/// Read accessor for the current configuration snapshot.
///
/// The returned snapshot is immutable; a reload replaces it for later calls
/// without affecting callers still holding the previous one.
pub trait ConfigProvider: Send + Sync {
    fn current(&self) -> Result<Arc<Configuration>, ConfigError>;
}

impl<F> ConfigProvider for F
where
    F: Fn() -> Result<Arc<Configuration>, ConfigError> + Send + Sync,
{
    fn current(&self) -> Result<Arc<Configuration>, ConfigError> {
        self()
    }
}
