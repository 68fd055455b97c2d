//! Hook Delivery message bus adapter.
//!
//! Implements the [`routing::Publisher`] trait over NATS core publish. Each
//! routing topic is used verbatim as the NATS subject; outbound headers travel
//! as NATS message headers and the payload bytes are forwarded untouched.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Connection lifecycle, reconnects, and TLS negotiation
//! are owned by `async-nats`. The [`routing`] crate sees only
//! [`routing::Publisher`].
//!
//! ## Delivery Semantics
//!
//! At-most-once. A publish is reported successful once the client has flushed
//! it to the server; there is no stream acknowledgement and no retry here.

use std::time::Duration;

use async_nats::{Client, ConnectOptions, HeaderMap, ServerAddr};
use async_trait::async_trait;
use routing::{OutboundMessage, PublishError, Publisher, TopicName};
use tracing::{debug, info, instrument};

/// Connection settings for the message bus.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Server addresses; at least one is required.
    pub servers: Vec<ServerAddr>,
    /// Client connection name reported to the server.
    pub name: Option<String>,
    /// Time allowed to establish the initial connection.
    pub connection_timeout: Duration,
    /// Time allowed for a flush to be acknowledged by the server.
    pub request_timeout: Option<Duration>,
}

impl BrokerConfig {
    /// Builds a config from a comma-separated address list.
    pub fn from_server_list(servers: &str) -> Result<Self, PublishError> {
        Ok(Self {
            servers: parse_servers(servers)?,
            name: None,
            connection_timeout: Duration::from_secs(5),
            request_timeout: Some(Duration::from_secs(30)),
        })
    }

    /// Sets the client connection name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Parses a comma-separated list of server addresses, ignoring blank entries.
///
/// Fails on the first invalid entry, or if no address remains.
pub fn parse_servers(servers: &str) -> Result<Vec<ServerAddr>, PublishError> {
    let addrs = servers
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<ServerAddr>()
                .map_err(|e| PublishError::InvalidAddress {
                    address: s.to_string(),
                    message: e.to_string(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if addrs.is_empty() {
        return Err(PublishError::InvalidAddress {
            address: servers.to_string(),
            message: "no valid address for the message bus".to_string(),
        });
    }

    Ok(addrs)
}

/// [`Publisher`] backed by a NATS client.
#[derive(Debug, Clone)]
pub struct NatsPublisher {
    client: Client,
}

impl NatsPublisher {
    /// Connects to the message bus.
    pub async fn connect(config: BrokerConfig) -> Result<Self, PublishError> {
        let mut options = ConnectOptions::new()
            .connection_timeout(config.connection_timeout)
            .request_timeout(config.request_timeout);

        if let Some(name) = &config.name {
            options = options.name(name);
        }

        let client = options
            .connect(config.servers.as_slice())
            .await
            .map_err(|e| PublishError::Connect {
                message: e.to_string(),
            })?;

        info!(servers = config.servers.len(), "connected to message bus");

        Ok(Self { client })
    }

    /// Flushes any buffered messages to the server.
    pub async fn flush(&self) -> Result<(), PublishError> {
        self.client.flush().await.map_err(|e| PublishError::Connect {
            message: e.to_string(),
        })
    }
}

/// Converts outbound headers to NATS message headers.
fn to_header_map(message: &OutboundMessage) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in &message.headers {
        headers.insert(name.as_str(), value.as_str());
    }
    headers
}

#[async_trait]
impl Publisher for NatsPublisher {
    #[instrument(skip_all, fields(topic = %topic))]
    async fn publish(
        &self,
        topic: &TopicName,
        message: &OutboundMessage,
    ) -> Result<(), PublishError> {
        let transport = |e: &dyn std::fmt::Display| PublishError::Transport {
            topic: topic.to_string(),
            message: e.to_string(),
        };

        self.client
            .publish_with_headers(
                topic.to_string(),
                to_header_map(message),
                message.body.clone(),
            )
            .await
            .map_err(|e| transport(&e))?;

        self.client.flush().await.map_err(|e| transport(&e))?;

        debug!(bytes = message.body.len(), "message flushed");
        Ok(())
    }
}
