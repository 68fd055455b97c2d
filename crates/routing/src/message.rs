//! Inbound hook events and the outbound messages built from them.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::Deserialize;

use crate::events::{
    EventKind, HookClass, HEADER_CONTENT_TYPE, HEADER_EVENT, HEADER_EVENT_UUID, HEADER_TOKEN,
    HEADER_USER_AGENT, USER_AGENT,
};
use crate::identifiers::{EventId, RepoCoordinates};

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Transport headers of an inbound delivery, looked up case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundHeaders(BTreeMap<String, String>);

impl InboundHeaders {
    /// Builds the header set from name/value pairs. Later duplicates win.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v.into()))
                .collect(),
        )
    }

    /// Returns a header value by case-insensitive name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// An authenticated hook delivery awaiting routing.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// How the delivery reached the relay.
    pub hook: HookClass,
    /// Delivery correlation identifier, if the sender supplied one.
    pub event_id: Option<EventId>,
    /// Original transport headers.
    pub headers: InboundHeaders,
    /// Raw request body, forwarded byte-for-byte.
    pub payload: Bytes,
}

/// The parts of a hook payload the relay routes on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EventBody {
    #[serde(default)]
    pub object_kind: String,

    #[serde(default)]
    pub project: ProjectRef,
}

/// Project identity carried by a hook payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProjectRef {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub namespace: String,
}

impl EventBody {
    /// Decodes the routing fields from a raw payload.
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// The lower-cased event kind used as the routing key.
    pub fn kind(&self) -> String {
        self.object_kind.to_lowercase()
    }

    /// The repository the event belongs to.
    pub fn coordinates(&self) -> RepoCoordinates {
        RepoCoordinates::new(self.project.namespace.as_str(), self.project.name.as_str())
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// A message ready to hand to the [`crate::Publisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Allow-listed projection of the inbound headers.
    pub headers: BTreeMap<String, String>,
    /// Original payload, unmodified.
    pub body: Bytes,
}

impl OutboundMessage {
    /// Builds the outbound message for a routed event.
    ///
    /// Only `content-type`, the event-uuid and the token are carried over
    /// from the inbound headers. The event-type header is rewritten to the
    /// external name of `kind`, and a fixed user agent is added. The token is
    /// omitted when the inbound delivery had none.
    pub fn project(kind: EventKind, inbound: &InboundHeaders, body: Bytes) -> Self {
        let mut headers = BTreeMap::new();

        headers.insert(
            HEADER_CONTENT_TYPE.to_string(),
            inbound.get(HEADER_CONTENT_TYPE).unwrap_or_default().to_string(),
        );
        headers.insert(HEADER_EVENT.to_string(), kind.external_name().to_string());
        headers.insert(
            HEADER_EVENT_UUID.to_string(),
            inbound.get(HEADER_EVENT_UUID).unwrap_or_default().to_string(),
        );
        if let Some(token) = inbound.get(HEADER_TOKEN) {
            headers.insert(HEADER_TOKEN.to_string(), token.to_string());
        }
        headers.insert(HEADER_USER_AGENT.to_string(), USER_AGENT.to_string());

        Self { headers, body }
    }
}
