//! Event vocabulary shared by the listener, the router, and outbound messages.
//!
//! Two vocabularies meet here. Internally an event is identified by its
//! lower-cased [`EventKind`] (the payload's `object_kind`). On the wire GitLab
//! names deliveries with an event-type header (`X-Gitlab-Event`), e.g.
//! `System Hook` for instance-wide hooks or `Push Hook` for a per-project
//! push. Routing uses the former; outbound messages carry the latter.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Wire constants
// ---------------------------------------------------------------------------

/// Header carrying the external event type.
pub const HEADER_EVENT: &str = "X-Gitlab-Event";

/// Header carrying the delivery correlation identifier.
pub const HEADER_EVENT_UUID: &str = "X-Gitlab-Event-UUID";

/// Header carrying the shared authenticity token.
pub const HEADER_TOKEN: &str = "X-Gitlab-Token";

/// Content type header, forwarded verbatim.
pub const HEADER_CONTENT_TYPE: &str = "content-type";

/// User agent header set on every outbound message.
pub const HEADER_USER_AGENT: &str = "User-Agent";

/// Fixed user agent identifying this relay to downstream consumers.
pub const USER_AGENT: &str = "Robot-Gitlab-Hook-Delivery";

/// External event type of an instance-wide system hook delivery.
pub const EVENT_TYPE_SYSTEM_HOOK: &str = "System Hook";

/// External event type of a per-project push hook delivery.
pub const EVENT_TYPE_PUSH_HOOK: &str = "Push Hook";

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

/// A recognised, normalised event kind used as the routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Commits pushed to a branch.
    Push,
}

impl EventKind {
    /// Every kind this relay knows how to route.
    pub const ALL: &'static [EventKind] = &[EventKind::Push];

    /// Parses a kind from its lower-cased name. Case is significant: callers
    /// normalise `object_kind` before asking.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "push" => Some(EventKind::Push),
            _ => None,
        }
    }

    /// The internal (routing) name.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Push => "push",
        }
    }

    /// The external event-type name consumers expect in `X-Gitlab-Event`.
    pub fn external_name(self) -> &'static str {
        match self {
            EventKind::Push => EVENT_TYPE_PUSH_HOOK,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Hook classes
// ---------------------------------------------------------------------------

/// How a delivery reached the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookClass {
    /// Instance-wide hook covering every repository.
    System,
    /// Hook registered on a single repository.
    Web,
}

impl HookClass {
    /// Classifies an inbound `X-Gitlab-Event` value. Returns `None` for event
    /// types the relay does not forward.
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        match event_type {
            EVENT_TYPE_SYSTEM_HOOK => Some(HookClass::System),
            EVENT_TYPE_PUSH_HOOK => Some(HookClass::Web),
            _ => None,
        }
    }

    /// Returns `true` if a rule for this hook class may subscribe to `kind`.
    pub fn recognises(self, kind: EventKind) -> bool {
        match self {
            HookClass::System | HookClass::Web => matches!(kind, EventKind::Push),
        }
    }

    /// Name used in configuration and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            HookClass::System => "system hook",
            HookClass::Web => "web hook",
        }
    }
}

impl std::fmt::Display for HookClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
