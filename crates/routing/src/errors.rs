//! Error types for the routing domain.
//!
//! [`ConfigError`] is fatal at load time: the relay never serves traffic with
//! a configuration that failed validation. [`DeliveryError`] and
//! [`PublishError`] are per-event and never escalate beyond a log entry.

use thiserror::Error;

use crate::events::HookClass;
use crate::identifiers::RepoCoordinates;

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors produced while loading or validating routing configuration.
///
/// `rule` identifies the offending entry as it appears in the document, e.g.
/// `config_items[2]` or `default`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A rule has an empty `topic`.
    #[error("{rule}: missing topic")]
    MissingTopic {
        /// Offending rule.
        rule: String,
    },

    /// A rule lists both system hook and web hook events.
    #[error("{rule}: don't set system hook and web hook at same time")]
    ConflictingHookEvents {
        /// Offending rule.
        rule: String,
    },

    /// A rule subscribes to an event kind outside the recognised set for its
    /// hook class.
    #[error("{rule}: includes invalid {class} event '{event}'")]
    UnrecognisedEvent {
        /// Offending rule.
        rule: String,
        /// Hook class whose event list contained the entry.
        class: HookClass,
        /// The unrecognised entry, verbatim.
        event: String,
    },

    /// A `repos` or `excluded_repos` entry is malformed or ineffective.
    #[error("{rule}: invalid repo filter: {reason}")]
    InvalidRepoFilter {
        /// Offending rule.
        rule: String,
        /// What is wrong with the filter.
        reason: String,
    },

    /// The document could not be parsed into the configuration shape.
    #[error("failed to parse configuration: {message}")]
    Parse {
        /// Parser diagnostic.
        message: String,
    },

    /// No configuration snapshot is available to serve a request.
    #[error("configuration unavailable: {message}")]
    Unavailable {
        /// Why the snapshot could not be produced.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Delivery errors
// ---------------------------------------------------------------------------

/// Reasons an authenticated event was not dispatched.
///
/// None of these are reported to the hook sender; the coordinator logs them
/// and drops the event.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The payload is not a JSON document of the expected shape.
    #[error("failed to decode hook payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// No rule applies to the repository, or the applicable rule does not
    /// subscribe to this event kind.
    #[error("no match topic for {kind} event from {coordinates}")]
    NoMatchingTopic {
        /// Repository the event came from.
        coordinates: RepoCoordinates,
        /// Normalised event kind, verbatim (it may not be a recognised kind).
        kind: String,
    },

    /// The configuration accessor failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Publish errors
// ---------------------------------------------------------------------------

/// Errors returned by a [`crate::Publisher`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// A broker address could not be parsed.
    #[error("invalid broker address '{address}': {message}")]
    InvalidAddress {
        /// The address as configured.
        address: String,
        /// Parser diagnostic.
        message: String,
    },

    /// The broker connection could not be established.
    #[error("failed to connect to broker: {message}")]
    Connect {
        /// Client diagnostic.
        message: String,
    },

    /// The broker rejected the message or the publish timed out.
    #[error("failed to publish to topic '{topic}': {message}")]
    Transport {
        /// Destination topic.
        topic: String,
        /// Client diagnostic.
        message: String,
    },
}
