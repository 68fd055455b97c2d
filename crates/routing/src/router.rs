//! Topic resolution.
//!
//! [`topic_for`] combines rule selection with the rule's event subscription.
//! `None` covers both "no rule applies to this repository" and "the rule does
//! not subscribe to this event kind"; callers treat the two identically and
//! drop the event.

use crate::config::Configuration;
use crate::events::EventKind;
use crate::identifiers::{RepoCoordinates, TopicName};

/// Resolves the destination topic for an event.
///
/// `event_kind` is the normalised (lower-cased) kind taken from the payload.
/// Kinds outside the recognised vocabulary never route.
pub fn topic_for(
    config: &Configuration,
    coordinates: &RepoCoordinates,
    event_kind: &str,
) -> Option<TopicName> {
    let kind = EventKind::parse(event_kind)?;

    config.resolve(coordinates)?.topic_for(kind)
}
