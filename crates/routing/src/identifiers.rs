//! Newtype identifiers.
//!
//! Names that travel across the routing boundary are wrapped in distinct
//! newtypes so that a destination topic can never be confused with an event
//! correlation identifier, even though both are strings on the wire.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id! {
    /// Destination topic on the message bus.
    ///
    /// Never empty: a routing decision that selects no destination is
    /// expressed as `None`, not as an empty topic.
    TopicName
}

string_id! {
    /// Correlation identifier of one hook delivery (`X-Gitlab-Event-UUID`).
    EventId
}

// ---------------------------------------------------------------------------
// Repository coordinates
// ---------------------------------------------------------------------------

/// The `(owner, repo)` pair a hook delivery belongs to.
///
/// `owner` is the project namespace (organisation or user); `repo` is the
/// project name. Either may be empty if the payload omitted it; such events
/// simply match only catch-all rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RepoCoordinates {
    /// Project namespace.
    pub owner: String,
    /// Project name.
    pub repo: String,
}

impl RepoCoordinates {
    /// Creates coordinates from an owner and a repository name.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Returns the `owner/repo` form used by repo filters.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl std::fmt::Display for RepoCoordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}
