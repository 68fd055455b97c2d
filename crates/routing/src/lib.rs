//! Routing domain for Hook Delivery.
//!
//! This crate decides, per source repository and per event kind, whether a
//! GitLab hook delivery should be forwarded and to which message bus topic.
//! Infrastructure crates implement the traits defined here; they never add
//! routing rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`TopicName`, `EventId`) and repo coordinates |
//! | [`events`] | Event kinds, hook classes, and wire header names |
//! | [`filter`] | Repo filters and first-match rule selection |
//! | [`config`] | Routing rules (`BotConfig`) and the `Configuration` snapshot |
//! | [`router`] | `topic_for`: rule selection + event subscription |
//! | [`message`] | Inbound events and outbound message projection |
//! | [`snapshot`] | Lock-free swappable configuration cell |
//! | [`ports`] | `Publisher` and `ConfigProvider` traits |
//! | [`errors`] | Configuration, delivery, and publish errors |

pub mod config;
pub mod errors;
pub mod events;
pub mod filter;
pub mod identifiers;
pub mod message;
pub mod ports;
pub mod router;
pub mod snapshot;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use config::{BotConfig, Configuration};
pub use errors::{ConfigError, DeliveryError, PublishError};
pub use events::{EventKind, HookClass};
pub use filter::{find_first, RepoFilter, RepoScoped};
pub use identifiers::{EventId, RepoCoordinates, TopicName};
pub use message::{EventBody, InboundEvent, InboundHeaders, OutboundMessage};
pub use ports::{ConfigProvider, Publisher};
pub use router::topic_for;
pub use snapshot::SharedConfig;
