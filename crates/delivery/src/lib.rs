//! Hook Delivery coordinator.
//!
//! Turns an authenticated hook event into at most one asynchronous publish:
//! the payload is decoded for its routing keys, the [`routing`] crate picks a
//! topic, and the original bytes are published on a spawned task with an
//! allow-listed projection of the inbound headers.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** The coordinator sequences calls between the
//! routing domain and the [`routing::Publisher`] port. It contains no routing
//! rules of its own.
//!
//! ## Failure Model
//!
//! Nothing here is reported to the hook sender. Malformed payloads, routing
//! misses, and publish failures are logged and the event is dropped; there is
//! no retry and no persistence.

pub mod coordinator;

pub use coordinator::DeliveryCoordinator;
