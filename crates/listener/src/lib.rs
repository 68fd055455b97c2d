//! Hook Delivery event source infrastructure.
//!
//! Binds the HTTP surface that receives GitLab hook deliveries (system hooks
//! and per-project push hooks), authenticates them with the shared
//! `X-Gitlab-Token` secret, and hands them to the
//! [`delivery::DeliveryCoordinator`].
//!
//! Authenticated deliveries are always acknowledged with `200 Event received.`;
//! the response does not reflect routing or publish outcomes.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Transport details and header handling live here. The
//! [`routing`] crate sees only [`routing::InboundEvent`].

pub mod auth;
pub mod server;

pub use auth::{validate_webhook, ValidatedHook, WebhookRejection};
pub use server::{build_router, AppState, SecretProvider, ACKNOWLEDGEMENT};
