//! HTTP surface of the relay.
//!
//! # Endpoints
//!
//! - `POST /gitlab-hook` - Accepts GitLab hook deliveries (returns 200 once authenticated)
//! - `GET /` - Returns 200 if the server is running

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use bytes::Bytes;
use delivery::DeliveryCoordinator;
use routing::{HookClass, InboundEvent, InboundHeaders};
use tracing::{debug, info_span};

use crate::auth::{validate_webhook, WebhookRejection};

/// Body of every acknowledged delivery.
pub const ACKNOWLEDGEMENT: &str = "Event received.";

/// Supplies the current shared secret; called once per request so the
/// secret can be rotated without restarting.
pub type SecretProvider = Arc<dyn Fn() -> String + Send + Sync>;

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    coordinator: Arc<DeliveryCoordinator>,
    secret: SecretProvider,
}

impl AppState {
    pub fn new(coordinator: Arc<DeliveryCoordinator>, secret: SecretProvider) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                coordinator,
                secret,
            }),
        }
    }

    /// Returns the delivery coordinator.
    pub fn coordinator(&self) -> &DeliveryCoordinator {
        &self.inner.coordinator
    }

    /// Returns the current shared secret.
    pub fn secret(&self) -> String {
        (self.inner.secret)()
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/gitlab-hook", post(hook_handler))
        .route("/", get(health_handler))
        .with_state(app_state)
}

/// Health check handler.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Hook handler.
///
/// Authenticates the delivery, then acknowledges it unconditionally: the
/// response never reflects whether the event was routed or published.
/// Deliveries whose event type the relay does not forward are acknowledged
/// and ignored.
pub async fn hook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, WebhookRejection> {
    let hook = validate_webhook(&headers, &app_state.secret())?;

    let span = info_span!(
        "hook",
        event_type = %hook.event_type,
        event_id = hook.event_id.as_ref().map(|id| id.as_str()).unwrap_or_default(),
    );

    span.in_scope(|| match HookClass::from_event_type(&hook.event_type) {
        Some(class) => app_state.coordinator().handle(InboundEvent {
            hook: class,
            event_id: hook.event_id.clone(),
            headers: inbound_headers(&headers),
            payload: body,
        }),
        None => debug!("ignoring unsupported event type"),
    });

    Ok(ACKNOWLEDGEMENT)
}

fn inbound_headers(headers: &HeaderMap) -> InboundHeaders {
    InboundHeaders::from_pairs(
        headers
            .iter()
            .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?.to_string()))),
    )
}
