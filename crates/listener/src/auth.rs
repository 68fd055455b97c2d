//! GitLab hook authentication.
//!
//! GitLab authenticates hook deliveries with a shared secret sent verbatim in
//! the `X-Gitlab-Token` header. A delivery passes when it names its event
//! type, carries a JSON body, and presents the configured token.

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use routing::events::{HEADER_CONTENT_TYPE, HEADER_EVENT, HEADER_EVENT_UUID, HEADER_TOKEN};
use routing::EventId;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Why a delivery was refused before it reached the coordinator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookRejection {
    /// The delivery did not name its event type.
    #[error("400 Bad Request: Missing X-Gitlab-Event Header")]
    MissingEventType,

    /// The body is not declared as JSON.
    #[error("400 Bad Request: Hook only accepts content-type: application/json")]
    UnsupportedContentType,

    /// The token is missing or does not match the configured secret.
    #[error("401 Unauthorized: Invalid X-Gitlab-Token")]
    InvalidToken,
}

impl IntoResponse for WebhookRejection {
    fn into_response(self) -> Response {
        let status = match self {
            WebhookRejection::MissingEventType | WebhookRejection::UnsupportedContentType => {
                StatusCode::BAD_REQUEST
            }
            WebhookRejection::InvalidToken => StatusCode::UNAUTHORIZED,
        };

        (status, self.to_string()).into_response()
    }
}

/// The authenticated identity of a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedHook {
    /// Value of `X-Gitlab-Event`.
    pub event_type: String,
    /// Value of `X-Gitlab-Event-UUID`, if present and non-empty.
    pub event_id: Option<EventId>,
}

/// Checks a delivery's headers against the shared secret.
pub fn validate_webhook(headers: &HeaderMap, secret: &str) -> Result<ValidatedHook, WebhookRejection> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let event_type = header(HEADER_EVENT)
        .filter(|v| !v.is_empty())
        .ok_or(WebhookRejection::MissingEventType)?;

    let is_json = header(HEADER_CONTENT_TYPE)
        .and_then(|v| v.split(';').next())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("application/json"));
    if !is_json {
        return Err(WebhookRejection::UnsupportedContentType);
    }

    let token = header(HEADER_TOKEN).ok_or(WebhookRejection::InvalidToken)?;
    if !token_matches(token, secret) {
        return Err(WebhookRejection::InvalidToken);
    }

    Ok(ValidatedHook {
        event_type: event_type.to_string(),
        event_id: header(HEADER_EVENT_UUID).and_then(EventId::new),
    })
}

/// Compares in time independent of where the first differing byte is.
/// Length differences are not hidden.
fn token_matches(presented: &str, secret: &str) -> bool {
    bool::from(presented.as_bytes().ct_eq(secret.as_bytes()))
}
