//! Webhook endpoint handler.
//!
//! Verifies the delivery's signature, decodes `push` events, and runs the
//! four-eyes pipeline inline. The response is sent once a status has been
//! published (or the push was found irrelevant).

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::AppState;
use crate::effects::GitHubConnector;
use crate::pipeline::{PipelineError, PushOutcome, handle_push};
use crate::types::DeliveryId;
use crate::webhooks::{
    EventKind, PayloadError, SignatureError, decode_verified, parse_push_event, verify_signature,
};

/// Header name for GitHub event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID.
const HEADER_DELIVERY: &str = "x-github-delivery";
/// Header name for the HMAC-SHA256 signature.
const HEADER_SIGNATURE_256: &str = "x-hub-signature-256";
/// Header name for the legacy HMAC-SHA1 signature.
const HEADER_SIGNATURE: &str = "x-hub-signature";

/// Errors that can occur when processing a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Missing required header.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// The signature did not verify.
    #[error("invalid signature: {0}")]
    InvalidSignature(SignatureError),

    /// Invalid JSON body.
    #[error("invalid JSON body: {0}")]
    InvalidJson(serde_json::Error),

    /// No status could be published for a protected push.
    #[error("{0}")]
    Pipeline(#[from] PipelineError),
}

impl From<PayloadError> for WebhookError {
    fn from(err: PayloadError) -> Self {
        match err {
            PayloadError::Signature(e) => WebhookError::InvalidSignature(e),
            PayloadError::Json(e) => WebhookError::InvalidJson(e),
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            WebhookError::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
            WebhookError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            WebhookError::Pipeline(_) => StatusCode::BAD_GATEWAY,
        };

        // Details stay in the logs; callers only learn the status code.
        (status, status.canonical_reason().unwrap_or_default()).into_response()
    }
}

/// Webhook handler.
///
/// # Request
///
/// - Method: POST
/// - Headers:
///   - `X-GitHub-Event` (required): `push`, `ping`, or anything else
///   - `X-Hub-Signature-256` or `X-Hub-Signature`: HMAC of the body
///   - `X-GitHub-Delivery` (optional): only logged
/// - Body: JSON webhook payload
///
/// # Response
///
/// - 204 No Content: handled (including ignored events and refs)
/// - 400 Bad Request: missing event header or invalid JSON
/// - 401 Unauthorized: signature missing or wrong
/// - 502 Bad Gateway: no status could be published
pub async fn webhook_handler<C: GitHubConnector>(
    State(app_state): State<AppState<C>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    let event_type = get_header(&headers, HEADER_EVENT)
        .inspect_err(|e| warn!(error = %e, "Rejected webhook"))?;
    let event = EventKind::from_header(&event_type);
    let delivery_id = get_header(&headers, HEADER_DELIVERY)
        .map(DeliveryId::new)
        .unwrap_or_else(|_| DeliveryId::new("unknown"));

    debug!(delivery_id = %delivery_id, event_type = %event, "Received webhook");

    let signature = signature_header(&headers);

    match event {
        EventKind::Ping => {
            verify_signature(&body, signature, app_state.webhook_secret()).map_err(|e| {
                warn!(delivery_id = %delivery_id, error = %e, "Rejected ping");
                WebhookError::InvalidSignature(e)
            })?;
            info!(delivery_id = %delivery_id, "Ping received");
            Ok(StatusCode::NO_CONTENT)
        }
        EventKind::Push => {
            let push = decode_verified(
                &body,
                signature,
                app_state.webhook_secret(),
                parse_push_event,
            )
            .map_err(|e| {
                warn!(delivery_id = %delivery_id, error = %e, "Rejected push delivery");
                WebhookError::from(e)
            })?;

            let outcome = handle_push(
                app_state.connector(),
                app_state.protected_refs(),
                app_state.pipeline(),
                &push,
                app_state.shutdown(),
            )
            .await
            .inspect_err(|e| {
                warn!(delivery_id = %delivery_id, error = %e, "Push left without a status");
            })?;

            if let PushOutcome::Reported(report) = outcome {
                debug!(
                    delivery_id = %delivery_id,
                    sha = push.head_sha.short(),
                    state = %report.state,
                    "Push handled"
                );
            }
            Ok(StatusCode::NO_CONTENT)
        }
        EventKind::Other(name) => {
            debug!(delivery_id = %delivery_id, event_type = %name, "Ignoring event");
            Ok(StatusCode::NO_CONTENT)
        }
    }
}

/// Extracts a required header value as a string.
fn get_header(headers: &HeaderMap, name: &'static str) -> Result<String, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or(WebhookError::MissingHeader(name))
}

/// The signature header to verify against, preferring SHA-256.
fn signature_header(headers: &HeaderMap) -> Option<&str> {
    [HEADER_SIGNATURE_256, HEADER_SIGNATURE]
        .into_iter()
        .filter_map(|name| headers.get(name).and_then(|v| v.to_str().ok()))
        .find(|v| !v.trim().is_empty())
}
