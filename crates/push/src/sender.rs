//! The push delivery seam.
//!
//! [`PushSender`] is the injected capability that attempts to deliver one
//! payload to one subscription endpoint. The scheduler only sees the
//! three-way [`SendOutcome`]; what "send" actually means (payload
//! encryption per RFC 8291, VAPID signing) stays behind the trait so the
//! core's tests can substitute a fake sender.
//!
//! [`WebPushSender`] is the bundled HTTP implementation: it POSTs an
//! already-encrypted payload to the endpoint URL and classifies the
//! response. Encryption is the service layer's concern, not this crate's.

use std::time::Duration;

use async_trait::async_trait;
use quillcast_db::models::push_subscription::PushSubscription;

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How long the push service may hold an undelivered notification.
const PUSH_TTL_SECS: u32 = 86_400;

/// Result of one delivery attempt to one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The push service accepted the notification.
    Delivered,

    /// The endpoint will never accept further pushes; the subscription
    /// must be revoked.
    PermanentFailure(String),

    /// The attempt failed for a reason that may clear (network, rate
    /// limit, 5xx); retry later, do not revoke.
    TransientFailure(String),
}

/// Capability that delivers one payload to one subscription endpoint.
#[async_trait]
pub trait PushSender: Send + Sync {
    /// Attempt delivery. Never returns an error: every failure mode is
    /// expressed through [`SendOutcome`].
    async fn send(&self, subscription: &PushSubscription, payload: &[u8]) -> SendOutcome;
}

/// Delivers payloads to Web Push endpoints over HTTP.
pub struct WebPushSender {
    client: reqwest::Client,
}

impl WebPushSender {
    /// Create a new sender with a pre-configured HTTP client.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client }
    }
}

impl Default for WebPushSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushSender for WebPushSender {
    async fn send(&self, subscription: &PushSubscription, payload: &[u8]) -> SendOutcome {
        let result = self
            .client
            .post(&subscription.endpoint)
            .header("TTL", PUSH_TTL_SECS)
            .body(payload.to_vec())
            .send()
            .await;

        match result {
            Ok(response) => classify_status(response.status().as_u16()),
            Err(e) if e.is_timeout() => {
                SendOutcome::TransientFailure(format!("Request timed out: {e}"))
            }
            Err(e) => SendOutcome::TransientFailure(format!("Request failed: {e}")),
        }
    }
}

/// Map a push service HTTP status to a delivery outcome.
///
/// 404/410 are the push services' unsubscribe signal (endpoint gone);
/// 429 and 5xx may clear on retry; any other non-success status means the
/// request itself is malformed for that endpoint and will never succeed.
fn classify_status(status: u16) -> SendOutcome {
    match status {
        200..=299 => SendOutcome::Delivered,
        404 | 410 => SendOutcome::PermanentFailure(format!("Endpoint gone (HTTP {status})")),
        413 => SendOutcome::PermanentFailure("Payload too large (HTTP 413)".to_string()),
        429 => SendOutcome::TransientFailure("Rate limited (HTTP 429)".to_string()),
        500..=599 => SendOutcome::TransientFailure(format!("Push service error (HTTP {status})")),
        other => SendOutcome::PermanentFailure(format!("Unexpected HTTP {other}")),
    }
}
