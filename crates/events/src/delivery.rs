//! Webhook delivery.
//!
//! One HTTP POST per matched subscription, at most once per event
//! occurrence. A failed delivery is logged by the dispatcher and never
//! retried; job-state correctness never depends on it.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use zrep_core::signing::compute_webhook_signature;

use crate::event::WebhookEvent;
use crate::subscription::Subscription;

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for webhook delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The payload could not be encoded as JSON.
    #[error("Failed to encode webhook payload: {0}")]
    Encode(#[from] serde_json::Error),

    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

/// Delivers tier events to subscriber callback URLs.
pub struct WebhookDelivery {
    client: reqwest::Client,
}

impl WebhookDelivery {
    /// Create a new delivery service with a pre-configured HTTP client.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client }
    }

    /// Deliver one event to one subscription.
    ///
    /// The body is serialized once so the HMAC signature (when the
    /// subscription carries a secret) covers the exact bytes sent.
    pub async fn send(
        &self,
        subscription: &Subscription,
        event: &WebhookEvent,
    ) -> Result<(), DeliveryError> {
        let body = serde_json::to_string(event)?;

        let mut request = self
            .client
            .post(&subscription.callback_url)
            .header(CONTENT_TYPE, "application/json")
            .header("x-zrep-event", event.event.as_str())
            .header("x-zrep-subscription-id", &subscription.id);

        if let Some(secret) = &subscription.secret {
            request = request.header(
                "x-zrep-signature",
                compute_webhook_signature(secret, &body),
            );
        }

        let response = request.body(body).send().await?;
        if !response.status().is_success() {
            return Err(DeliveryError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

impl Default for WebhookDelivery {
    fn default() -> Self {
        Self::new()
    }
}
