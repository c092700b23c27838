//! Push-notification relay client.
//!
//! Delivery is fire-and-forget per recipient: the notifier logs failures and
//! moves on. No retries, no dead-lettering.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::PushConfig;

/// Notification sound attached to purchase events.
const PURCHASE_SOUND: &str = "purchase.wav";

/// Errors that can occur when sending a push notification.
#[derive(Debug, Error)]
pub enum PushError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Relay returned an error response.
    #[error("relay error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Client could not be constructed.
    #[error("configuration error: {0}")]
    Config(String),
}

/// A per-recipient push message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    /// Recipient device token.
    pub token: String,
    pub title: String,
    pub body: String,
    /// Platform-specific sound attribute.
    pub sound: String,
}

impl PushMessage {
    /// A purchase-event message with the standard sound.
    #[must_use]
    pub fn purchase_event(token: String, title: String, body: String) -> Self {
        Self {
            token,
            title,
            body,
            sound: PURCHASE_SOUND.to_string(),
        }
    }
}

/// A sink for per-recipient push messages.
///
/// Injected as a handle so fan-out can be tested without a live relay.
#[async_trait]
pub trait PushSender: Send + Sync {
    /// Deliver one message to one recipient.
    async fn send(&self, message: &PushMessage) -> Result<(), PushError>;
}

/// Push client backed by an HTTP relay (FCM-style keyed endpoint).
#[derive(Clone)]
pub struct RelayPushClient {
    client: reqwest::Client,
    endpoint: String,
}

impl RelayPushClient {
    /// Create a new relay client.
    ///
    /// # Errors
    ///
    /// Returns `PushError::Config` if the server key cannot form a header or
    /// the HTTP client fails to build.
    pub fn new(config: &PushConfig) -> Result<Self, PushError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("key={}", config.server_key.expose_secret());
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&auth_value)
                .map_err(|e| PushError::Config(format!("invalid server key: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl PushSender for RelayPushClient {
    async fn send(&self, message: &PushMessage) -> Result<(), PushError> {
        let body = serde_json::json!({
            "to": message.token,
            "notification": {
                "title": message.title,
                "body": message.body,
                "sound": message.sound,
            },
        });

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PushError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}
