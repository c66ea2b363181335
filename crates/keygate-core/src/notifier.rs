//! Out-of-band message delivery (SMS gateway).

use std::time::Duration;

use async_trait::async_trait;

use crate::store::TimedOut;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    #[error("notifier rejected message: {0}")]
    Rejected(String),

    #[error("notifier unreachable: {0}")]
    Unreachable(String),

    #[error("notifier call timed out after {0:?}")]
    Timeout(Duration),
}

impl TimedOut for NotifyError {
    fn timed_out(after: Duration) -> Self {
        NotifyError::Timeout(after)
    }
}

/// Fire-and-confirm delivery: `Ok` means the gateway accepted the message,
/// not that it reached the handset.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError>;
}

/// Posts `{ "to": .., "message": .. }` to an SMS gateway webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Unreachable(e.to_string()))?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError> {
        let body = serde_json::json!({
            "to": destination,
            "message": message,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(format!(
                "SMS gateway responded {}",
                response.status()
            )));
        }

        tracing::debug!("SMS dispatched to {}", mask_destination(destination));
        Ok(())
    }
}

/// Development notifier: logs instead of sending. The message body (which may
/// contain a reset link) is only logged at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError> {
        tracing::info!("SMS delivery disabled; would send to {}", mask_destination(destination));
        tracing::debug!("SMS body for {destination}: {message}");
        Ok(())
    }
}

/// Keeps the country prefix and last four digits: `+155***4567`.
pub fn mask_destination(destination: &str) -> String {
    let chars: Vec<char> = destination.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}***{tail}")
}
