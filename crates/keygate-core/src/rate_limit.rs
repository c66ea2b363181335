//! Fixed-window request limiter keyed by client identity.
//!
//! The counter lives in the shared secret store so every instance sees the
//! same count. The limiter fails open: if the store cannot be reached the
//! request is allowed and a warning is logged.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::RateLimitSettings;
use crate::context::CoreContext;
use crate::error::{CoreError, CoreResult};
use crate::store::{bounded, SecretStore};

pub const RATE_KEY_PREFIX: &str = "rate_limit:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Denied,
}

impl RateDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, RateDecision::Allowed)
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    secrets: Arc<dyn SecretStore>,
    limit: u64,
    window: Duration,
    call_timeout: Duration,
}

impl RateLimiter {
    pub fn new(context: &CoreContext, settings: &RateLimitSettings) -> Self {
        Self {
            secrets: context.secrets.clone(),
            limit: settings.limit,
            window: settings.window(),
            call_timeout: context.call_timeout,
        }
    }

    /// Counts one request for `client` and decides whether it may proceed.
    /// Rejected requests still count toward the window.
    pub async fn check(&self, client: &str) -> RateDecision {
        let key = format!("{RATE_KEY_PREFIX}{client}");

        let count = match bounded(self.call_timeout, self.secrets.incr(&key)).await {
            Ok(count) => count,
            Err(e) => {
                warn!("Rate limiter store unavailable, allowing {client}: {e}");
                return RateDecision::Allowed;
            }
        };

        if count == 1 {
            self.open_window(&key).await;
        }

        if count > 0 && count as u64 > self.limit {
            debug!("Rate limit exceeded for {client} ({count}/{})", self.limit);
            RateDecision::Denied
        } else {
            RateDecision::Allowed
        }
    }

    /// Like [`check`](Self::check) but reports a denial as
    /// [`CoreError::RateLimitExceeded`].
    pub async fn enforce(&self, client: &str) -> CoreResult<()> {
        if self.check(client).await.is_allowed() {
            Ok(())
        } else {
            Err(CoreError::RateLimitExceeded)
        }
    }

    async fn open_window(&self, key: &str) {
        match bounded(self.call_timeout, self.secrets.expire(key, self.window)).await {
            Ok(true) => {}
            Ok(false) => warn!("Rate counter {key} vanished before its window was set"),
            Err(e) => {
                warn!("Failed to set rate window on {key}: {e}");
                // A counter without a TTL would never reset.
                if let Err(e) = bounded(self.call_timeout, self.secrets.delete(key)).await {
                    warn!("Failed to drop unbounded rate counter {key}: {e}");
                }
            }
        }
    }
}
