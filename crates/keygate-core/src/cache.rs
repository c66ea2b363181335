//! Read-through response cache for idempotent reads.
//!
//! Entries are keyed by a fingerprint of the request path only. Only routes
//! whose response does not depend on the caller may be cached; identity
//! scoped reads must never pass through this gate.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::CacheSettings;
use crate::context::CoreContext;
use crate::store::{bounded, SecretStore};

pub const CACHE_KEY_PREFIX: &str = "response_cache:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// A stored JSON body to return as-is.
    Hit(String),
    Miss,
}

/// Collapses repeated slashes, drops any query string and trailing slash so
/// that `/api/users/` and `/api/users` share an entry.
pub fn fingerprint(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

#[derive(Clone)]
pub struct ResponseCache {
    secrets: Arc<dyn SecretStore>,
    ttl: Duration,
    call_timeout: Duration,
}

impl ResponseCache {
    pub fn new(context: &CoreContext, settings: &CacheSettings) -> Self {
        Self {
            secrets: context.secrets.clone(),
            ttl: settings.ttl(),
            call_timeout: context.call_timeout,
        }
    }

    fn key(path: &str) -> String {
        format!("{CACHE_KEY_PREFIX}{}", fingerprint(path))
    }

    /// A store failure is reported as a miss; the request then runs normally.
    pub async fn lookup(&self, path: &str) -> CacheLookup {
        let key = Self::key(path);
        match bounded(self.call_timeout, self.secrets.get(&key)).await {
            Ok(Some(body)) => {
                debug!("Cache hit for {key}");
                CacheLookup::Hit(body)
            }
            Ok(None) => CacheLookup::Miss,
            Err(e) => {
                warn!("Cache lookup for {key} failed, treating as miss: {e}");
                CacheLookup::Miss
            }
        }
    }

    /// Stores a rendered body. Failures are logged and otherwise ignored.
    pub async fn populate(&self, path: &str, body: &str) {
        let key = Self::key(path);
        if let Err(e) = bounded(self.call_timeout, self.secrets.set_with_ttl(&key, body, self.ttl)).await {
            warn!("Failed to populate cache entry {key}: {e}");
        }
    }
}
