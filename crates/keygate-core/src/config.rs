//! Component settings.
//!
//! Each struct deserializes from its own TOML table with every field
//! optional; the defaults below are the production defaults.

use std::time::Duration;

use serde::Deserialize;

use crate::hasher::HashCost;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u64,
    #[serde(default)]
    pub hash_cost: HashCost,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_rate_limit")]
    pub limit: u64,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

/// What reset initiation tells the caller when no account matches the mobile number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownAccountPolicy {
    /// Answer exactly as if a message had been sent.
    #[default]
    Conceal,
    /// Report that no account exists.
    Reveal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetSettings {
    #[serde(default = "default_ticket_ttl_seconds")]
    pub ticket_ttl_seconds: u64,
    #[serde(default = "default_link_base")]
    pub link_base: String,
    #[serde(default)]
    pub unknown_account: UnknownAccountPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: u64,
}

/// Deadline applied to every secret store, record store and notifier call.
#[derive(Debug, Clone, Deserialize)]
pub struct DependencySettings {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_token_ttl_hours() -> u64 { 72 }
fn default_rate_limit() -> u64 { 100 }
fn default_window_seconds() -> u64 { 60 }
fn default_ticket_ttl_seconds() -> u64 { 15 * 60 }
fn default_link_base() -> String { "https://keygate.local/reset-password".to_string() }
fn default_cache_ttl_seconds() -> u64 { 60 }
fn default_timeout_ms() -> u64 { 3_000 }

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_hours: default_token_ttl_hours(),
            hash_cost: HashCost::default(),
        }
    }
}

impl AuthSettings {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_hours.saturating_mul(3600))
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            limit: default_rate_limit(),
            window_seconds: default_window_seconds(),
        }
    }
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

impl Default for ResetSettings {
    fn default() -> Self {
        Self {
            ticket_ttl_seconds: default_ticket_ttl_seconds(),
            link_base: default_link_base(),
            unknown_account: UnknownAccountPolicy::default(),
        }
    }
}

impl ResetSettings {
    pub fn ticket_ttl(&self) -> Duration {
        Duration::from_secs(self.ticket_ttl_seconds)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { ttl_seconds: default_cache_ttl_seconds() }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Default for DependencySettings {
    fn default() -> Self {
        Self { timeout_ms: default_timeout_ms() }
    }
}

impl DependencySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        assert_eq!(AuthSettings::default().token_ttl(), Duration::from_secs(72 * 3600));
        assert_eq!(RateLimitSettings::default().limit, 100);
        assert_eq!(RateLimitSettings::default().window(), Duration::from_secs(60));
        assert_eq!(ResetSettings::default().ticket_ttl(), Duration::from_secs(900));
        assert_eq!(ResetSettings::default().unknown_account, UnknownAccountPolicy::Conceal);
        assert_eq!(DependencySettings::default().timeout(), Duration::from_secs(3));
    }

    #[test]
    fn huge_token_ttl_hours_saturates() {
        let auth: AuthSettings = serde_json::from_str(r#"{"token_ttl_hours":18446744073709551615}"#).unwrap();
        assert_eq!(auth.token_ttl(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn partial_tables_fill_in_defaults() {
        let reset: ResetSettings = serde_json::from_str(r#"{"unknown_account":"reveal"}"#).unwrap();
        assert_eq!(reset.unknown_account, UnknownAccountPolicy::Reveal);
        assert_eq!(reset.ticket_ttl_seconds, 900);

        let auth: AuthSettings =
            serde_json::from_str(r#"{"hash_cost":{"memory_kib":65536}}"#).unwrap();
        assert_eq!(auth.hash_cost.memory_kib, 65536);
        assert_eq!(auth.hash_cost.iterations, HashCost::default().iterations);
    }
}
