use std::net::SocketAddr;
use std::path::PathBuf;

use keygate_core::{AuthSettings, CacheSettings, DependencySettings, RateLimitSettings, ResetSettings};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Use `X-Forwarded-For` / `X-Real-IP` as the client identity. Enable only
    /// behind a proxy that overwrites them.
    #[serde(default)]
    pub trust_proxy_headers: bool,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub reset: ResetSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub dependencies: DependencySettings,
    #[serde(default)]
    pub backends: BackendConfig,
}

/// External services. Each one left unset falls back to its in-process stand-in.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default)]
    pub sms_webhook_url: Option<String>,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            trust_proxy_headers: false,
            auth: AuthSettings::default(),
            rate_limit: RateLimitSettings::default(),
            reset: ResetSettings::default(),
            cache: CacheSettings::default(),
            dependencies: DependencySettings::default(),
            backends: BackendConfig::default(),
        }
    }
}

const WEAK_SECRETS: &[&str] = &[
    "change-me-to-a-random-secret",
    "your-secret-key",
    "secret",
    "password",
    "jwt-secret",
];

fn parse_flag(name: &str, val: &str) -> anyhow::Result<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{name} must be true or false, got {val:?}"),
    }
}

impl ServerConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("KEYGATE_CONFIG").map(PathBuf::from).ok();

        let mut config = if let Some(path) = config_path {
            let contents = std::fs::read_to_string(&path)?;
            toml::from_str(&contents)?
        } else {
            ServerConfig::default()
        };

        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.check_jwt_secret()?;
        Ok(config)
    }

    /// Applies `KEYGATE_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(addr) = lookup("KEYGATE_BIND_ADDR") {
            self.bind_addr = addr.parse()?;
        }
        if let Some(secret) = lookup("KEYGATE_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(url) = lookup("KEYGATE_REDIS_URL") {
            self.backends.redis_url = Some(url);
        }
        if let Some(url) = lookup("KEYGATE_SMS_WEBHOOK_URL") {
            self.backends.sms_webhook_url = Some(url);
        }
        if let Some(base) = lookup("KEYGATE_RESET_LINK_BASE") {
            self.reset.link_base = base;
        }
        if let Some(val) = lookup("KEYGATE_RATE_LIMIT") {
            self.rate_limit.limit = val.parse()?;
        }
        if let Some(val) = lookup("KEYGATE_RATE_WINDOW_SECONDS") {
            self.rate_limit.window_seconds = val.parse()?;
        }
        if let Some(val) = lookup("KEYGATE_TRUST_PROXY_HEADERS") {
            self.trust_proxy_headers = parse_flag("KEYGATE_TRUST_PROXY_HEADERS", &val)?;
        }
        Ok(())
    }

    /// Rejects placeholder secrets and fills in a random one when none is set.
    pub fn check_jwt_secret(&mut self) -> anyhow::Result<()> {
        if self.auth.jwt_secret.is_empty() {
            self.auth.jwt_secret = format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple());
            tracing::warn!(
                "No JWT secret configured. Generated random secret (tokens will not survive a restart)."
            );
            return Ok(());
        }

        if WEAK_SECRETS.iter().any(|&w| self.auth.jwt_secret == w) {
            anyhow::bail!(
                "JWT secret matches a known weak/placeholder value. \
                 Set a strong random secret via KEYGATE_JWT_SECRET."
            );
        }
        if self.auth.jwt_secret.len() < 32 {
            tracing::warn!(
                "JWT secret is shorter than 32 characters. \
                 Consider using a stronger secret via KEYGATE_JWT_SECRET."
            );
        }
        Ok(())
    }
}
