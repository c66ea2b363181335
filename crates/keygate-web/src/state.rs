use std::sync::Arc;

use keygate_core::{
    AccountService, AuthGate, CoreContext, PasswordResetFlow, RateLimiter, ResponseCache,
};

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub accounts: Arc<AccountService>,
    pub reset: Arc<PasswordResetFlow>,
    pub limiter: Arc<RateLimiter>,
    pub cache: Arc<ResponseCache>,
    pub gate: Arc<AuthGate>,
}

impl AppState {
    pub fn new(config: ServerConfig, context: &CoreContext) -> Self {
        Self {
            accounts: Arc::new(AccountService::new(context, config.auth.token_ttl())),
            reset: Arc::new(PasswordResetFlow::new(context, config.reset.clone())),
            limiter: Arc::new(RateLimiter::new(context, &config.rate_limit)),
            cache: Arc::new(ResponseCache::new(context, &config.cache)),
            gate: Arc::new(AuthGate::new(context.issuer.clone())),
            config: Arc::new(config),
        }
    }
}
