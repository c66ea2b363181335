mod api;
mod auth;
mod config;
mod dto;
mod error;
mod middleware;
mod state;

use std::sync::Arc;

use axum::http::{header, Method};
use axum::middleware::from_fn;
use keygate_core::{
    CoreContext, CredentialHasher, LogNotifier, MemoryRecordStore, MemoryStore, Notifier,
    RedisStore, SecretStore, TokenIssuer, WebhookNotifier,
};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _env = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keygate_web=debug,keygate_core=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::load()?;
    let bind_addr = config.bind_addr;
    let call_timeout = config.dependencies.timeout();

    // Secret store: Redis when configured, otherwise in-process
    let (secrets, memory_store): (Arc<dyn SecretStore>, Option<MemoryStore>) =
        match &config.backends.redis_url {
            Some(url) => {
                let store = RedisStore::connect(url).await?;
                tracing::info!("Secret store: redis");
                (Arc::new(store), None)
            }
            None => {
                let store = MemoryStore::new();
                tracing::warn!("No redis_url configured. Using in-process secret store (single instance only).");
                (Arc::new(store.clone()), Some(store))
            }
        };

    let notifier: Arc<dyn Notifier> = match &config.backends.sms_webhook_url {
        Some(url) => {
            tracing::info!("SMS delivery via webhook");
            Arc::new(WebhookNotifier::new(url.clone(), call_timeout)?)
        }
        None => {
            tracing::warn!("No sms_webhook_url configured. Reset messages will only be logged.");
            Arc::new(LogNotifier)
        }
    };

    let context = CoreContext {
        records: Arc::new(MemoryRecordStore::new()),
        secrets,
        notifier,
        hasher: CredentialHasher::new(config.auth.hash_cost)?,
        issuer: TokenIssuer::new(&config.auth.jwt_secret),
        call_timeout,
    };

    let state = AppState::new(config, &context);

    // Expired-entry cleanup for the in-process store
    if let Some(store) = memory_store {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                store.purge_expired();
                tracing::debug!("Secret store purge: {} live entries", store.len());
            }
        });
    }

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let app = api::router(state)
        .layer(from_fn(middleware::security_headers::security_headers))
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("keygate-web listening on http://{}", bind_addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
