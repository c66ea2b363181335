//! keygate core library: the credential and session control plane.
//!
//! `keygate-core` owns every piece of state-bearing logic in keygate and is
//! free of HTTP types; the transport adapter (`keygate-web`)
//! only translates requests into calls on the services exported here.
//!
//! # Modules
//!
//! - [`hasher`]: one-way credential hashing (Argon2id, self-describing digests).
//! - [`token`]: signed, time-bounded bearer tokens.
//! - [`reset`]: the two-phase password-reset handshake.
//! - [`rate_limit`]: fixed-window per-client request counting.
//! - [`cache`]: the lookup-only response cache gate.
//! - [`auth`]: bearer-token gate and the typed per-request context.
//! - [`accounts`]: registration, login and profile lookups.
//! - [`store`], [`records`], [`notifier`]: boundary traits for the secret
//!   store, the user record store and the out-of-band message sender.
//! - [`validation`], [`requests`]: typed request payloads and field checks.
//! - [`config`]: serde-loadable settings for each component.
//! - [`error`]: the shared error taxonomy ([`CoreError`], [`CoreResult`]).

pub mod accounts;
pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod hasher;
pub mod notifier;
pub mod rate_limit;
pub mod records;
pub mod requests;
pub mod reset;
pub mod store;
pub mod token;
pub mod validation;

pub use accounts::{AccountService, Session};
pub use auth::{AuthGate, RequestContext};
pub use cache::{CacheLookup, ResponseCache};
pub use config::{
    AuthSettings, CacheSettings, DependencySettings, RateLimitSettings, ResetSettings,
    UnknownAccountPolicy,
};
pub use context::CoreContext;
pub use error::{CoreError, CoreResult};
pub use hasher::{CredentialHasher, HashCost, HashError};
pub use notifier::{LogNotifier, Notifier, NotifyError, WebhookNotifier};
pub use rate_limit::{RateDecision, RateLimiter};
pub use records::{MemoryRecordStore, RecordError, RecordStore, UserId, UserRecord};
pub use requests::{LoginRequest, PasswordRecoveryRequest, RegisterRequest, ResetPasswordRequest};
pub use reset::{PasswordResetFlow, ResetError};
pub use store::{MemoryStore, RedisStore, SecretStore, StoreError};
pub use token::{IssuedToken, TokenError, TokenIssuer};
pub use validation::{FieldError, Validate};
