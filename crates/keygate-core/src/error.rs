//! Error types for `keygate-core`.
//!
//! Each component reports failures through its own enum. The `From`
//! conversions in this module are the single place where a component
//! failure is assigned a kind from the shared taxonomy, so the transport
//! layer only ever has to map [`CoreError`] to a wire status.

use crate::hasher::HashError;
use crate::notifier::NotifyError;
use crate::records::RecordError;
use crate::reset::ResetError;
use crate::store::StoreError;
use crate::token::TokenError;
use crate::validation::FieldError;

/// The error taxonomy exposed to the transport layer.
///
/// Messages carried by `NotFound` and `Conflict` are authored by this crate
/// and safe to show to callers. `DependencyUnavailable` and `Internal` carry
/// diagnostic detail that must stay server-side.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// One or more request fields failed validation.
    #[error("validation failed for {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    /// An identity or ticket does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A credential or bearer token was absent or invalid.
    #[error("unauthorized")]
    Unauthorized,

    /// The request collides with existing state (duplicate registration).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The client has used up its request allowance for the current window.
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// A store or notifier could not be reached in time.
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// Anything unexpected.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Stable, machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "validation_failure",
            CoreError::NotFound(_) => "not_found",
            CoreError::Unauthorized => "unauthorized",
            CoreError::Conflict(_) => "conflict",
            CoreError::RateLimitExceeded => "rate_limit_exceeded",
            CoreError::DependencyUnavailable(_) => "dependency_unavailable",
            CoreError::Internal(_) => "internal",
        }
    }
}

/// Convenience alias used throughout `keygate-core`.
pub type CoreResult<T> = Result<T, CoreError>;

impl From<HashError> for CoreError {
    fn from(e: HashError) -> Self {
        CoreError::Internal(e.to_string())
    }
}

impl From<TokenError> for CoreError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Signing(msg) => CoreError::Internal(format!("token signing failed: {msg}")),
            TokenError::Malformed | TokenError::SignatureInvalid | TokenError::Expired => {
                CoreError::Unauthorized
            }
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        CoreError::DependencyUnavailable(e.to_string())
    }
}

impl From<NotifyError> for CoreError {
    fn from(e: NotifyError) -> Self {
        CoreError::DependencyUnavailable(e.to_string())
    }
}

impl From<RecordError> for CoreError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::DuplicateMobile => {
                CoreError::Conflict("an account with this mobile number already exists".to_string())
            }
            RecordError::Missing(id) => CoreError::NotFound(format!("user {id}")),
            RecordError::Unavailable(_) | RecordError::Timeout(_) => {
                CoreError::DependencyUnavailable(e.to_string())
            }
        }
    }
}

impl From<ResetError> for CoreError {
    fn from(e: ResetError) -> Self {
        match e {
            ResetError::Validation(fields) => CoreError::Validation(fields),
            ResetError::InvalidOrExpiredTicket => {
                CoreError::NotFound("invalid or expired reset ticket".to_string())
            }
            ResetError::UnknownAccount => {
                CoreError::NotFound("no account is registered for this mobile number".to_string())
            }
            ResetError::InitiationFailed(msg) => CoreError::DependencyUnavailable(msg),
            ResetError::TicketLookup(e) => e.into(),
            ResetError::Records(e) | ResetError::CredentialUpdate(e) => e.into(),
            ResetError::Hashing(e) => e.into(),
        }
    }
}
