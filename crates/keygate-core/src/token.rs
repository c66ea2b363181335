//! Signed, time-bounded bearer tokens.
//!
//! Tokens are HS256 JWTs carrying `{sub, iat, exp}` with timestamps in
//! seconds since the epoch. Nothing about an issued token is persisted, so a
//! token cannot be revoked before it expires.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::records::UserId;

/// Lifetime of a login session token.
pub const SESSION_TOKEN_TTL: Duration = Duration::from_secs(72 * 3600);
/// Lifetime for narrower-purpose tokens.
pub const NARROW_TOKEN_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has expired")]
    Expired,

    #[error("token could not be signed: {0}")]
    Signing(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: u64,
}

/// Seconds since the Unix epoch according to the system clock.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer").finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the caller's clock in `verify_at`, with no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims = ["exp", "sub"].into_iter().map(String::from).collect();

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn issue(&self, subject: &UserId, ttl: Duration) -> Result<IssuedToken, TokenError> {
        self.issue_at(subject, ttl, unix_now())
    }

    pub fn issue_at(
        &self,
        subject: &UserId,
        ttl: Duration,
        issued_at: u64,
    ) -> Result<IssuedToken, TokenError> {
        // An unrepresentable expiry is pinned to the far end of the clock.
        let expires_at = issued_at.saturating_add(ttl.as_secs());
        let claims = Claims {
            sub: subject.to_string(),
            iat: issued_at,
            exp: expires_at,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> Result<UserId, TokenError> {
        self.verify_at(token, unix_now())
    }

    /// A token is valid only while `now < exp`.
    pub fn verify_at(&self, token: &str, now: u64) -> Result<UserId, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
                _ => TokenError::Malformed,
            }
        })?;

        if now >= data.claims.exp {
            return Err(TokenError::Expired);
        }

        data.claims.sub.parse().map_err(|_| TokenError::Malformed)
    }
}
