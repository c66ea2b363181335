//! Request-time bearer authentication.

use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::records::UserId;
use crate::token::TokenIssuer;

/// Per-request context. The subject is set only by [`AuthGate::attach`] and
/// is read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    client: String,
    subject: Option<UserId>,
}

impl RequestContext {
    pub fn anonymous(client: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            subject: None,
        }
    }

    /// Client identity used for rate limiting.
    pub fn client(&self) -> &str {
        &self.client
    }

    pub fn subject(&self) -> Option<UserId> {
        self.subject
    }

    pub(crate) fn with_subject(self, subject: UserId) -> Self {
        Self {
            subject: Some(subject),
            ..self
        }
    }
}

/// Extracts the credential from an `Authorization` value of the form
/// `Bearer <token>`. The scheme is matched case-insensitively.
fn bearer_credential(header: &str) -> Option<&str> {
    let mut parts = header.split_whitespace();
    let scheme = parts.next()?;
    let credential = parts.next()?;
    if parts.next().is_some() || !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(credential)
}

#[derive(Clone)]
pub struct AuthGate {
    issuer: TokenIssuer,
}

impl AuthGate {
    pub fn new(issuer: TokenIssuer) -> Self {
        Self { issuer }
    }

    /// Every failure, whatever its cause, is reported as [`CoreError::Unauthorized`].
    pub fn authenticate(&self, authorization: Option<&str>) -> CoreResult<UserId> {
        let header = authorization.ok_or(CoreError::Unauthorized)?;
        let credential = bearer_credential(header).ok_or_else(|| {
            debug!("Rejected malformed authorization header");
            CoreError::Unauthorized
        })?;
        self.issuer.verify(credential).map_err(|e| {
            debug!("Rejected bearer token: {e}");
            CoreError::Unauthorized
        })
    }

    pub fn attach(&self, context: RequestContext, authorization: Option<&str>) -> CoreResult<RequestContext> {
        let subject = self.authenticate(authorization)?;
        Ok(context.with_subject(subject))
    }
}
