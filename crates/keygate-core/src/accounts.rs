//! Registration, login and account reads.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::context::CoreContext;
use crate::error::{CoreError, CoreResult};
use crate::hasher::CredentialHasher;
use crate::records::{RecordStore, UserId, UserRecord};
use crate::requests::{LoginRequest, RegisterRequest};
use crate::store::bounded;
use crate::token::{unix_now, IssuedToken, TokenIssuer};
use crate::validation::Validate;

pub const DEFAULT_ROLE: &str = "user";

const DECOY_PASSWORD: &str = "keygate-unregistered-login";

/// Returned by a successful login.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    #[serde(flatten)]
    pub token: IssuedToken,
    pub user: UserRecord,
}

#[derive(Clone)]
pub struct AccountService {
    records: Arc<dyn RecordStore>,
    hasher: CredentialHasher,
    issuer: TokenIssuer,
    session_ttl: Duration,
    call_timeout: Duration,
    decoy: Arc<OnceCell<String>>,
}

impl AccountService {
    pub fn new(context: &CoreContext, session_ttl: Duration) -> Self {
        Self {
            records: context.records.clone(),
            hasher: context.hasher.clone(),
            issuer: context.issuer.clone(),
            session_ttl,
            call_timeout: context.call_timeout,
            decoy: Arc::new(OnceCell::new()),
        }
    }

    pub async fn register(&self, request: &RegisterRequest) -> CoreResult<UserRecord> {
        request.validate().map_err(CoreError::Validation)?;

        let existing = bounded(self.call_timeout, self.records.find_by_mobile(&request.mobile_number)).await?;
        if existing.is_some() {
            return Err(CoreError::Conflict(
                "an account with this mobile number already exists".to_string(),
            ));
        }

        let password_hash = self.hasher.hash_blocking(request.password.clone()).await?;
        let now = unix_now();
        let user = UserRecord {
            id: UserId::new(),
            mobile_number: request.mobile_number.clone(),
            country_code: request.country_code.clone(),
            password_hash,
            is_verified: false,
            roles: vec![DEFAULT_ROLE.to_string()],
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };

        // The store re-checks uniqueness; a concurrent registration surfaces as a conflict here.
        bounded(self.call_timeout, self.records.create(user.clone())).await?;
        info!("Registered user {}", user.id);
        Ok(user)
    }

    /// Unknown number and wrong password produce the same error, and both pay
    /// for one digest verification.
    ///
    /// Bookkeeping writes touch only the login timestamps, and a digest upgrade
    /// applies only if the stored digest is still the one that was verified, so
    /// a password reset landing mid-login is never rolled back.
    pub async fn login(&self, request: &LoginRequest) -> CoreResult<Session> {
        request.validate().map_err(CoreError::Validation)?;

        let Some(mut user) =
            bounded(self.call_timeout, self.records.find_by_mobile(&request.mobile_number)).await?
        else {
            let decoy = self.decoy_digest().await?;
            self.hasher
                .verify_blocking(request.password.clone(), decoy.to_string())
                .await?;
            debug!("Login for unregistered number rejected");
            return Err(CoreError::Unauthorized);
        };

        let matches = self
            .hasher
            .verify_blocking(request.password.clone(), user.password_hash.clone())
            .await?;
        if !matches {
            debug!("Login for user {} rejected: bad password", user.id);
            return Err(CoreError::Unauthorized);
        }

        let token = self.issuer.issue(&user.id, self.session_ttl)?;

        let now = unix_now();
        if self.hasher.needs_rehash(&user.password_hash) {
            self.upgrade_digest(&user, &request.password, now).await;
        }
        match bounded(self.call_timeout, self.records.record_login(user.id, now)).await {
            Ok(()) => {
                user.last_login_at = Some(now);
                user.updated_at = now;
            }
            Err(e) => warn!("Failed to record login for user {}: {e}", user.id),
        }

        info!("User {} logged in", user.id);
        Ok(Session { token, user })
    }

    /// Re-hashes `password` at the current cost. Best effort; the login has
    /// already succeeded.
    async fn upgrade_digest(&self, user: &UserRecord, password: &str, now: u64) {
        let digest = match self.hasher.hash_blocking(password.to_string()).await {
            Ok(digest) => digest,
            Err(e) => {
                warn!("Rehash for user {} failed: {e}", user.id);
                return;
            }
        };

        let swap = self
            .records
            .replace_password_hash(user.id, &user.password_hash, digest, now);
        match bounded(self.call_timeout, swap).await {
            Ok(true) => debug!("Upgraded password digest for user {}", user.id),
            Ok(false) => debug!("Credential for user {} changed during login; digest upgrade skipped", user.id),
            Err(e) => warn!("Failed to store upgraded digest for user {}: {e}", user.id),
        }
    }

    /// Digest checked against when no account matches, so both rejections cost the same.
    async fn decoy_digest(&self) -> CoreResult<&str> {
        let digest = self
            .decoy
            .get_or_try_init(|| self.hasher.hash_blocking(DECOY_PASSWORD.to_string()))
            .await?;
        Ok(digest.as_str())
    }

    pub async fn profile(&self, id: UserId) -> CoreResult<UserRecord> {
        bounded(self.call_timeout, self.records.find_by_id(id))
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("user {id}")))
    }

    pub async fn list_users(&self) -> CoreResult<Vec<UserRecord>> {
        Ok(bounded(self.call_timeout, self.records.list()).await?)
    }
}
