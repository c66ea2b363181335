//! Two-phase password reset: initiate (mobile number → ticket delivered by
//! SMS) and confirm (ticket + new password → rotated credential).
//!
//! A ticket is a 256-bit random value stored as `password_reset:<ticket>`
//! with the owner's id as value and a fixed TTL. A ticket past its TTL and a
//! ticket that was never issued are indistinguishable.
//!
//! Confirmation is lookup → update credential → delete ticket, which is not
//! atomic: two confirmations racing on the same ticket can both pass the
//! lookup. Closing that window needs a get-and-delete primitive or a
//! transactional record store.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};
use tracing::{error, info, warn};

use crate::config::{ResetSettings, UnknownAccountPolicy};
use crate::context::CoreContext;
use crate::hasher::{CredentialHasher, HashError};
use crate::notifier::{mask_destination, Notifier};
use crate::records::{RecordError, RecordStore, UserId};
use crate::requests::{PasswordRecoveryRequest, ResetPasswordRequest};
use crate::store::{bounded, SecretStore, StoreError};
use crate::token::unix_now;
use crate::validation::{FieldError, Validate};

pub const RESET_KEY_PREFIX: &str = "password_reset:";

const TICKET_BYTES: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ResetError {
    #[error("invalid reset request")]
    Validation(Vec<FieldError>),

    #[error("invalid or expired reset ticket")]
    InvalidOrExpiredTicket,

    #[error("no account is registered for this mobile number")]
    UnknownAccount,

    /// The ticket could not be stored or the message could not be sent.
    /// Nothing redeemable is left behind; the caller may retry.
    #[error("password reset could not be initiated: {0}")]
    InitiationFailed(String),

    #[error("reset ticket lookup failed: {0}")]
    TicketLookup(StoreError),

    #[error("account lookup failed: {0}")]
    Records(RecordError),

    #[error("new credential could not be hashed: {0}")]
    Hashing(HashError),

    /// The ticket is left in place so the user can retry.
    #[error("credential update failed: {0}")]
    CredentialUpdate(RecordError),
}

fn generate_ticket() -> String {
    let mut bytes = [0u8; TICKET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn ticket_key(ticket: &str) -> String {
    format!("{RESET_KEY_PREFIX}{ticket}")
}

pub struct PasswordResetFlow {
    records: Arc<dyn RecordStore>,
    secrets: Arc<dyn SecretStore>,
    notifier: Arc<dyn Notifier>,
    hasher: CredentialHasher,
    settings: ResetSettings,
    call_timeout: Duration,
}

impl PasswordResetFlow {
    pub fn new(context: &CoreContext, settings: ResetSettings) -> Self {
        Self {
            records: context.records.clone(),
            secrets: context.secrets.clone(),
            notifier: context.notifier.clone(),
            hasher: context.hasher.clone(),
            settings,
            call_timeout: context.call_timeout,
        }
    }

    fn reset_link(&self, ticket: &str) -> String {
        let separator = if self.settings.link_base.contains('?') { '&' } else { '?' };
        format!("{}{separator}token={ticket}", self.settings.link_base)
    }

    /// Issues a ticket for the account registered to the request's mobile
    /// number and sends the reset link to that number.
    pub async fn initiate(&self, request: &PasswordRecoveryRequest) -> Result<(), ResetError> {
        request.validate().map_err(ResetError::Validation)?;
        let masked = mask_destination(&request.mobile_number);

        let user = bounded(self.call_timeout, self.records.find_by_mobile(&request.mobile_number))
            .await
            .map_err(ResetError::Records)?;

        let Some(user) = user else {
            return match self.settings.unknown_account {
                UnknownAccountPolicy::Conceal => {
                    info!("Password reset requested for unregistered number {masked}");
                    Ok(())
                }
                UnknownAccountPolicy::Reveal => Err(ResetError::UnknownAccount),
            };
        };

        let ticket = generate_ticket();
        let key = ticket_key(&ticket);

        bounded(
            self.call_timeout,
            self.secrets
                .set_with_ttl(&key, &user.id.to_string(), self.settings.ticket_ttl()),
        )
        .await
        .map_err(|e| {
            warn!("Failed to store reset ticket for user {}: {e}", user.id);
            ResetError::InitiationFailed("reset ticket could not be stored".to_string())
        })?;

        let message = format!("Your password reset link is: {}", self.reset_link(&ticket));

        if let Err(e) = bounded(self.call_timeout, self.notifier.send(&user.mobile_number, &message)).await {
            warn!("Failed to send reset message to {masked}: {e}");
            // A ticket the user never received must not stay redeemable.
            if let Err(e) = bounded(self.call_timeout, self.secrets.delete(&key)).await {
                error!("Undelivered reset ticket for user {} could not be revoked: {e}", user.id);
            }
            return Err(ResetError::InitiationFailed(
                "reset message could not be delivered".to_string(),
            ));
        }

        info!("Password reset ticket issued for user {}", user.id);
        Ok(())
    }

    /// Redeems a ticket and sets the new password. Returns the account whose
    /// credential was rotated.
    pub async fn confirm(&self, request: &ResetPasswordRequest) -> Result<UserId, ResetError> {
        request.validate().map_err(ResetError::Validation)?;
        let key = ticket_key(&request.token);

        let owner = bounded(self.call_timeout, self.secrets.get(&key))
            .await
            .map_err(ResetError::TicketLookup)?
            .ok_or(ResetError::InvalidOrExpiredTicket)?;

        let user_id: UserId = owner.parse().map_err(|_| {
            warn!("Reset ticket maps to a malformed user id");
            ResetError::InvalidOrExpiredTicket
        })?;

        let mut user = bounded(self.call_timeout, self.records.find_by_id(user_id))
            .await
            .map_err(ResetError::Records)?
            .ok_or_else(|| {
                warn!("Reset ticket refers to missing user {user_id}");
                ResetError::InvalidOrExpiredTicket
            })?;

        user.password_hash = self
            .hasher
            .hash_blocking(request.new_password.clone())
            .await
            .map_err(ResetError::Hashing)?;
        user.updated_at = unix_now();

        bounded(self.call_timeout, self.records.update(&user))
            .await
            .map_err(ResetError::CredentialUpdate)?;

        // The credential is already rotated; a leftover ticket self-expires.
        if let Err(e) = bounded(self.call_timeout, self.secrets.delete(&key)).await {
            warn!("Password reset for user {user_id} succeeded but its ticket was not deleted: {e}");
        }

        info!("Password reset completed for user {user_id}");
        Ok(user_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::context::testing::{context_with, hasher, memory_context, user_with_password, Outbox};
    use crate::notifier::{MockNotifier, NotifyError};
    use crate::records::{MemoryRecordStore, MockRecordStore};
    use crate::store::{MemoryStore, MockSecretStore};

    const MOBILE: &str = "+15551234567";

    fn recovery(mobile: &str) -> PasswordRecoveryRequest {
        PasswordRecoveryRequest { mobile_number: mobile.to_string() }
    }

    fn confirmation(ticket: &str, password: &str) -> ResetPasswordRequest {
        ResetPasswordRequest {
            token: ticket.to_string(),
            new_password: password.to_string(),
        }
    }

    fn ticket_from(outbox: &Outbox) -> String {
        let messages = outbox.messages();
        assert_eq!(messages.len(), 1, "exactly one reset message expected");
        let (_, message) = &messages[0];
        message.rsplit("token=").next().unwrap().to_string()
    }

    #[test]
    fn tickets_are_long_random_and_url_safe() {
        let a = generate_ticket();
        let b = generate_ticket();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn reset_link_respects_existing_query() {
        let (context, _) = memory_context();
        let mut settings = ResetSettings::default();
        settings.link_base = "https://app.example/reset".to_string();
        let flow = PasswordResetFlow::new(&context, settings.clone());
        assert_eq!(flow.reset_link("T"), "https://app.example/reset?token=T");

        settings.link_base = "https://app.example/r?src=sms".to_string();
        let flow = PasswordResetFlow::new(&context, settings);
        assert_eq!(flow.reset_link("T"), "https://app.example/r?src=sms&token=T");
    }

    #[tokio::test]
    async fn reset_rotates_credential_and_ticket_is_single_use() {
        let (context, backends) = memory_context();
        let user = user_with_password(MOBILE, "OldPass123");
        backends.records.create(user.clone()).await.unwrap();
        let flow = PasswordResetFlow::new(&context, ResetSettings::default());

        flow.initiate(&recovery(MOBILE)).await.unwrap();
        let messages = backends.outbox.messages();
        assert_eq!(messages[0].0, MOBILE);
        assert!(messages[0].1.starts_with("Your password reset link is: https://"));
        let ticket = ticket_from(&backends.outbox);

        let rotated = flow.confirm(&confirmation(&ticket, "Str0ngPass!")).await.unwrap();
        assert_eq!(rotated, user.id);

        let stored = backends.records.find_by_id(user.id).await.unwrap().unwrap();
        let h = hasher();
        assert!(!h.verify("OldPass123", &stored.password_hash).unwrap());
        assert!(h.verify("Str0ngPass!", &stored.password_hash).unwrap());

        let again = flow.confirm(&confirmation(&ticket, "An0therPass!")).await;
        assert!(matches!(again, Err(ResetError::InvalidOrExpiredTicket)));

        let after_replay = backends.records.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(after_replay.password_hash, stored.password_hash);
        assert!(backends.secrets.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn ticket_past_its_ttl_is_rejected() {
        let (context, backends) = memory_context();
        let user = user_with_password(MOBILE, "OldPass123");
        backends.records.create(user.clone()).await.unwrap();
        let flow = PasswordResetFlow::new(&context, ResetSettings::default());

        flow.initiate(&recovery(MOBILE)).await.unwrap();
        let ticket = ticket_from(&backends.outbox);

        tokio::time::advance(Duration::from_secs(15 * 60 + 1)).await;

        let result = flow.confirm(&confirmation(&ticket, "Str0ngPass!")).await;
        assert!(matches!(result, Err(ResetError::InvalidOrExpiredTicket)));
        let stored = backends.records.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, user.password_hash);
    }

    #[tokio::test]
    async fn never_issued_ticket_is_rejected() {
        let (context, _) = memory_context();
        let flow = PasswordResetFlow::new(&context, ResetSettings::default());
        let result = flow.confirm(&confirmation("made-up-ticket", "Str0ngPass!")).await;
        assert!(matches!(result, Err(ResetError::InvalidOrExpiredTicket)));
    }

    #[tokio::test]
    async fn unknown_mobile_is_concealed_by_default() {
        let (context, backends) = memory_context();
        let flow = PasswordResetFlow::new(&context, ResetSettings::default());

        flow.initiate(&recovery("+15550000000")).await.unwrap();
        assert!(backends.outbox.messages().is_empty());
        assert!(backends.secrets.is_empty());
    }

    #[tokio::test]
    async fn unknown_mobile_can_be_revealed() {
        let (context, _) = memory_context();
        let settings = ResetSettings {
            unknown_account: UnknownAccountPolicy::Reveal,
            ..ResetSettings::default()
        };
        let flow = PasswordResetFlow::new(&context, settings);
        let result = flow.initiate(&recovery("+15550000000")).await;
        assert!(matches!(result, Err(ResetError::UnknownAccount)));
    }

    #[tokio::test]
    async fn failed_dispatch_revokes_the_ticket() {
        let records = MemoryRecordStore::new();
        records.create(user_with_password(MOBILE, "OldPass123")).await.unwrap();
        let secrets = MemoryStore::new();

        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .once()
            .returning(|_, _| Err(NotifyError::Rejected("gateway said no".into())));

        let context = context_with(Arc::new(records), Arc::new(secrets.clone()), Arc::new(notifier));
        let flow = PasswordResetFlow::new(&context, ResetSettings::default());

        let result = flow.initiate(&recovery(MOBILE)).await;
        assert!(matches!(result, Err(ResetError::InitiationFailed(_))));
        assert!(secrets.is_empty(), "undelivered ticket must not stay redeemable");
    }

    struct StalledNotifier;

    #[async_trait]
    impl Notifier for StalledNotifier {
        async fn send(&self, _: &str, _: &str) -> Result<(), NotifyError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn notifier_timeout_is_treated_as_failed_dispatch() {
        let records = MemoryRecordStore::new();
        records.create(user_with_password(MOBILE, "OldPass123")).await.unwrap();
        let secrets = MemoryStore::new();
        let context = context_with(
            Arc::new(records),
            Arc::new(secrets.clone()),
            Arc::new(StalledNotifier),
        );
        let flow = PasswordResetFlow::new(&context, ResetSettings::default());

        let result = flow.initiate(&recovery(MOBILE)).await;
        assert!(matches!(result, Err(ResetError::InitiationFailed(_))));
        assert!(secrets.is_empty());
    }

    #[tokio::test]
    async fn ticket_write_failure_sends_nothing() {
        let records = MemoryRecordStore::new();
        records.create(user_with_password(MOBILE, "OldPass123")).await.unwrap();

        let mut secrets = MockSecretStore::new();
        secrets
            .expect_set_with_ttl()
            .once()
            .returning(|_, _, _| Err(StoreError::Unavailable("connection refused".into())));
        let mut notifier = MockNotifier::new();
        notifier.expect_send().never();

        let context = context_with(Arc::new(records), Arc::new(secrets), Arc::new(notifier));
        let flow = PasswordResetFlow::new(&context, ResetSettings::default());

        let result = flow.initiate(&recovery(MOBILE)).await;
        assert!(matches!(result, Err(ResetError::InitiationFailed(_))));
    }

    #[tokio::test]
    async fn failed_credential_update_keeps_the_ticket() {
        let user = user_with_password(MOBILE, "OldPass123");
        let secrets = MemoryStore::new();
        secrets
            .set_with_ttl(&ticket_key("T1"), &user.id.to_string(), Duration::from_secs(900))
            .await
            .unwrap();

        let mut records = MockRecordStore::new();
        let found = user.clone();
        records
            .expect_find_by_id()
            .returning(move |_| Ok(Some(found.clone())));
        records
            .expect_update()
            .once()
            .returning(|_| Err(RecordError::Unavailable("primary stepped down".into())));

        let context = context_with(Arc::new(records), Arc::new(secrets.clone()), Arc::new(Outbox::default()));
        let flow = PasswordResetFlow::new(&context, ResetSettings::default());

        let result = flow.confirm(&confirmation("T1", "Str0ngPass!")).await;
        assert!(matches!(result, Err(ResetError::CredentialUpdate(_))));
        assert_eq!(
            secrets.get(&ticket_key("T1")).await.unwrap(),
            Some(user.id.to_string())
        );
    }

    #[tokio::test]
    async fn failed_ticket_delete_does_not_fail_the_reset() {
        let records = MemoryRecordStore::new();
        let user = user_with_password(MOBILE, "OldPass123");
        records.create(user.clone()).await.unwrap();

        let mut secrets = MockSecretStore::new();
        let owner = user.id.to_string();
        secrets
            .expect_get()
            .returning(move |_| Ok(Some(owner.clone())));
        secrets
            .expect_delete()
            .once()
            .returning(|_| Err(StoreError::Unavailable("connection reset".into())));

        let context = context_with(Arc::new(records.clone()), Arc::new(secrets), Arc::new(Outbox::default()));
        let flow = PasswordResetFlow::new(&context, ResetSettings::default());

        assert_eq!(flow.confirm(&confirmation("T1", "Str0ngPass!")).await.unwrap(), user.id);
        let stored = records.find_by_id(user.id).await.unwrap().unwrap();
        assert!(hasher().verify("Str0ngPass!", &stored.password_hash).unwrap());
    }

    #[tokio::test]
    async fn ticket_lookup_outage_fails_closed() {
        let mut secrets = MockSecretStore::new();
        secrets
            .expect_get()
            .returning(|_| Err(StoreError::Unavailable("connection refused".into())));
        let mut records = MockRecordStore::new();
        records.expect_update().never();

        let context = context_with(Arc::new(records), Arc::new(secrets), Arc::new(Outbox::default()));
        let flow = PasswordResetFlow::new(&context, ResetSettings::default());

        let result = flow.confirm(&confirmation("T1", "Str0ngPass!")).await;
        assert!(matches!(result, Err(ResetError::TicketLookup(_))));
    }

    #[tokio::test]
    async fn ticket_for_deleted_account_is_invalid() {
        let (context, backends) = memory_context();
        backends
            .secrets
            .set_with_ttl(&ticket_key("T1"), &UserId::new().to_string(), Duration::from_secs(900))
            .await
            .unwrap();
        let flow = PasswordResetFlow::new(&context, ResetSettings::default());

        let result = flow.confirm(&confirmation("T1", "Str0ngPass!")).await;
        assert!(matches!(result, Err(ResetError::InvalidOrExpiredTicket)));
    }

    #[tokio::test]
    async fn invalid_payloads_are_rejected_before_any_io() {
        let mut secrets = MockSecretStore::new();
        secrets.expect_get().never();
        secrets.expect_set_with_ttl().never();
        let mut records = MockRecordStore::new();
        records.expect_find_by_mobile().never();

        let context = context_with(Arc::new(records), Arc::new(secrets), Arc::new(Outbox::default()));
        let flow = PasswordResetFlow::new(&context, ResetSettings::default());

        let initiate = flow.initiate(&recovery("5551234567")).await;
        assert!(matches!(initiate, Err(ResetError::Validation(_))));

        let confirm = flow.confirm(&confirmation("T1", "short")).await;
        match confirm {
            Err(ResetError::Validation(fields)) => {
                assert_eq!(fields, vec![FieldError::new("new_password", "min")]);
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }
}
