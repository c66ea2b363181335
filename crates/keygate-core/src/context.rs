//! The dependency context handed to every component constructor.

use std::sync::Arc;
use std::time::Duration;

use crate::hasher::CredentialHasher;
use crate::notifier::Notifier;
use crate::records::RecordStore;
use crate::store::SecretStore;
use crate::token::TokenIssuer;

/// Built once at startup; components clone the handles they need.
#[derive(Clone)]
pub struct CoreContext {
    pub records: Arc<dyn RecordStore>,
    pub secrets: Arc<dyn SecretStore>,
    pub notifier: Arc<dyn Notifier>,
    pub hasher: CredentialHasher,
    pub issuer: TokenIssuer,
    /// Deadline for each external call.
    pub call_timeout: Duration,
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::CoreContext;
    use crate::hasher::{CredentialHasher, HashCost};
    use crate::notifier::{Notifier, NotifyError};
    use crate::records::{MemoryRecordStore, RecordStore, UserId, UserRecord};
    use crate::store::{MemoryStore, SecretStore};
    use crate::token::TokenIssuer;

    pub(crate) const TEST_SECRET: &str = "keygate-test-secret-0123456789abcdef";

    /// Notifier that keeps every `(destination, message)` it is asked to send.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct Outbox {
        sent: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl Outbox {
        pub(crate) fn messages(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for Outbox {
        async fn send(&self, destination: &str, message: &str) -> Result<(), NotifyError> {
            self.sent
                .lock()
                .unwrap()
                .push((destination.to_string(), message.to_string()));
            Ok(())
        }
    }

    pub(crate) fn hasher() -> CredentialHasher {
        CredentialHasher::new(HashCost::minimal()).unwrap()
    }

    pub(crate) fn context_with(
        records: Arc<dyn RecordStore>,
        secrets: Arc<dyn SecretStore>,
        notifier: Arc<dyn Notifier>,
    ) -> CoreContext {
        CoreContext {
            records,
            secrets,
            notifier,
            hasher: hasher(),
            issuer: TokenIssuer::new(TEST_SECRET),
            call_timeout: Duration::from_secs(3),
        }
    }

    pub(crate) struct MemoryBackends {
        pub(crate) records: MemoryRecordStore,
        pub(crate) secrets: MemoryStore,
        pub(crate) outbox: Outbox,
    }

    pub(crate) fn memory_context() -> (CoreContext, MemoryBackends) {
        let backends = MemoryBackends {
            records: MemoryRecordStore::new(),
            secrets: MemoryStore::new(),
            outbox: Outbox::default(),
        };
        let context = context_with(
            Arc::new(backends.records.clone()),
            Arc::new(backends.secrets.clone()),
            Arc::new(backends.outbox.clone()),
        );
        (context, backends)
    }

    pub(crate) fn user_with_password(mobile: &str, password: &str) -> UserRecord {
        UserRecord {
            id: UserId::new(),
            mobile_number: mobile.to_string(),
            country_code: "US".to_string(),
            password_hash: hasher().hash(password).unwrap(),
            is_verified: false,
            roles: vec!["user".to_string()],
            last_login_at: None,
            created_at: 1_700_000_000,
            updated_at: 1_700_000_000,
        }
    }
}
