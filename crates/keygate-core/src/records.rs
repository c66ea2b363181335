//! User record store boundary.
//!
//! The record store owns identities; this crate only reads and rotates them.
//! [`MemoryRecordStore`] is the in-process implementation used by tests and
//! single-node deployments.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::TimedOut;

/// Primary key of an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: UserId,
    /// Natural key; unique across records.
    pub mobile_number: String,
    pub country_code: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_verified: bool,
    pub roles: Vec<String>,
    pub last_login_at: Option<u64>,
    pub created_at: u64,
    pub updated_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("mobile number is already registered")]
    DuplicateMobile,

    #[error("user {0} does not exist")]
    Missing(UserId),

    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("record store call timed out after {0:?}")]
    Timeout(Duration),
}

impl TimedOut for RecordError {
    fn timed_out(after: Duration) -> Self {
        RecordError::Timeout(after)
    }
}

/// Must be read-after-write consistent within one request chain.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_by_mobile(&self, mobile_number: &str) -> Result<Option<UserRecord>, RecordError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, RecordError>;

    async fn create(&self, record: UserRecord) -> Result<UserId, RecordError>;

    async fn update(&self, record: &UserRecord) -> Result<(), RecordError>;

    /// Stamps `last_login_at` and `updated_at` without touching any other field.
    async fn record_login(&self, id: UserId, at: u64) -> Result<(), RecordError>;

    /// Swaps the credential digest only while it still equals `expected`.
    /// Returns `false` when the digest changed in the meantime.
    async fn replace_password_hash(
        &self,
        id: UserId,
        expected: &str,
        digest: String,
        at: u64,
    ) -> Result<bool, RecordError>;

    async fn list(&self) -> Result<Vec<UserRecord>, RecordError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryRecordStore {
    users: Arc<DashMap<UserId, UserRecord>>,
    by_mobile: Arc<DashMap<String, UserId>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_by_mobile(&self, mobile_number: &str) -> Result<Option<UserRecord>, RecordError> {
        let Some(id) = self.by_mobile.get(mobile_number).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, RecordError> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn create(&self, record: UserRecord) -> Result<UserId, RecordError> {
        let id = record.id;
        // The mobile index entry is the uniqueness lock.
        match self.by_mobile.entry(record.mobile_number.clone()) {
            Entry::Occupied(_) => return Err(RecordError::DuplicateMobile),
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }
        self.users.insert(id, record);
        tracing::debug!("User record created: id={id}, store_size={}", self.users.len());
        Ok(id)
    }

    async fn update(&self, record: &UserRecord) -> Result<(), RecordError> {
        let previous_mobile = self
            .users
            .get(&record.id)
            .map(|u| u.mobile_number.clone())
            .ok_or(RecordError::Missing(record.id))?;

        if previous_mobile != record.mobile_number {
            match self.by_mobile.entry(record.mobile_number.clone()) {
                Entry::Occupied(_) => return Err(RecordError::DuplicateMobile),
                Entry::Vacant(slot) => {
                    slot.insert(record.id);
                }
            }
            self.by_mobile.remove(&previous_mobile);
        }

        self.users.insert(record.id, record.clone());
        Ok(())
    }

    async fn record_login(&self, id: UserId, at: u64) -> Result<(), RecordError> {
        let mut user = self.users.get_mut(&id).ok_or(RecordError::Missing(id))?;
        user.last_login_at = Some(at);
        user.updated_at = at;
        Ok(())
    }

    async fn replace_password_hash(
        &self,
        id: UserId,
        expected: &str,
        digest: String,
        at: u64,
    ) -> Result<bool, RecordError> {
        let mut user = self.users.get_mut(&id).ok_or(RecordError::Missing(id))?;
        if user.password_hash != expected {
            return Ok(false);
        }
        user.password_hash = digest;
        user.updated_at = at;
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<UserRecord>, RecordError> {
        let mut users: Vec<UserRecord> = self.users.iter().map(|u| u.clone()).collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(mobile: &str) -> UserRecord {
        UserRecord {
            id: UserId::new(),
            mobile_number: mobile.to_string(),
            country_code: "US".to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
            is_verified: false,
            roles: vec!["user".to_string()],
            last_login_at: None,
            created_at: 10,
            updated_at: 10,
        }
    }

    #[test]
    fn user_id_round_trips_through_display() {
        let id = UserId::new();
        assert_eq!(id.to_string().parse::<UserId>().unwrap(), id);
        assert!("not-a-uuid".parse::<UserId>().is_err());
    }

    #[test]
    fn serialized_record_omits_password_hash() {
        let json = serde_json::to_value(record("+15551234567")).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["mobile_number"], "+15551234567");
    }

    #[tokio::test]
    async fn create_then_find_by_either_key() {
        let store = MemoryRecordStore::new();
        let user = record("+15551234567");
        let id = store.create(user.clone()).await.unwrap();

        assert_eq!(store.find_by_id(id).await.unwrap(), Some(user.clone()));
        assert_eq!(store.find_by_mobile("+15551234567").await.unwrap(), Some(user));
        assert_eq!(store.find_by_mobile("+15550000000").await.unwrap(), None);
    }

    #[tokio::test]
    async fn mobile_number_is_unique() {
        let store = MemoryRecordStore::new();
        store.create(record("+15551234567")).await.unwrap();
        let err = store.create(record("+15551234567")).await.unwrap_err();
        assert_eq!(err, RecordError::DuplicateMobile);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_replaces_record_and_reindexes_mobile() {
        let store = MemoryRecordStore::new();
        let mut user = record("+15551234567");
        store.create(user.clone()).await.unwrap();

        user.password_hash = "$argon2id$rotated".to_string();
        user.mobile_number = "+15557654321".to_string();
        store.update(&user).await.unwrap();

        assert_eq!(store.find_by_mobile("+15551234567").await.unwrap(), None);
        let found = store.find_by_mobile("+15557654321").await.unwrap().unwrap();
        assert_eq!(found.password_hash, "$argon2id$rotated");
    }

    #[tokio::test]
    async fn update_of_unknown_user_fails() {
        let store = MemoryRecordStore::new();
        let user = record("+15551234567");
        assert_eq!(store.update(&user).await, Err(RecordError::Missing(user.id)));
    }

    #[tokio::test]
    async fn record_login_only_touches_timestamps() {
        let store = MemoryRecordStore::new();
        let user = record("+15551234567");
        store.create(user.clone()).await.unwrap();

        store.record_login(user.id, 42).await.unwrap();

        let found = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found.last_login_at, Some(42));
        assert_eq!(found.updated_at, 42);
        assert_eq!(found.password_hash, user.password_hash);
        assert!(matches!(
            store.record_login(UserId::new(), 42).await,
            Err(RecordError::Missing(_))
        ));
    }

    #[tokio::test]
    async fn digest_replacement_requires_the_expected_digest() {
        let store = MemoryRecordStore::new();
        let user = record("+15551234567");
        store.create(user.clone()).await.unwrap();

        let stale = store
            .replace_password_hash(user.id, "$argon2id$other", "$argon2id$new".to_string(), 20)
            .await
            .unwrap();
        assert!(!stale);
        assert_eq!(
            store.find_by_id(user.id).await.unwrap().unwrap().password_hash,
            user.password_hash
        );

        let swapped = store
            .replace_password_hash(user.id, &user.password_hash, "$argon2id$new".to_string(), 20)
            .await
            .unwrap();
        assert!(swapped);
        let found = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found.password_hash, "$argon2id$new");
        assert_eq!(found.updated_at, 20);
    }

    #[tokio::test]
    async fn update_cannot_steal_another_mobile() {
        let store = MemoryRecordStore::new();
        store.create(record("+15551111111")).await.unwrap();
        let mut second = record("+15552222222");
        store.create(second.clone()).await.unwrap();

        second.mobile_number = "+15551111111".to_string();
        assert_eq!(store.update(&second).await, Err(RecordError::DuplicateMobile));
    }
}
