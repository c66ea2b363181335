//! One-way credential hashing.
//!
//! Digests are Argon2id PHC strings (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`),
//! so every digest carries its own salt and cost. Raising [`HashCost`] only
//! affects new digests; older ones keep verifying with the parameters they
//! were created with.

use argon2::{
    password_hash::{self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("invalid hash cost: {0}")]
    InvalidCost(String),

    #[error("failed to hash credential: {0}")]
    HashingFailure(String),

    #[error("malformed credential digest: {0}")]
    MalformedDigest(String),
}

/// Argon2 cost parameters used for new digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HashCost {
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

fn default_memory_kib() -> u32 { Params::DEFAULT_M_COST }
fn default_iterations() -> u32 { Params::DEFAULT_T_COST }
fn default_parallelism() -> u32 { Params::DEFAULT_P_COST }

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

impl HashCost {
    /// The cheapest parameters Argon2 accepts. Only for tests and tooling.
    pub const fn minimal() -> Self {
        Self { memory_kib: 8, iterations: 1, parallelism: 1 }
    }
}

#[derive(Clone)]
pub struct CredentialHasher {
    cost: HashCost,
    params: Params,
}

impl std::fmt::Debug for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHasher").field("cost", &self.cost).finish()
    }
}

impl CredentialHasher {
    pub fn new(cost: HashCost) -> Result<Self, HashError> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| HashError::InvalidCost(e.to_string()))?;
        Ok(Self { cost, params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, secret: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        let digest = self
            .argon2()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| HashError::HashingFailure(e.to_string()))?;

        Ok(digest.to_string())
    }

    /// Returns `Ok(false)` on mismatch; errors only when `digest` cannot be parsed.
    pub fn verify(&self, secret: &str, digest: &str) -> Result<bool, HashError> {
        let parsed =
            PasswordHash::new(digest).map_err(|e| HashError::MalformedDigest(e.to_string()))?;

        // Verification reads algorithm, version and cost from the digest itself.
        match Argon2::default().verify_password(secret.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(HashError::MalformedDigest(e.to_string())),
        }
    }

    /// Whether `digest` was produced with parameters other than the current cost.
    pub fn needs_rehash(&self, digest: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            return true;
        };
        match Params::try_from(&parsed) {
            Ok(params) => {
                params.m_cost() != self.params.m_cost()
                    || params.t_cost() != self.params.t_cost()
                    || params.p_cost() != self.params.p_cost()
            }
            Err(_) => true,
        }
    }

    /// [`hash`](Self::hash) on the blocking pool.
    pub async fn hash_blocking(&self, secret: String) -> Result<String, HashError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&secret))
            .await
            .map_err(|e| HashError::HashingFailure(e.to_string()))?
    }

    /// [`verify`](Self::verify) on the blocking pool.
    pub async fn verify_blocking(&self, secret: String, digest: String) -> Result<bool, HashError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&secret, &digest))
            .await
            .map_err(|e| HashError::HashingFailure(e.to_string()))?
    }
}
