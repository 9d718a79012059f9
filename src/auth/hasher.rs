//! Password digesting.
//!
//! Sign-in looks a user up by `(email, digest)` in a single query, so the
//! digest has to be deterministic for a given password. The per-deployment
//! salt keys an HMAC instead of being stored per user.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("invalid hasher key: {0}")]
    InvalidKey(String),
}

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, HashError>;
}

#[derive(Clone)]
pub struct HmacSha256Hasher {
    salt: Vec<u8>,
}

impl HmacSha256Hasher {
    pub fn new(salt: impl Into<Vec<u8>>) -> Self {
        Self { salt: salt.into() }
    }
}

impl std::fmt::Debug for HmacSha256Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSha256Hasher").finish_non_exhaustive()
    }
}

impl PasswordHasher for HmacSha256Hasher {
    fn hash(&self, password: &str) -> Result<String, HashError> {
        let mut mac = HmacSha256::new_from_slice(&self.salt)
            .map_err(|e| HashError::InvalidKey(e.to_string()))?;
        mac.update(password.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}
