use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("password hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Salted bcrypt hashing; work runs on the blocking pool
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub async fn hash(&self, plain: &str) -> Result<String, PasswordError> {
        let plain = plain.to_string();
        let cost = self.cost;
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(plain, cost)).await??;
        Ok(hash)
    }

    pub async fn verify(&self, plain: &str, hash: &str) -> Result<bool, PasswordError> {
        let plain = plain.to_string();
        let hash = hash.to_string();
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(plain, &hash)).await??;
        Ok(matches)
    }
}

/// Single-use password reset credential. Only `hashed` is ever stored;
/// `plain` goes out by email.
#[derive(Debug, Clone)]
pub struct PasswordResetToken {
    pub plain: String,
    pub hashed: String,
    pub expires_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn generate(ttl: Duration) -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let plain = hex::encode(bytes);
        let hashed = hash_reset_token(&plain);

        Self {
            plain,
            hashed,
            expires_at: Utc::now() + ttl,
        }
    }
}

/// SHA-256 hex digest used to look up reset tokens
pub fn hash_reset_token(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}
