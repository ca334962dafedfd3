use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;

use crate::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(thiserror::Error, Debug)]
pub enum PasswordError {
    #[error("Password must be at least 8 characters")]
    TooShort,

    #[error("Invalid hashing parameters: {0}")]
    InvalidParams(String),

    #[error("Password hashing failed: {0}")]
    HashingFailed(String),
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooShort => AppError::Validation(err.to_string()),
            other => AppError::Internal(anyhow::anyhow!(other)),
        }
    }
}

/// Argon2id hasher with a configurable cost.
#[derive(Debug, Clone)]
pub struct Passwords {
    params: Params,
}

impl Passwords {
    pub fn new(memory_kib: u32, iterations: u32) -> Result<Self, PasswordError> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hashes a password into a PHC string (`$argon2id$v=19$...`). The work
    /// runs on the blocking pool.
    pub async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(PasswordError::TooShort);
        }

        let argon2 = self.argon2();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| PasswordError::HashingFailed(e.to_string()))
        })
        .await
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?
    }

    /// Checks a password against a stored hash on the blocking pool. The cost
    /// recorded in the hash is used, so hashes made under an older
    /// configuration keep working.
    pub async fn verify(&self, password: &str, stored_hash: &str) -> bool {
        let argon2 = self.argon2();
        let password = password.to_owned();
        let stored_hash = stored_hash.to_owned();

        let outcome = tokio::task::spawn_blocking(move || {
            PasswordHash::new(&stored_hash)
                .map(|parsed| argon2.verify_password(password.as_bytes(), &parsed).is_ok())
        })
        .await;

        match outcome {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Stored password hash is malformed");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Password verification task failed");
                false
            }
        }
    }
}
