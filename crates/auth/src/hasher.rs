//! Credential hashing.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("stored credential is not a valid hash: {0}")]
    MalformedHash(String),
}

/// Turns a plaintext password into the bytes stored on an account.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<Vec<u8>, HashError>;

    fn verify(&self, password: &str, credential_hash: &[u8]) -> Result<bool, HashError>;
}

/// Argon2id with a random salt; the stored bytes are the PHC string.
#[derive(Debug, Default, Clone)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<Vec<u8>, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        let phc = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| HashError::Hash(e.to_string()))?;
        Ok(phc.to_string().into_bytes())
    }

    fn verify(&self, password: &str, credential_hash: &[u8]) -> Result<bool, HashError> {
        let phc = std::str::from_utf8(credential_hash)
            .map_err(|e| HashError::MalformedHash(e.to_string()))?;
        let parsed = PasswordHash::new(phc).map_err(|e| HashError::MalformedHash(e.to_string()))?;
        Ok(self.argon2.verify_password(password.as_bytes(), &parsed).is_ok())
    }
}
