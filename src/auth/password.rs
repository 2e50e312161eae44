//! Password hashing and verification using Argon2id.

use crate::config::HashingConfig;
use crate::error::{SchoolError, SchoolResult};
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};

/// Credential hashing primitive consumed by the registration and login flows.
pub trait CredentialHasher: Send + Sync {
    /// Hash a plaintext password into a self-describing PHC string.
    fn hash(&self, password: &str) -> SchoolResult<String>;

    /// Check a plaintext password against a stored hash.
    ///
    /// Returns `Ok(false)` on mismatch and an error only for malformed hashes.
    fn verify(&self, password: &str, hash: &str) -> SchoolResult<bool>;
}

/// Argon2id hasher with configurable cost.
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    pub fn new(config: &HashingConfig) -> SchoolResult<Self> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| SchoolError::internal(format!("invalid argon2 parameters: {e}")))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> SchoolResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| SchoolError::internal(format!("password hashing failed: {e}")))
    }

    fn verify(&self, password: &str, hash: &str) -> SchoolResult<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| SchoolError::internal(format!("invalid hash format: {e}")))?;

        // Cost parameters are read back from the PHC string.
        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(SchoolError::internal(format!("verify error: {e}"))),
        }
    }
}
