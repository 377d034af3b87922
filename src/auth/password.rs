//! Password hashing and verification
//!
//! Every password is first reduced to a SHA-256 hex digest of
//! `password || pepper`, and only that 64-character string reaches Argon2id.
//! The Argon2 instance is private to [`CredentialHasher`], so the digest step
//! cannot be skipped by calling the adaptive hash directly.

use crate::{config::SecurityConfig, error::AppError};
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use secrecy::{ExposeSecret, Secret};
use sha2::{Digest, Sha256};

/// Length of the hex digest handed to Argon2.
pub const DIGEST_HEX_LEN: usize = 64;

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        // OWASP recommended parameters: m=19MiB, t=2, p=1
        Self {
            memory_kib: 19456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// SHA-256 of `password || pepper`, rendered as lowercase hex.
pub fn digest(password: &str, pepper: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(pepper.as_bytes());
    hex::encode(hasher.finalize())
}

/// The only entry point into password hashing.
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    pepper: Secret<String>,
}

impl CredentialHasher {
    /// Create hasher with an explicit pepper and cost
    pub fn new(pepper: Secret<String>, cost: HashCost) -> Result<Self, AppError> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| AppError::Config(format!("Invalid Argon2 params: {}", e)))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        Ok(Self { argon2, pepper })
    }

    pub fn from_config(security: &SecurityConfig) -> Result<Self, AppError> {
        Self::new(
            security.password_pepper.clone(),
            HashCost {
                memory_kib: security.argon2_memory_kib,
                iterations: security.argon2_iterations,
                parallelism: security.argon2_parallelism,
            },
        )
    }

    fn prehash(&self, password: &str) -> String {
        digest(password, self.pepper.expose_secret())
    }

    /// Hash a password for storage. Salted, so repeated calls differ.
    pub fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        let prehashed = self.prehash(password);

        let password_hash = self
            .argon2
            .hash_password(prehashed.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!("Failed to hash password: {:?}", e);
                AppError::Internal(format!("Failed to hash password: {}", e))
            })?
            .to_string();

        Ok(password_hash)
    }

    /// Verify a password against a stored hash.
    ///
    /// Malformed hashes and mismatches both return `false`.
    pub fn verify_password(&self, password: &str, stored_hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(stored_hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!("Failed to parse password hash: {:?}", e);
                return false;
            }
        };

        let prehashed = self.prehash(password);

        self.argon2
            .verify_password(prehashed.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// Password strength rules applied at registration
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl PasswordPolicy {
    pub fn from_config(security: &SecurityConfig) -> Self {
        Self {
            min_length: security.password_min_length,
            require_uppercase: security.password_require_uppercase,
            require_digit: security.password_require_digit,
            require_special: security.password_require_special,
        }
    }

    /// Validate password against policy
    pub fn validate(&self, password: &str) -> Result<(), AppError> {
        // Check length
        if password.chars().count() < self.min_length {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters",
                self.min_length
            )));
        }

        // Check uppercase
        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            return Err(AppError::Validation(
                "Password must contain at least one uppercase letter".to_string(),
            ));
        }

        // Check digit
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(AppError::Validation(
                "Password must contain at least one digit".to_string(),
            ));
        }

        // Check special character
        if self.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
            return Err(AppError::Validation(
                "Password must contain at least one special character".to_string(),
            ));
        }

        Ok(())
    }
}
