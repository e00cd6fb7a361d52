//! Password hashing
//!
//! Passwords are hashed with Argon2id into self-describing PHC strings
//! (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`). Verification reads the cost
//! parameters from the digest itself, so digests produced under an older cost
//! configuration keep verifying after the configuration changes.
//! [`PasswordHasher::needs_rehash`] reports those digests so callers can upgrade
//! them on the next successful login.
use std::{fmt, sync::Arc};

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
};
use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::RngCore;

use crate::{Error, error::CryptoError};

/// Cost configuration for password hashing
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordConfig {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes over memory
    pub iterations: u32,
    /// Degree of parallelism (lanes)
    pub parallelism: u32,
    /// Digest used for timing equalization when an email is unknown.
    ///
    /// When `None`, one is computed at hasher construction with the configured cost.
    pub decoy_digest: Option<String>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
            decoy_digest: None,
        }
    }
}

impl PasswordConfig {
    pub fn with_cost(mut self, memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        self.memory_kib = memory_kib;
        self.iterations = iterations;
        self.parallelism = parallelism;
        self
    }

    pub fn with_decoy_digest(mut self, digest: impl Into<String>) -> Self {
        self.decoy_digest = Some(digest.into());
        self
    }
}

impl fmt::Debug for PasswordConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordConfig")
            .field("memory_kib", &self.memory_kib)
            .field("iterations", &self.iterations)
            .field("parallelism", &self.parallelism)
            .field("decoy_digest", &self.decoy_digest.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Argon2id password hasher
///
/// Hashing and verification are CPU-bound. Async callers should use
/// [`PasswordHasher::hash_async`] and [`PasswordHasher::verify_async`], which run
/// on the blocking thread pool.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    decoy_digest: String,
}

impl PasswordHasher {
    pub fn new(config: &PasswordConfig) -> Result<Self, Error> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| CryptoError::PasswordHash(format!("invalid cost parameters: {e}")))?;

        let mut hasher = Self {
            params,
            decoy_digest: String::new(),
        };

        hasher.decoy_digest = match &config.decoy_digest {
            Some(digest) => {
                PasswordHash::new(digest)
                    .map_err(|e| CryptoError::PasswordHash(format!("invalid decoy digest: {e}")))?;
                digest.clone()
            }
            None => {
                let mut filler = [0u8; 24];
                rand::rng().fill_bytes(&mut filler);
                hasher.hash(&BASE64_URL_SAFE_NO_PAD.encode(filler))?
            }
        };

        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a plaintext password into a PHC string with a fresh random salt
    pub fn hash(&self, plaintext: &str) -> Result<String, Error> {
        let mut salt_bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| CryptoError::PasswordHash(e.to_string()))?;
        let digest = self
            .argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| CryptoError::PasswordHash(e.to_string()))?;
        Ok(digest.to_string())
    }

    /// Verify a plaintext password against a stored digest
    ///
    /// The comparison is constant-time. A digest that cannot be parsed never
    /// verifies.
    pub fn verify(&self, plaintext: &str, digest: &str) -> bool {
        let parsed = match PasswordHash::new(digest) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "Stored password digest could not be parsed");
                return false;
            }
        };

        self.argon2()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }

    /// Run a full verification against the decoy digest
    ///
    /// Used when no account matches a login attempt so the attempt costs the
    /// same as a real one. Always returns `false`.
    pub fn verify_decoy(&self, plaintext: &str) -> bool {
        let _ = self.verify(plaintext, &self.decoy_digest);
        false
    }

    /// Whether the digest was produced with parameters other than the configured ones
    pub fn needs_rehash(&self, digest: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            return true;
        };

        if parsed.algorithm != Algorithm::Argon2id.ident() {
            return true;
        }

        if parsed.version != Some(Version::V0x13.into()) {
            return true;
        }

        match Params::try_from(&parsed) {
            Ok(params) => {
                params.m_cost() != self.params.m_cost()
                    || params.t_cost() != self.params.t_cost()
                    || params.p_cost() != self.params.p_cost()
            }
            Err(_) => true,
        }
    }

    /// [`PasswordHasher::hash`] on the blocking thread pool
    pub async fn hash_async(self: &Arc<Self>, plaintext: &str) -> Result<String, Error> {
        let hasher = Arc::clone(self);
        let plaintext = plaintext.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| CryptoError::Task(e.to_string()))?
    }

    /// [`PasswordHasher::verify`] on the blocking thread pool
    pub async fn verify_async(self: &Arc<Self>, plaintext: &str, digest: &str) -> Result<bool, Error> {
        let hasher = Arc::clone(self);
        let plaintext = plaintext.to_string();
        let digest = digest.to_string();
        let verified = tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &digest))
            .await
            .map_err(|e| CryptoError::Task(e.to_string()))?;
        Ok(verified)
    }

    /// [`PasswordHasher::verify_decoy`] on the blocking thread pool
    pub async fn verify_decoy_async(self: &Arc<Self>, plaintext: &str) -> Result<bool, Error> {
        let hasher = Arc::clone(self);
        let plaintext = plaintext.to_string();
        let verified = tokio::task::spawn_blocking(move || hasher.verify_decoy(&plaintext))
            .await
            .map_err(|e| CryptoError::Task(e.to_string()))?;
        Ok(verified)
    }
}

impl fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("memory_kib", &self.params.m_cost())
            .field("iterations", &self.params.t_cost())
            .field("parallelism", &self.params.p_cost())
            .finish_non_exhaustive()
    }
}
