use std::{fmt, path::Path};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use rand::RngCore;

use crate::{Error, error::CryptoError};

/// A named JWT signing key
///
/// Encoding and decoding keys are parsed once at construction.
#[derive(Clone)]
pub struct SigningKey {
    id: String,
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKey {
    /// An HMAC-SHA256 key
    pub fn hs256(id: impl Into<String>, secret: &[u8]) -> Result<Self, Error> {
        let id = Self::check_id(id.into())?;
        if secret.is_empty() {
            return Err(CryptoError::InvalidKey("HS256 secret must not be empty".to_string()).into());
        }
        if secret.len() < 32 {
            tracing::warn!(key_id = %id, "HS256 secret is shorter than 32 bytes");
        }

        Ok(Self {
            id,
            algorithm: Algorithm::HS256,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        })
    }

    /// An RSA-SHA256 key pair in PEM format
    pub fn rs256(id: impl Into<String>, private_key: &[u8], public_key: &[u8]) -> Result<Self, Error> {
        let id = Self::check_id(id.into())?;
        let encoding = EncodingKey::from_rsa_pem(private_key)
            .map_err(|e| CryptoError::InvalidKey(format!("Invalid RSA private key: {e}")))?;
        let decoding = DecodingKey::from_rsa_pem(public_key)
            .map_err(|e| CryptoError::InvalidKey(format!("Invalid RSA public key: {e}")))?;

        Ok(Self {
            id,
            algorithm: Algorithm::RS256,
            encoding,
            decoding,
        })
    }

    /// An RSA-SHA256 key pair read from PEM files
    pub fn from_rs256_pem_files(
        id: impl Into<String>,
        private_key_path: impl AsRef<Path>,
        public_key_path: impl AsRef<Path>,
    ) -> Result<Self, Error> {
        let private_key = std::fs::read(private_key_path).map_err(|e| {
            CryptoError::InvalidKey(format!("Failed to read private key file: {e}"))
        })?;
        let public_key = std::fs::read(public_key_path).map_err(|e| {
            CryptoError::InvalidKey(format!("Failed to read public key file: {e}"))
        })?;

        Self::rs256(id, &private_key, &public_key)
    }

    /// An HS256 key with a random 256-bit secret
    ///
    /// Tokens signed with it do not survive a process restart.
    pub fn random_hs256(id: impl Into<String>) -> Result<Self, Error> {
        let mut secret = [0u8; 32];
        rand::rng().fill_bytes(&mut secret);
        Self::hs256(id, &secret)
    }

    fn check_id(id: String) -> Result<String, Error> {
        if id.trim().is_empty() {
            return Err(CryptoError::InvalidKey("Key ID must not be empty".to_string()).into());
        }
        Ok(id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("id", &self.id)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// The active signing key plus retired keys still accepted for validation
#[derive(Debug, Clone)]
pub struct KeyRing {
    active: SigningKey,
    retired: Vec<SigningKey>,
}

impl KeyRing {
    pub fn new(active: SigningKey) -> Self {
        Self {
            active,
            retired: Vec::new(),
        }
    }

    pub fn active(&self) -> &SigningKey {
        &self.active
    }

    /// Look up a key by ID, active or retired
    pub fn find(&self, key_id: &str) -> Option<&SigningKey> {
        std::iter::once(&self.active)
            .chain(self.retired.iter())
            .find(|key| key.id == key_id)
    }

    /// Make `key` the active signing key and retire the current one
    ///
    /// Tokens signed with the retired key keep validating until they expire or
    /// the key is dropped with [`KeyRing::drop_retired`].
    pub fn rotate(&mut self, key: SigningKey) -> Result<(), Error> {
        if self.find(&key.id).is_some() {
            return Err(
                CryptoError::InvalidKey(format!("Key ID {} is already in use", key.id)).into(),
            );
        }

        let previous = std::mem::replace(&mut self.active, key);
        self.retired.insert(0, previous);
        Ok(())
    }

    /// Stop accepting a retired key. Returns whether a key was removed.
    pub fn drop_retired(&mut self, key_id: &str) -> bool {
        let before = self.retired.len();
        self.retired.retain(|key| key.id != key_id);
        self.retired.len() != before
    }

    pub fn key_ids(&self) -> Vec<&str> {
        std::iter::once(&self.active)
            .chain(self.retired.iter())
            .map(|key| key.id.as_str())
            .collect()
    }
}
