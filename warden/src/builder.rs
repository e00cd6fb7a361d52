//! Builder pattern for constructing Warden instances
//!
//! This module provides a type-safe builder for creating [`Warden`] instances with
//! compile-time validation of storage configuration.
//!
//! # Example
//!
//! ```rust,no_run
//! use warden::{LockoutConfig, SigningKey, WardenBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warden = WardenBuilder::new()
//!         .with_sqlite("sqlite://warden.db?mode=rwc")
//!         .await?
//!         .with_signing_key(SigningKey::from_rs256_pem_files("2024-01", "private.pem", "public.pem")?)
//!         .with_lockout_config(LockoutConfig::default().with_max_failed_attempts(3))
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use warden_core::{RepositoryProvider, token::KeyRing};

use crate::{LockoutConfig, PasswordConfig, SigningKey, TokenConfig, Warden, WardenConfig};

/// Errors that can occur when building a Warden instance.
#[derive(Debug, thiserror::Error)]
pub enum WardenBuilderError {
    /// Failed to connect to storage backend
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    /// Failed to run database migrations
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Marker type indicating no storage has been configured yet.
///
/// This is the initial state of [`WardenBuilder`].
pub struct NoStorage;

/// Marker type indicating storage has been configured.
pub struct WithStorage<R: RepositoryProvider> {
    repositories: Arc<R>,
}

/// A type-safe builder for constructing [`Warden`] instances.
///
/// Storage must be configured before [`WardenBuilder::build`] is available.
///
/// # Type States
///
/// - [`NoStorage`]: Initial state, storage must be configured
/// - [`WithStorage<R>`]: Storage configured, ready to build or add more configuration
pub struct WardenBuilder<Storage> {
    storage: Storage,
    config: WardenConfig,
    signing_key: Option<SigningKey>,
    verification_keys: Vec<SigningKey>,
    apply_migrations: bool,
}

impl Default for WardenBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl WardenBuilder<NoStorage> {
    /// Create a new builder with default configuration.
    ///
    /// # Defaults
    ///
    /// - Access tokens: 30 minutes, refresh tokens: 7 days
    /// - Lockout: enabled, 5 attempts, 30 minute lockout
    /// - Password hashing: argon2id with the argon2 crate's default cost
    /// - Signing key: a random HS256 key (tokens do not survive a restart)
    /// - Apply migrations: false
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            config: WardenConfig::default(),
            signing_key: None,
            verification_keys: Vec::new(),
            apply_migrations: false,
        }
    }

    /// Use an existing repository provider.
    pub fn with_repositories<R: RepositoryProvider>(
        self,
        repositories: Arc<R>,
    ) -> WardenBuilder<WithStorage<R>> {
        WardenBuilder {
            storage: WithStorage { repositories },
            config: self.config,
            signing_key: self.signing_key,
            verification_keys: self.verification_keys,
            apply_migrations: self.apply_migrations,
        }
    }
}

#[cfg(feature = "sqlite")]
impl WardenBuilder<NoStorage> {
    /// Configure SQLite storage by connecting to the given URL.
    ///
    /// An in-memory URL gets a single long-lived connection so every query
    /// sees the same database.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite::memory:" or "sqlite://path/to/db.sqlite")
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<WardenBuilder<WithStorage<crate::SqliteRepositoryProvider>>, WardenBuilderError>
    {
        use std::str::FromStr;

        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| WardenBuilderError::StorageConnection(e.to_string()))?;

        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<std::time::Duration>)
                .max_lifetime(None::<std::time::Duration>)
        } else {
            SqlitePoolOptions::new()
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| WardenBuilderError::StorageConnection(e.to_string()))?;

        Ok(self.with_sqlite_pool(pool))
    }

    /// Configure SQLite storage with an existing connection pool.
    ///
    /// # Arguments
    ///
    /// * `pool` - An existing SQLite connection pool
    pub fn with_sqlite_pool(
        self,
        pool: crate::SqlitePool,
    ) -> WardenBuilder<WithStorage<crate::SqliteRepositoryProvider>> {
        self.with_repositories(Arc::new(crate::SqliteRepositoryProvider::new(pool)))
    }
}

impl<R: RepositoryProvider> WardenBuilder<WithStorage<R>> {
    /// Set access/refresh lifetimes and the issuer claim.
    pub fn with_token_config(mut self, config: TokenConfig) -> Self {
        self.config.token = config;
        self
    }

    /// Configure account lockout.
    ///
    /// Default: Enabled with 5 attempts and a 30 minute lockout
    pub fn with_lockout_config(mut self, config: LockoutConfig) -> Self {
        self.config.lockout = config;
        self
    }

    /// Configure the password hash cost and decoy digest.
    pub fn with_password_config(mut self, config: PasswordConfig) -> Self {
        self.config.password = config;
        self
    }

    /// Replace the whole configuration at once.
    pub fn with_config(mut self, config: WardenConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the key new tokens are signed with.
    pub fn with_signing_key(mut self, key: SigningKey) -> Self {
        self.signing_key = Some(key);
        self
    }

    /// Accept tokens signed with a previous key without signing new ones with it.
    pub fn with_verification_key(mut self, key: SigningKey) -> Self {
        self.verification_keys.push(key);
        self
    }

    /// Set whether to automatically apply database migrations during build.
    ///
    /// Default: false
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }

    /// Build the Warden instance.
    ///
    /// If `apply_migrations(true)` was called, migrations will be applied
    /// before returning.
    pub async fn build(self) -> Result<Warden<R>, WardenBuilderError> {
        let keys = key_ring(self.signing_key, self.verification_keys)?;

        if self.apply_migrations {
            self.storage
                .repositories
                .migrate()
                .await
                .map_err(|e| WardenBuilderError::Migration(e.to_string()))?;
        }

        Warden::from_parts(self.storage.repositories, self.config, keys)
    }
}

/// Assemble the key ring with `active` as the signing key.
fn key_ring(
    active: Option<SigningKey>,
    verification_keys: Vec<SigningKey>,
) -> Result<KeyRing, WardenBuilderError> {
    let active = match active {
        Some(key) => key,
        None => {
            tracing::warn!(
                "No signing key configured; using a random HS256 key. Tokens will not survive a restart"
            );
            SigningKey::random_hs256("default")
                .map_err(|e| WardenBuilderError::InvalidConfiguration(e.to_string()))?
        }
    };

    let mut keys = verification_keys.into_iter();
    let Some(first) = keys.next() else {
        return Ok(KeyRing::new(active));
    };

    let mut ring = KeyRing::new(first);
    for key in keys.chain(std::iter::once(active)) {
        ring.rotate(key)
            .map_err(|e| WardenBuilderError::InvalidConfiguration(e.to_string()))?;
    }
    Ok(ring)
}
