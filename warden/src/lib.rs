//! # Warden
//!
//! Warden verifies email/password credentials, locks accounts out after
//! repeated failures and issues signed access and refresh tokens.
//!
//! - Passwords are stored as argon2id digests with a tunable cost
//! - Five consecutive failures lock an account for thirty minutes
//! - Access tokens live for thirty minutes, refresh tokens for seven days
//! - Signing keys can be rotated without invalidating outstanding tokens
//!
//! Every login or refresh failure surfaces as the same [`WardenError::Unauthorized`];
//! the precise cause is only logged.
//!
//! ## Example
//!
//! ```rust,no_run
//! use warden::{SigningKey, WardenBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warden = WardenBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .with_signing_key(SigningKey::hs256("2024-01", b"a secret of at least thirty-two bytes")?)
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     warden.register("user@example.com", "Correct#Horse1").await?;
//!     let login = warden.login("user@example.com", "Correct#Horse1").await?;
//!     let account_id = warden.verify_access_token(&login.access_token)?;
//!     assert_eq!(account_id, login.account_id);
//!
//!     Ok(())
//! }
//! ```
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{sync::watch, task::JoinHandle};
use warden_core::{
    Error, PasswordHasher, RepositoryProvider,
    error::AuthError,
    repositories::AccountRepositoryAdapter,
    services::{AccountService, AuthService, LockoutService, TokenService},
    token::{KeyRing, TokenIssuer},
};

mod builder;

pub use builder::{NoStorage, WardenBuilder, WardenBuilderError, WithStorage};

/// Re-export core types from warden_core
pub use warden_core::{
    AccountId, AccountSummary, LockoutConfig, LockoutStatus, PasswordConfig, SigningKey,
    TokenConfig, error::ValidationError,
};

#[cfg(feature = "sqlite")]
pub use warden_storage_sqlite::{SqlitePool, SqliteRepositoryProvider};

/// The `token_type` reported alongside issued access tokens
pub const TOKEN_TYPE: &str = "bearer";

/// Errors returned to callers of [`Warden`].
///
/// Only validation failures carry detail. Everything else collapses into one
/// of two opaque variants so responses reveal nothing about which emails are
/// registered, which accounts are locked or why a token was rejected.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    /// The input failed validation; safe to show to the caller
    #[error("{0}")]
    Validation(ValidationError),
    /// Authentication failed
    #[error("Unauthorized")]
    Unauthorized,
    /// Something went wrong on our side
    #[error("Internal error")]
    Internal,
}

impl WardenError {
    /// The input field a validation error refers to, for form-level feedback
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Validation(e) => e.field(),
            _ => None,
        }
    }

    /// Map a failure of login or refresh, where no cause may leak.
    fn denied(error: Error) -> Self {
        match Self::from(error) {
            Self::Validation(_) => Self::Unauthorized,
            other => other,
        }
    }
}

impl From<Error> for WardenError {
    fn from(error: Error) -> Self {
        match error {
            Error::Validation(e) => {
                tracing::debug!(error = %e, field = ?e.field(), "Rejected invalid input");
                Self::Validation(e)
            }
            Error::Auth(e) => {
                tracing::warn!(error = %e, "Authentication denied");
                Self::Unauthorized
            }
            Error::Token(e) => {
                tracing::warn!(error = %e, "Token rejected");
                Self::Unauthorized
            }
            Error::Storage(e) => {
                tracing::error!(error = %e, "Storage failure");
                Self::Internal
            }
            Error::Crypto(e) => {
                tracing::error!(error = %e, "Cryptographic failure");
                Self::Internal
            }
        }
    }
}

/// Tunables for a [`Warden`] instance
#[derive(Debug, Clone, Default)]
pub struct WardenConfig {
    pub token: TokenConfig,
    pub lockout: LockoutConfig,
    pub password: PasswordConfig,
}

/// Tokens returned by a successful login
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub account_id: AccountId,
}

impl fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResponse")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("account_id", &self.account_id)
            .finish()
    }
}

/// A new access token minted from a refresh token
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
}

impl fmt::Debug for RefreshResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshResponse")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .finish()
    }
}

type Repo<R> = AccountRepositoryAdapter<R>;

/// The entry point: registration, login, refresh and account administration.
///
/// Build one with [`WardenBuilder`], or with [`Warden::new`] when you already
/// have a repository provider.
pub struct Warden<R: RepositoryProvider> {
    repositories: Arc<R>,
    accounts: Arc<AccountService<Repo<R>>>,
    lockout: Arc<LockoutService<Repo<R>>>,
    tokens: Arc<TokenService<Repo<R>>>,
    auth: AuthService<Repo<R>>,
}

impl<R: RepositoryProvider> Warden<R> {
    /// Create a Warden with default configuration signing with `signing_key`
    pub fn new(repositories: Arc<R>, signing_key: SigningKey) -> Result<Self, WardenBuilderError> {
        Self::from_parts(repositories, WardenConfig::default(), KeyRing::new(signing_key))
    }

    pub(crate) fn from_parts(
        repositories: Arc<R>,
        config: WardenConfig,
        keys: KeyRing,
    ) -> Result<Self, WardenBuilderError> {
        let hasher = Arc::new(
            PasswordHasher::new(&config.password)
                .map_err(|e| WardenBuilderError::InvalidConfiguration(e.to_string()))?,
        );

        let repository = Arc::new(AccountRepositoryAdapter::new(Arc::clone(&repositories)));
        let accounts = Arc::new(AccountService::new(
            Arc::clone(&repository),
            Arc::clone(&hasher),
        ));
        let lockout = Arc::new(LockoutService::new(
            Arc::clone(&repository),
            config.lockout,
        ));
        let tokens = Arc::new(TokenService::new(
            Arc::clone(&repository),
            Arc::new(TokenIssuer::new(config.token, keys)),
        ));
        let auth = AuthService::new(
            repository,
            hasher,
            Arc::clone(&accounts),
            Arc::clone(&lockout),
            Arc::clone(&tokens),
        );

        Ok(Self {
            repositories,
            accounts,
            lockout,
            tokens,
            auth,
        })
    }

    /// Run migrations for all repositories
    pub async fn migrate(&self) -> Result<(), WardenError> {
        Ok(self.repositories.migrate().await?)
    }

    /// Health check for all repositories
    pub async fn health_check(&self) -> Result<(), WardenError> {
        Ok(self.repositories.health_check().await?)
    }

    /// Register an account with an email and password
    ///
    /// Fails with [`WardenError::Validation`] when the email is malformed or
    /// already registered, or the password is too weak.
    pub async fn register(&self, email: &str, password: &str) -> Result<AccountSummary, WardenError> {
        self.register_at(email, password, Utc::now()).await
    }

    pub async fn register_at(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<AccountSummary, WardenError> {
        Ok(self.auth.register_at(email, password, now).await?)
    }

    /// Log in with an email and password
    ///
    /// Unknown emails, wrong passwords and locked accounts all fail with
    /// [`WardenError::Unauthorized`].
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, WardenError> {
        self.login_at(email, password, Utc::now()).await
    }

    pub async fn login_at(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<LoginResponse, WardenError> {
        let outcome = self
            .auth
            .login_at(email, password, now)
            .await
            .map_err(WardenError::denied)?;

        Ok(LoginResponse {
            access_token: outcome.tokens.access_token,
            refresh_token: outcome.tokens.refresh_token,
            token_type: TOKEN_TYPE.to_string(),
            account_id: outcome.account_id,
        })
    }

    /// Exchange a refresh token for a new access token
    ///
    /// The refresh token is not reissued; it stays usable until it expires.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshResponse, WardenError> {
        self.refresh_access_token_at(refresh_token, Utc::now()).await
    }

    pub async fn refresh_access_token_at(
        &self,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshResponse, WardenError> {
        let access_token = self
            .auth
            .refresh_at(refresh_token, now)
            .await
            .map_err(WardenError::denied)?;

        Ok(RefreshResponse {
            access_token,
            token_type: TOKEN_TYPE.to_string(),
        })
    }

    /// Validate an access token and return the account it was issued to
    ///
    /// This does not touch storage.
    pub fn verify_access_token(&self, access_token: &str) -> Result<AccountId, WardenError> {
        self.verify_access_token_at(access_token, Utc::now())
    }

    pub fn verify_access_token_at(
        &self,
        access_token: &str,
        now: DateTime<Utc>,
    ) -> Result<AccountId, WardenError> {
        self.auth
            .verify_access_at(access_token, now)
            .map_err(WardenError::denied)
    }

    /// Get an account by its ID
    pub async fn get_account(&self, id: &AccountId) -> Result<Option<AccountSummary>, WardenError> {
        let account = self.accounts.get_account(id).await?;
        Ok(account.map(|a| a.summary()))
    }

    /// Get the lockout state of an account
    pub async fn lockout_status(&self, id: &AccountId) -> Result<LockoutStatus, WardenError> {
        Ok(self.lockout.lockout_status(id).await?)
    }

    /// Lift a lockout early
    ///
    /// Returns `true` if the account was locked. Unknown accounts return `false`.
    pub async fn unlock_account(&self, id: &AccountId) -> Result<bool, WardenError> {
        match self.lockout.unlock(id).await {
            Ok(was_locked) => Ok(was_locked),
            Err(Error::Auth(AuthError::AccountNotFound)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete an account. Its outstanding refresh tokens stop working.
    pub async fn delete_account(&self, id: &AccountId) -> Result<bool, WardenError> {
        Ok(self.accounts.delete_account(id).await?)
    }

    /// Make `key` the signing key. Tokens signed with earlier keys stay valid.
    pub fn rotate_signing_key(&self, key: SigningKey) -> Result<(), WardenError> {
        Ok(self.tokens.rotate_key(key)?)
    }

    /// Stop accepting tokens signed with a retired key
    pub fn retire_signing_key(&self, key_id: &str) -> bool {
        self.tokens.issuer().drop_retired_key(key_id)
    }

    /// Clear every lockout that has already elapsed
    pub async fn release_expired_lockouts(&self) -> Result<u64, WardenError> {
        Ok(self.lockout.release_expired_lockouts().await?)
    }

    /// Spawn the background task that clears elapsed lockouts.
    ///
    /// The task stops when `shutdown` changes.
    pub fn start_lockout_sweeper(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        self.lockout.start_sweeper(shutdown)
    }
}
