//! Login and refresh orchestration.
//!
//! Login runs in this order:
//!
//! 1. normalize the email and look the account up; an unknown email still pays
//!    for a full hash verification against the decoy digest
//! 2. reject locked accounts before touching the hasher
//! 3. verify the password, recording a failure on mismatch
//! 4. record the success, upgrade an outdated digest and issue both tokens
//!
//! Errors keep their precise cause ([`AuthError::InvalidCredentials`],
//! [`AuthError::AccountLocked`], token errors) for logging. Collapsing them into
//! one caller-facing denial is the facade's job.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    Account, AccountId, AccountSummary, Error,
    account::normalize_email,
    error::AuthError,
    password::PasswordHasher,
    repositories::AccountRepository,
    services::{AccountService, LockoutService, TokenService},
    token::TokenPair,
};

/// Result of a successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub account_id: AccountId,
    pub tokens: TokenPair,
}

pub struct AuthService<R: AccountRepository> {
    repository: Arc<R>,
    hasher: Arc<PasswordHasher>,
    accounts: Arc<AccountService<R>>,
    lockout: Arc<LockoutService<R>>,
    tokens: Arc<TokenService<R>>,
}

impl<R: AccountRepository> AuthService<R> {
    pub fn new(
        repository: Arc<R>,
        hasher: Arc<PasswordHasher>,
        accounts: Arc<AccountService<R>>,
        lockout: Arc<LockoutService<R>>,
        tokens: Arc<TokenService<R>>,
    ) -> Self {
        Self {
            repository,
            hasher,
            accounts,
            lockout,
            tokens,
        }
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<AccountSummary, Error> {
        self.accounts.register(email, password).await
    }

    pub async fn register_at(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<AccountSummary, Error> {
        self.accounts.register_at(email, password, now).await
    }

    /// Authenticate with email and password and issue an access/refresh pair
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, Error> {
        self.login_at(email, password, Utc::now()).await
    }

    pub async fn login_at(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome, Error> {
        let email = normalize_email(email);

        let Some(account) = self.repository.find_by_email(&email).await? else {
            self.hasher.verify_decoy_async(password).await?;
            tracing::info!("Login failed: no account for email");
            return Err(AuthError::InvalidCredentials.into());
        };

        if self.lockout.is_account_locked(&account, now) {
            tracing::warn!(
                account_id = %account.id,
                locked_until = ?account.locked_until,
                "Login rejected: account locked"
            );
            return Err(AuthError::AccountLocked.into());
        }

        if !self
            .hasher
            .verify_async(password, &account.password_hash)
            .await?
        {
            let status = self.lockout.record_failure_at(&account.id, now).await?;
            tracing::info!(
                account_id = %account.id,
                failed_attempts = status.failed_attempts,
                "Login failed: wrong password"
            );
            return Err(AuthError::InvalidCredentials.into());
        }

        self.lockout.record_success_at(&account.id, now).await?;
        self.upgrade_digest(&account, password).await;

        let tokens = self.tokens.issue_pair_at(&account.id, now)?;
        tracing::info!(account_id = %account.id, "Login succeeded");

        Ok(LoginOutcome {
            account_id: account.id,
            tokens,
        })
    }

    /// Exchange a refresh token for a new access token
    ///
    /// The refresh token itself is not reissued.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, Error> {
        self.refresh_at(refresh_token, Utc::now()).await
    }

    pub async fn refresh_at(&self, refresh_token: &str, now: DateTime<Utc>) -> Result<String, Error> {
        let account_id = self.tokens.validate_refresh_at(refresh_token, now).await?;
        let access_token = self.tokens.issue_access_at(&account_id, now)?;
        tracing::debug!(account_id = %account_id, "Issued access token from refresh token");
        Ok(access_token)
    }

    /// Validate an access token without touching storage
    pub fn verify_access(&self, access_token: &str) -> Result<AccountId, Error> {
        self.verify_access_at(access_token, Utc::now())
    }

    pub fn verify_access_at(&self, access_token: &str, now: DateTime<Utc>) -> Result<AccountId, Error> {
        self.tokens.validate_access_at(access_token, now)
    }

    /// Re-hash a correct password whose digest uses outdated cost parameters.
    ///
    /// Failures are logged and do not fail the login.
    async fn upgrade_digest(&self, account: &Account, password: &str) {
        if !self.hasher.needs_rehash(&account.password_hash) {
            return;
        }

        let result = match self.hasher.hash_async(password).await {
            Ok(digest) => {
                self.repository
                    .update_password_hash(&account.id, &digest)
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => tracing::info!(account_id = %account.id, "Upgraded password digest"),
            Err(e) => tracing::warn!(
                account_id = %account.id,
                error = %e,
                "Failed to upgrade password digest"
            ),
        }
    }
}
