use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    Account, AccountId, AccountSummary, Error, NewAccount,
    account::normalize_email,
    error::{StorageError, ValidationError},
    password::PasswordHasher,
    repositories::AccountRepository,
    validation::{validate_email, validate_password},
};

/// Service for account registration and administration
pub struct AccountService<R: AccountRepository> {
    repository: Arc<R>,
    hasher: Arc<PasswordHasher>,
}

impl<R: AccountRepository> AccountService<R> {
    pub fn new(repository: Arc<R>, hasher: Arc<PasswordHasher>) -> Self {
        Self { repository, hasher }
    }

    /// Register a new account with a password
    ///
    /// The email is normalized before validation. A taken email fails with
    /// [`ValidationError::EmailUnavailable`].
    pub async fn register(&self, email: &str, password: &str) -> Result<AccountSummary, Error> {
        self.register_at(email, password, Utc::now()).await
    }

    pub async fn register_at(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<AccountSummary, Error> {
        let email = normalize_email(email);
        validate_email(&email)?;
        validate_password(password)?;

        if self.repository.find_by_email(&email).await?.is_some() {
            return Err(ValidationError::EmailUnavailable.into());
        }

        let password_hash = self.hasher.hash_async(password).await?;

        let account = match self
            .repository
            .create(NewAccount::new(&email, password_hash, now))
            .await
        {
            Ok(account) => account,
            // lost a race with a concurrent registration
            Err(Error::Storage(StorageError::Constraint(_))) => {
                return Err(ValidationError::EmailUnavailable.into());
            }
            Err(e) => return Err(e),
        };

        tracing::info!(account_id = %account.id, "Registered account");
        Ok(account.summary())
    }

    /// Get an account by ID
    pub async fn get_account(&self, id: &AccountId) -> Result<Option<Account>, Error> {
        self.repository.find_by_id(id).await
    }

    /// Get an account by email, normalizing it first
    pub async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>, Error> {
        self.repository.find_by_email(&normalize_email(email)).await
    }

    /// Delete an account. Returns whether it existed.
    pub async fn delete_account(&self, id: &AccountId) -> Result<bool, Error> {
        let deleted = self.repository.delete(id).await?;
        if deleted {
            tracing::info!(account_id = %id, "Deleted account");
        }
        Ok(deleted)
    }
}
