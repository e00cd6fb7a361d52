//! Repository trait for account credentials and lockout state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Account, AccountId, Error, NewAccount,
    lockout::{LockoutConfig, LockoutRecord},
};

/// Repository for account data access
///
/// Emails passed to and returned from the repository are already normalized.
///
/// # Concurrency
///
/// Lockout state changes through two per-account operations.
/// [`AccountRepository::record_failed_attempt`] applies
/// [`LockoutRecord::on_failure`] to the stored row in one atomic step, so
/// concurrent failed logins are never lost however many race.
/// [`AccountRepository::update_lockout_state`] is a compare-and-swap used for
/// resets. Both must read and write the row as one step (a single `UPDATE`, a
/// row lock, or an equivalent).
#[async_trait]
pub trait AccountRepository: Send + Sync + 'static {
    /// Create a new account
    ///
    /// Fails with `StorageError::Constraint` when the email is already registered.
    async fn create(&self, account: NewAccount) -> Result<Account, Error>;

    /// Find an account by ID
    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error>;

    /// Find an account by normalized email
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, Error>;

    /// Atomically replace the lockout state if it still equals `expected`.
    ///
    /// # Returns
    ///
    /// `true` if the write happened, `false` if the stored state no longer
    /// matched `expected` or the account does not exist.
    async fn update_lockout_state(
        &self,
        id: &AccountId,
        expected: LockoutRecord,
        new: LockoutRecord,
    ) -> Result<bool, Error>;

    /// Atomically apply [`LockoutRecord::on_failure`] to the stored state.
    ///
    /// # Returns
    ///
    /// The state after the failure, or `None` if the account does not exist.
    async fn record_failed_attempt(
        &self,
        id: &AccountId,
        config: &LockoutConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<LockoutRecord>, Error>;

    /// Whether the account exists and is not locked at `now`
    async fn account_exists_and_unlocked(
        &self,
        id: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<bool, Error>;

    /// Replace the stored password digest
    ///
    /// Fails with `StorageError::NotFound` when the account does not exist.
    async fn update_password_hash(&self, id: &AccountId, password_hash: &str) -> Result<(), Error>;

    /// Delete an account. Returns whether an account was removed.
    async fn delete(&self, id: &AccountId) -> Result<bool, Error>;

    /// Clear every lockout that has expired at `now`, resetting its counter.
    ///
    /// # Returns
    ///
    /// The number of accounts released.
    async fn release_expired_lockouts(&self, now: DateTime<Utc>) -> Result<u64, Error>;
}
