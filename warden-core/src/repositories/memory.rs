//! In-memory account storage
//!
//! Backed by [`DashMap`], so every per-account read-modify-write happens under
//! that account's shard lock. Useful for tests and single-process deployments;
//! nothing survives a restart.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};

use crate::{
    Account, AccountId, Error, NewAccount,
    error::StorageError,
    lockout::{LockoutConfig, LockoutRecord},
    repositories::{AccountRepository, AccountRepositoryProvider, RepositoryProvider},
};

#[derive(Debug, Default)]
pub struct InMemoryAccountRepository {
    accounts: DashMap<AccountId, Account>,
    emails: DashMap<String, AccountId>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn create(&self, account: NewAccount) -> Result<Account, Error> {
        match self.emails.entry(account.email.clone()) {
            Entry::Occupied(_) => Err(StorageError::Constraint(
                "email already registered".to_string(),
            )
            .into()),
            Entry::Vacant(slot) => {
                if self.accounts.contains_key(&account.id) {
                    return Err(
                        StorageError::Constraint("account id already exists".to_string()).into(),
                    );
                }
                let account = account.into_account();
                self.accounts.insert(account.id.clone(), account.clone());
                slot.insert(account.id.clone());
                Ok(account)
            }
        }
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error> {
        Ok(self.accounts.get(id).map(|entry| entry.value().clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, Error> {
        let Some(id) = self.emails.get(email).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        self.find_by_id(&id).await
    }

    async fn update_lockout_state(
        &self,
        id: &AccountId,
        expected: LockoutRecord,
        new: LockoutRecord,
    ) -> Result<bool, Error> {
        let Some(mut account) = self.accounts.get_mut(id) else {
            return Ok(false);
        };

        if account.lockout() != expected {
            return Ok(false);
        }

        account.failed_attempts = new.failed_attempts;
        account.locked_until = new.locked_until;
        account.updated_at = Utc::now();
        Ok(true)
    }

    async fn record_failed_attempt(
        &self,
        id: &AccountId,
        config: &LockoutConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<LockoutRecord>, Error> {
        let Some(mut account) = self.accounts.get_mut(id) else {
            return Ok(None);
        };

        let current = account.lockout();
        let next = current.on_failure(config, now);
        if next != current {
            account.failed_attempts = next.failed_attempts;
            account.locked_until = next.locked_until;
            account.updated_at = Utc::now();
        }
        Ok(Some(next))
    }

    async fn account_exists_and_unlocked(
        &self,
        id: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<bool, Error> {
        Ok(self
            .accounts
            .get(id)
            .is_some_and(|account| !account.lockout().is_locked(now)))
    }

    async fn update_password_hash(&self, id: &AccountId, password_hash: &str) -> Result<(), Error> {
        let mut account = self.accounts.get_mut(id).ok_or(StorageError::NotFound)?;
        account.password_hash = password_hash.to_string();
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: &AccountId) -> Result<bool, Error> {
        let Some((_, account)) = self.accounts.remove(id) else {
            return Ok(false);
        };
        self.emails.remove(&account.email);
        Ok(true)
    }

    async fn release_expired_lockouts(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let mut released = 0;
        for mut account in self.accounts.iter_mut() {
            if account.locked_until.is_some_and(|until| until <= now) {
                account.failed_attempts = 0;
                account.locked_until = None;
                account.updated_at = Utc::now();
                released += 1;
            }
        }
        Ok(released)
    }
}

/// [`RepositoryProvider`] over in-memory storage
#[derive(Debug, Default)]
pub struct InMemoryRepositoryProvider {
    accounts: InMemoryAccountRepository,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountRepositoryProvider for InMemoryRepositoryProvider {
    type AccountRepo = InMemoryAccountRepository;

    fn account(&self) -> &Self::AccountRepo {
        &self.accounts
    }
}

#[async_trait]
impl RepositoryProvider for InMemoryRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        Ok(())
    }
}
