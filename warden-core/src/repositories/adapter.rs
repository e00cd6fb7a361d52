use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Account, AccountId, Error, NewAccount,
    lockout::{LockoutConfig, LockoutRecord},
    repositories::{AccountRepository, RepositoryProvider},
};

/// Adapter that wraps a RepositoryProvider and implements [`AccountRepository`]
pub struct AccountRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> AccountRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> AccountRepository for AccountRepositoryAdapter<R> {
    async fn create(&self, account: NewAccount) -> Result<Account, Error> {
        self.provider.account().create(account).await
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error> {
        self.provider.account().find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, Error> {
        self.provider.account().find_by_email(email).await
    }

    async fn update_lockout_state(
        &self,
        id: &AccountId,
        expected: LockoutRecord,
        new: LockoutRecord,
    ) -> Result<bool, Error> {
        self.provider
            .account()
            .update_lockout_state(id, expected, new)
            .await
    }

    async fn record_failed_attempt(
        &self,
        id: &AccountId,
        config: &LockoutConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<LockoutRecord>, Error> {
        self.provider
            .account()
            .record_failed_attempt(id, config, now)
            .await
    }

    async fn account_exists_and_unlocked(
        &self,
        id: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<bool, Error> {
        self.provider
            .account()
            .account_exists_and_unlocked(id, now)
            .await
    }

    async fn update_password_hash(&self, id: &AccountId, password_hash: &str) -> Result<(), Error> {
        self.provider
            .account()
            .update_password_hash(id, password_hash)
            .await
    }

    async fn delete(&self, id: &AccountId) -> Result<bool, Error> {
        self.provider.account().delete(id).await
    }

    async fn release_expired_lockouts(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.account().release_expired_lockouts(now).await
    }
}
