//! Account lockout service.
//!
//! Applies the [`crate::lockout`] state machine to stored accounts. A failed
//! attempt is one atomic [`AccountRepository::record_failed_attempt`] call, so
//! concurrent failures are all counted without retrying. Resets (success and
//! admin unlock) read the account, compute the next state and write it back with
//! [`AccountRepository::update_lockout_state`], retrying from a fresh read when
//! the compare-and-swap loses a race.
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_core::services::LockoutService;
//! use warden_core::LockoutConfig;
//!
//! let service = LockoutService::new(repository, LockoutConfig::default());
//!
//! let status = service.record_failure(&account.id).await?;
//! if status.is_locked {
//!     // further attempts are rejected until the window ends
//! }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    Account, AccountId, Error,
    error::{AuthError, StorageError},
    lockout::{LockoutConfig, LockoutRecord, LockoutStatus},
    repositories::AccountRepository,
};

/// Upper bound on compare-and-swap rounds for one reset
const MAX_CAS_ATTEMPTS: usize = 16;

/// Service for tracking failed logins and enforcing lockout.
///
/// # Thread Safety
///
/// This service is thread-safe and can be shared across multiple tasks. It
/// holds no per-account state of its own; all coordination happens in the
/// repository.
pub struct LockoutService<R: AccountRepository> {
    repository: Arc<R>,
    config: LockoutConfig,
}

impl<R: AccountRepository> LockoutService<R> {
    pub fn new(repository: Arc<R>, config: LockoutConfig) -> Self {
        Self { repository, config }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// Check if lockout is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Whether an already loaded account is locked at `now`. Read-only.
    pub fn is_account_locked(&self, account: &Account, now: DateTime<Utc>) -> bool {
        self.config.enabled && account.lockout().is_locked(now)
    }

    /// Whether the account is currently locked. Read-only.
    pub async fn is_locked(&self, id: &AccountId) -> Result<bool, Error> {
        self.is_locked_at(id, Utc::now()).await
    }

    pub async fn is_locked_at(&self, id: &AccountId, now: DateTime<Utc>) -> Result<bool, Error> {
        if !self.config.enabled {
            return Ok(false);
        }

        let account = self.load(id).await?;
        Ok(self.is_account_locked(&account, now))
    }

    /// Get the lockout status of an account.
    pub async fn lockout_status(&self, id: &AccountId) -> Result<LockoutStatus, Error> {
        self.lockout_status_at(id, Utc::now()).await
    }

    pub async fn lockout_status_at(
        &self,
        id: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<LockoutStatus, Error> {
        if !self.config.enabled {
            return Ok(LockoutStatus::unlocked());
        }

        let account = self.load(id).await?;
        Ok(LockoutStatus::from_record(account.lockout(), now))
    }

    /// Record a failed login attempt.
    ///
    /// If protection is disabled, this is a no-op that returns an unlocked status.
    ///
    /// # Returns
    ///
    /// The lockout status after the attempt was recorded.
    pub async fn record_failure(&self, id: &AccountId) -> Result<LockoutStatus, Error> {
        self.record_failure_at(id, Utc::now()).await
    }

    pub async fn record_failure_at(
        &self,
        id: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<LockoutStatus, Error> {
        if !self.config.enabled {
            return Ok(LockoutStatus::unlocked());
        }

        let next = self
            .repository
            .record_failed_attempt(id, &self.config, now)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        if next.is_locked(now) {
            tracing::warn!(
                account_id = %id,
                failed_attempts = next.failed_attempts,
                locked_until = ?next.locked_until,
                "Account locked after repeated failed logins"
            );
        } else {
            tracing::debug!(
                account_id = %id,
                failed_attempts = next.failed_attempts,
                "Recorded failed login"
            );
        }

        Ok(LockoutStatus::from_record(next, now))
    }

    /// Reset the failure counter after a successful login.
    ///
    /// Fails with [`AuthError::AccountLocked`] if the account became locked
    /// between the caller's check and this write.
    pub async fn record_success(&self, id: &AccountId) -> Result<(), Error> {
        self.record_success_at(id, Utc::now()).await
    }

    pub async fn record_success_at(&self, id: &AccountId, now: DateTime<Utc>) -> Result<(), Error> {
        if !self.config.enabled {
            return Ok(());
        }

        self.transition(id, |current| {
            if current.is_locked(now) {
                return Err(AuthError::AccountLocked.into());
            }
            Ok(current.on_success())
        })
        .await?;

        Ok(())
    }

    /// Unlock an account regardless of its state (admin action).
    ///
    /// # Returns
    ///
    /// `true` if the account was locked, `false` otherwise.
    pub async fn unlock(&self, id: &AccountId) -> Result<bool, Error> {
        self.unlock_at(id, Utc::now()).await
    }

    pub async fn unlock_at(&self, id: &AccountId, now: DateTime<Utc>) -> Result<bool, Error> {
        let mut was_locked = false;
        self.transition(id, |current| {
            was_locked = current.is_locked(now);
            Ok(LockoutRecord::default())
        })
        .await?;

        if was_locked {
            tracing::info!(account_id = %id, "Account unlocked");
        }
        Ok(was_locked)
    }

    /// Clear every expired lockout in one pass.
    pub async fn release_expired_lockouts(&self) -> Result<u64, Error> {
        self.release_expired_lockouts_at(Utc::now()).await
    }

    pub async fn release_expired_lockouts_at(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        self.repository.release_expired_lockouts(now).await
    }

    /// Start the background sweeper.
    ///
    /// Expired lockouts are also cleared lazily on the next login attempt; the
    /// sweeper keeps rows tidy for accounts nobody tries again.
    ///
    /// # Arguments
    ///
    /// * `shutdown` - A watch receiver that signals when to stop the task
    pub fn start_sweeper(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let repository = Arc::clone(&self.repository);
        let period = self.config.sweep_interval;

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(period);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        match repository.release_expired_lockouts(Utc::now()).await {
                            Ok(count) if count > 0 => {
                                tracing::info!(count = count, "Released expired account lockouts");
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Failed to release expired account lockouts");
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down lockout sweeper");
                        break;
                    }
                }
            }
        })
    }

    async fn load(&self, id: &AccountId) -> Result<Account, Error> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AuthError::AccountNotFound.into())
    }

    /// Read, apply `step`, compare-and-swap; repeat on conflict.
    ///
    /// A step that leaves the record unchanged writes nothing.
    async fn transition<F>(&self, id: &AccountId, mut step: F) -> Result<LockoutRecord, Error>
    where
        F: FnMut(LockoutRecord) -> Result<LockoutRecord, Error>,
    {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let current = self.load(id).await?.lockout();
            let next = step(current)?;

            if next == current {
                return Ok(next);
            }

            if self
                .repository
                .update_lockout_state(id, current, next)
                .await?
            {
                return Ok(next);
            }

            tracing::debug!(
                account_id = %id,
                attempt = attempt,
                "Lockout state changed concurrently, retrying"
            );
        }

        tracing::error!(
            account_id = %id,
            attempts = MAX_CAS_ATTEMPTS,
            "Gave up updating lockout state under contention"
        );
        Err(StorageError::Conflict(format!("lockout state for account {id}")).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NewAccount, repositories::InMemoryAccountRepository};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
    }

    async fn setup(config: LockoutConfig) -> (LockoutService<InMemoryAccountRepository>, AccountId) {
        let repository = Arc::new(InMemoryAccountRepository::new());
        let account = repository
            .create(NewAccount::new("user@example.com", "digest".to_string(), at(0)))
            .await
            .unwrap();
        (LockoutService::new(repository, config), account.id)
    }

    #[tokio::test]
    async fn test_five_failures_lock_the_account() {
        let (service, id) = setup(LockoutConfig::default()).await;

        for expected in 1..=4 {
            let status = service.record_failure_at(&id, at(0)).await.unwrap();
            assert_eq!(status.failed_attempts, expected);
            assert!(!status.is_locked);
        }

        let status = service.record_failure_at(&id, at(0)).await.unwrap();
        assert!(status.is_locked);
        assert_eq!(status.locked_until, Some(at(30 * 60)));
        assert_eq!(status.retry_after_seconds(at(0)), Some(30 * 60));

        assert!(service.is_locked_at(&id, at(0)).await.unwrap());
        assert!(service.is_locked_at(&id, at(30 * 60 - 1)).await.unwrap());
        assert!(!service.is_locked_at(&id, at(30 * 60)).await.unwrap());
    }

    #[tokio::test]
    async fn test_is_locked_does_not_change_state() {
        let (service, id) = setup(LockoutConfig::default()).await;
        service.record_failure_at(&id, at(0)).await.unwrap();

        for _ in 0..5 {
            assert!(!service.is_locked_at(&id, at(0)).await.unwrap());
        }
        let status = service.lockout_status_at(&id, at(0)).await.unwrap();
        assert_eq!(status.failed_attempts, 1);
    }

    #[tokio::test]
    async fn test_success_resets_counter() {
        let (service, id) = setup(LockoutConfig::default()).await;
        for _ in 0..3 {
            service.record_failure_at(&id, at(0)).await.unwrap();
        }

        service.record_success_at(&id, at(1)).await.unwrap();
        let status = service.lockout_status_at(&id, at(1)).await.unwrap();
        assert_eq!(status.failed_attempts, 0);
    }

    #[tokio::test]
    async fn test_success_while_locked_fails() {
        let (service, id) = setup(LockoutConfig::default()).await;
        for _ in 0..5 {
            service.record_failure_at(&id, at(0)).await.unwrap();
        }

        assert!(matches!(
            service.record_success_at(&id, at(10)).await,
            Err(Error::Auth(AuthError::AccountLocked))
        ));
    }

    #[tokio::test]
    async fn test_failure_after_lockout_expires_starts_over() {
        let (service, id) = setup(LockoutConfig::default()).await;
        for _ in 0..5 {
            service.record_failure_at(&id, at(0)).await.unwrap();
        }

        let status = service.record_failure_at(&id, at(30 * 60)).await.unwrap();
        assert_eq!(status.failed_attempts, 1);
        assert!(!status.is_locked);
    }

    /// Repository that sleeps before every read and write, so racing tasks
    /// interleave between them
    struct SlowRepository {
        inner: InMemoryAccountRepository,
        delay: std::time::Duration,
    }

    #[async_trait]
    impl AccountRepository for SlowRepository {
        async fn create(&self, account: NewAccount) -> Result<Account, Error> {
            self.inner.create(account).await
        }

        async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error> {
            tokio::time::sleep(self.delay).await;
            self.inner.find_by_id(id).await
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<Account>, Error> {
            tokio::time::sleep(self.delay).await;
            self.inner.find_by_email(email).await
        }

        async fn update_lockout_state(
            &self,
            id: &AccountId,
            expected: LockoutRecord,
            new: LockoutRecord,
        ) -> Result<bool, Error> {
            tokio::time::sleep(self.delay).await;
            self.inner.update_lockout_state(id, expected, new).await
        }

        async fn record_failed_attempt(
            &self,
            id: &AccountId,
            config: &LockoutConfig,
            now: DateTime<Utc>,
        ) -> Result<Option<LockoutRecord>, Error> {
            tokio::time::sleep(self.delay).await;
            self.inner.record_failed_attempt(id, config, now).await
        }

        async fn account_exists_and_unlocked(
            &self,
            id: &AccountId,
            now: DateTime<Utc>,
        ) -> Result<bool, Error> {
            self.inner.account_exists_and_unlocked(id, now).await
        }

        async fn update_password_hash(&self, id: &AccountId, hash: &str) -> Result<(), Error> {
            self.inner.update_password_hash(id, hash).await
        }

        async fn delete(&self, id: &AccountId) -> Result<bool, Error> {
            self.inner.delete(id).await
        }

        async fn release_expired_lockouts(&self, now: DateTime<Utc>) -> Result<u64, Error> {
            self.inner.release_expired_lockouts(now).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_failures_on_a_slow_store_are_all_counted() {
        let repository = Arc::new(SlowRepository {
            inner: InMemoryAccountRepository::new(),
            delay: std::time::Duration::from_millis(1),
        });
        let account = repository
            .create(NewAccount::new("user@example.com", "digest".to_string(), at(0)))
            .await
            .unwrap();
        let service = Arc::new(LockoutService::new(
            Arc::clone(&repository),
            LockoutConfig::default().with_max_failed_attempts(1000),
        ));

        let attempts = 4 * MAX_CAS_ATTEMPTS;
        let mut handles = Vec::new();
        for _ in 0..attempts {
            let service = Arc::clone(&service);
            let id = account.id.clone();
            handles.push(tokio::spawn(async move {
                service.record_failure_at(&id, at(0)).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let status = service.lockout_status_at(&account.id, at(0)).await.unwrap();
        assert_eq!(status.failed_attempts as usize, attempts);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_failures_lock_exactly_once() {
        let repository = Arc::new(SlowRepository {
            inner: InMemoryAccountRepository::new(),
            delay: std::time::Duration::from_millis(1),
        });
        let account = repository
            .create(NewAccount::new("user@example.com", "digest".to_string(), at(0)))
            .await
            .unwrap();
        let service = Arc::new(LockoutService::new(
            Arc::clone(&repository),
            LockoutConfig::default(),
        ));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let service = Arc::clone(&service);
            let id = account.id.clone();
            handles.push(tokio::spawn(async move {
                service.record_failure_at(&id, at(0)).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // attempts made once locked are rejected without counting
        let status = service.lockout_status_at(&account.id, at(0)).await.unwrap();
        assert!(status.is_locked);
        assert_eq!(status.failed_attempts, 5);
        assert_eq!(status.locked_until, Some(at(30 * 60)));
    }

    #[tokio::test]
    async fn test_unlock() {
        let (service, id) = setup(LockoutConfig::default()).await;
        assert!(!service.unlock_at(&id, at(0)).await.unwrap());

        for _ in 0..5 {
            service.record_failure_at(&id, at(0)).await.unwrap();
        }
        assert!(service.unlock_at(&id, at(1)).await.unwrap());
        assert!(!service.is_locked_at(&id, at(1)).await.unwrap());
        assert_eq!(
            service.lockout_status_at(&id, at(1)).await.unwrap(),
            LockoutStatus::unlocked()
        );
    }

    #[tokio::test]
    async fn test_disabled_is_a_no_op() {
        let (service, id) = setup(LockoutConfig::disabled()).await;
        for _ in 0..10 {
            let status = service.record_failure_at(&id, at(0)).await.unwrap();
            assert!(!status.is_locked);
        }
        assert!(!service.is_locked_at(&id, at(0)).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let (service, _) = setup(LockoutConfig::default()).await;
        assert!(matches!(
            service.record_failure_at(&AccountId::new_random(), at(0)).await,
            Err(Error::Auth(AuthError::AccountNotFound))
        ));
    }

    /// Repository whose compare-and-swap never succeeds
    struct ContendedRepository {
        inner: InMemoryAccountRepository,
        cas_calls: AtomicUsize,
    }

    #[async_trait]
    impl AccountRepository for ContendedRepository {
        async fn create(&self, account: NewAccount) -> Result<Account, Error> {
            self.inner.create(account).await
        }

        async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<Account>, Error> {
            self.inner.find_by_email(email).await
        }

        async fn update_lockout_state(
            &self,
            _id: &AccountId,
            _expected: LockoutRecord,
            _new: LockoutRecord,
        ) -> Result<bool, Error> {
            self.cas_calls.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        }

        async fn record_failed_attempt(
            &self,
            id: &AccountId,
            config: &LockoutConfig,
            now: DateTime<Utc>,
        ) -> Result<Option<LockoutRecord>, Error> {
            self.inner.record_failed_attempt(id, config, now).await
        }

        async fn account_exists_and_unlocked(
            &self,
            id: &AccountId,
            now: DateTime<Utc>,
        ) -> Result<bool, Error> {
            self.inner.account_exists_and_unlocked(id, now).await
        }

        async fn update_password_hash(&self, id: &AccountId, hash: &str) -> Result<(), Error> {
            self.inner.update_password_hash(id, hash).await
        }

        async fn delete(&self, id: &AccountId) -> Result<bool, Error> {
            self.inner.delete(id).await
        }

        async fn release_expired_lockouts(&self, now: DateTime<Utc>) -> Result<u64, Error> {
            self.inner.release_expired_lockouts(now).await
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_depend_on_compare_and_swap() {
        let repository = Arc::new(ContendedRepository {
            inner: InMemoryAccountRepository::new(),
            cas_calls: AtomicUsize::new(0),
        });
        let account = repository
            .create(NewAccount::new("user@example.com", "digest".to_string(), at(0)))
            .await
            .unwrap();
        let service = LockoutService::new(Arc::clone(&repository), LockoutConfig::default());

        for expected in 1..=3 {
            let status = service.record_failure_at(&account.id, at(0)).await.unwrap();
            assert_eq!(status.failed_attempts, expected);
        }
        assert_eq!(repository.cas_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reset_gives_up_after_bounded_retries() {
        let repository = Arc::new(ContendedRepository {
            inner: InMemoryAccountRepository::new(),
            cas_calls: AtomicUsize::new(0),
        });
        let account = repository
            .create(NewAccount::new("user@example.com", "digest".to_string(), at(0)))
            .await
            .unwrap();
        let service = LockoutService::new(Arc::clone(&repository), LockoutConfig::default());
        service.record_failure_at(&account.id, at(0)).await.unwrap();

        let result = service.record_success_at(&account.id, at(0)).await;
        assert!(matches!(
            result,
            Err(Error::Storage(StorageError::Conflict(_)))
        ));
        assert_eq!(repository.cas_calls.load(Ordering::SeqCst), MAX_CAS_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_sweeper_releases_and_stops() {
        let config =
            LockoutConfig::default().with_sweep_interval(std::time::Duration::from_millis(10));
        let repository = Arc::new(InMemoryAccountRepository::new());
        let account = repository
            .create(NewAccount::new("user@example.com", "digest".to_string(), Utc::now()))
            .await
            .unwrap();
        repository
            .update_lockout_state(
                &account.id,
                LockoutRecord::default(),
                LockoutRecord {
                    failed_attempts: 5,
                    locked_until: Some(Utc::now() - Duration::seconds(5)),
                },
            )
            .await
            .unwrap();

        let service = LockoutService::new(Arc::clone(&repository), config);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = service.start_sweeper(shutdown_rx);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let stored = repository.find_by_id(&account.id).await.unwrap().unwrap();
        assert_eq!(stored.lockout(), LockoutRecord::default());
    }
}
