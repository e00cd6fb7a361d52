//! SQLite implementation of the account repository.
//!
//! Timestamps are stored as unix seconds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use warden_core::{
    Account, AccountId, Error, NewAccount,
    error::{StorageError, utilities::DatabaseResultExt},
    lockout::{LockoutConfig, LockoutRecord},
    repositories::AccountRepository,
};

const ACCOUNT_COLUMNS: &str =
    "id, email, password_hash, failed_attempts, locked_until, created_at, updated_at";

pub struct SqliteAccountRepository {
    pool: SqlitePool,
}

impl SqliteAccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Internal struct for account rows
#[derive(Debug, sqlx::FromRow)]
struct SqliteAccount {
    id: String,
    email: String,
    password_hash: String,
    failed_attempts: i64,
    locked_until: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

fn from_timestamp(seconds: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
        Error::Storage(StorageError::Database(format!(
            "Invalid timestamp: {seconds}"
        )))
    })
}

impl TryFrom<SqliteAccount> for Account {
    type Error = Error;

    fn try_from(row: SqliteAccount) -> Result<Self, Self::Error> {
        Ok(Account {
            id: AccountId::new(&row.id),
            email: row.email,
            password_hash: row.password_hash,
            failed_attempts: failed_attempts(row.failed_attempts)?,
            locked_until: row.locked_until.map(from_timestamp).transpose()?,
            created_at: from_timestamp(row.created_at)?,
            updated_at: from_timestamp(row.updated_at)?,
        })
    }
}

/// Lockout columns returned by an `UPDATE … RETURNING`
#[derive(Debug, sqlx::FromRow)]
struct SqliteLockout {
    failed_attempts: i64,
    locked_until: Option<i64>,
}

impl TryFrom<SqliteLockout> for LockoutRecord {
    type Error = Error;

    fn try_from(row: SqliteLockout) -> Result<Self, Self::Error> {
        Ok(LockoutRecord {
            failed_attempts: failed_attempts(row.failed_attempts)?,
            locked_until: row.locked_until.map(from_timestamp).transpose()?,
        })
    }
}

fn failed_attempts(count: i64) -> Result<u32, Error> {
    u32::try_from(count).map_err(|_| {
        Error::Storage(StorageError::Database(format!(
            "Invalid failed attempt count: {count}"
        )))
    })
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn create(&self, account: NewAccount) -> Result<Account, Error> {
        let created_at = account.created_at.timestamp();

        let result = sqlx::query_as::<_, SqliteAccount>(&format!(
            r#"
            INSERT INTO accounts (id, email, password_hash, failed_attempts, locked_until, created_at, updated_at)
            VALUES (?1, ?2, ?3, 0, NULL, ?4, ?4)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(account.id.as_str())
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await;

        let row = match result {
            Err(sqlx::Error::Database(ref db)) if db.is_unique_violation() => {
                return Err(Error::Storage(StorageError::Constraint(
                    "Email already registered".to_string(),
                )));
            }
            other => other.map_db_err_with_context("Failed to create account")?,
        };

        row.try_into()
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error> {
        let row = sqlx::query_as::<_, SqliteAccount>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_db_err_with_context("Failed to find account by id")?;

        row.map(Account::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, Error> {
        let row = sqlx::query_as::<_, SqliteAccount>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ?1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_db_err_with_context("Failed to find account by email")?;

        row.map(Account::try_from).transpose()
    }

    async fn update_lockout_state(
        &self,
        id: &AccountId,
        expected: LockoutRecord,
        new: LockoutRecord,
    ) -> Result<bool, Error> {
        // `IS` matches NULL against NULL
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET failed_attempts = ?1, locked_until = ?2, updated_at = ?3
            WHERE id = ?4 AND failed_attempts = ?5 AND locked_until IS ?6
            "#,
        )
        .bind(i64::from(new.failed_attempts))
        .bind(new.locked_until.map(|t| t.timestamp()))
        .bind(Utc::now().timestamp())
        .bind(id.as_str())
        .bind(i64::from(expected.failed_attempts))
        .bind(expected.locked_until.map(|t| t.timestamp()))
        .execute(&self.pool)
        .await
        .map_db_err_with_context("Failed to update lockout state")?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_failed_attempt(
        &self,
        id: &AccountId,
        config: &LockoutConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<LockoutRecord>, Error> {
        // SET expressions all read the row as it was before the update, so the
        // whole transition happens in one statement. ?2 is now, ?3 the
        // threshold and ?4 the end of a lockout starting now.
        let row = sqlx::query_as::<_, SqliteLockout>(
            r#"
            UPDATE accounts
            SET failed_attempts = CASE
                    WHEN locked_until > ?2 THEN failed_attempts
                    WHEN locked_until IS NOT NULL THEN 1
                    ELSE failed_attempts + 1
                END,
                locked_until = CASE
                    WHEN locked_until > ?2 THEN locked_until
                    WHEN (CASE WHEN locked_until IS NOT NULL THEN 1 ELSE failed_attempts + 1 END) >= ?3 THEN ?4
                    ELSE NULL
                END,
                updated_at = CASE
                    WHEN locked_until > ?2 THEN updated_at
                    ELSE ?5
                END
            WHERE id = ?1
            RETURNING failed_attempts, locked_until
            "#,
        )
        .bind(id.as_str())
        .bind(now.timestamp())
        .bind(i64::from(config.max_failed_attempts))
        .bind(config.lock_deadline(now).timestamp())
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await
        .map_db_err_with_context("Failed to record failed attempt")?;

        row.map(LockoutRecord::try_from).transpose()
    }

    async fn account_exists_and_unlocked(
        &self,
        id: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let usable: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM accounts
                WHERE id = ?1 AND (locked_until IS NULL OR locked_until <= ?2)
            )
            "#,
        )
        .bind(id.as_str())
        .bind(now.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_db_err_with_context("Failed to check account state")?;

        Ok(usable)
    }

    async fn update_password_hash(&self, id: &AccountId, password_hash: &str) -> Result<(), Error> {
        let result =
            sqlx::query("UPDATE accounts SET password_hash = ?1, updated_at = ?2 WHERE id = ?3")
                .bind(password_hash)
                .bind(Utc::now().timestamp())
                .bind(id.as_str())
                .execute(&self.pool)
                .await
                .map_db_err_with_context("Failed to update password hash")?;

        if result.rows_affected() == 0 {
            return Err(Error::Storage(StorageError::NotFound));
        }
        Ok(())
    }

    async fn delete(&self, id: &AccountId) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_db_err_with_context("Failed to delete account")?;

        Ok(result.rows_affected() > 0)
    }

    async fn release_expired_lockouts(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET failed_attempts = 0, locked_until = NULL, updated_at = ?1
            WHERE locked_until IS NOT NULL AND locked_until <= ?1
            "#,
        )
        .bind(now.timestamp())
        .execute(&self.pool)
        .await
        .map_db_err_with_context("Failed to release expired lockouts")?;

        Ok(result.rows_affected())
    }
}
