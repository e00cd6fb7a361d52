//! Accounts and account identifiers
//!
//! An account is the credential record the core authenticates against:
//!
//! | Field             | Type               | Description                                        |
//! | ----------------- | ------------------ | -------------------------------------------------- |
//! | `id`              | `AccountId`        | Opaque prefixed identifier (`acc_...`).            |
//! | `email`           | `String`           | Normalized email (trimmed, lowercase), unique.     |
//! | `password_hash`   | `String`           | Self-describing PHC digest.                        |
//! | `failed_attempts` | `u32`              | Consecutive failed logins since the last success.  |
//! | `locked_until`    | `Option<DateTime>` | End of the current lockout window, if any.         |
//! | `created_at`      | `DateTime`         | When the account was registered.                   |
//! | `updated_at`      | `DateTime`         | When the account row last changed.                 |
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    id::{generate_prefixed_id, validate_prefixed_id},
    lockout::LockoutRecord,
};

const ACCOUNT_ID_PREFIX: &str = "acc";

/// A unique, stable identifier for an account
///
/// This value should be treated as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: &str) -> Self {
        AccountId(id.to_string())
    }

    pub fn new_random() -> Self {
        AccountId(generate_prefixed_id(ACCOUNT_ID_PREFIX))
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this ID has the shape of a generated account ID
    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, ACCOUNT_ID_PREFIX)
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new_random()
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalize an email address for storage and lookup
///
/// Lookups are case-insensitive: `" User@Example.com "` and `"user@example.com"`
/// name the same account.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A stored account, including its credential and lockout state
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub password_hash: String,
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// The lockout fragment of this account
    pub fn lockout(&self) -> LockoutRecord {
        LockoutRecord {
            failed_attempts: self.failed_attempts,
            locked_until: self.locked_until,
        }
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
        }
    }
}

// The digest stays out of logs.
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("failed_attempts", &self.failed_attempts)
            .field("locked_until", &self.locked_until)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Input for creating an account in a repository
#[derive(Clone)]
pub struct NewAccount {
    pub id: AccountId,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl NewAccount {
    /// Create a new account record with a random ID. The email is normalized.
    pub fn new(email: &str, password_hash: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id: AccountId::new_random(),
            email: normalize_email(email),
            password_hash,
            created_at,
        }
    }

    pub fn with_id(mut self, id: AccountId) -> Self {
        self.id = id;
        self
    }

    /// The account as it looks right after creation
    pub fn into_account(self) -> Account {
        Account {
            id: self.id,
            email: self.email,
            password_hash: self.password_hash,
            failed_attempts: 0,
            locked_until: None,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

impl fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccount")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Public view of an account returned from registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: AccountId,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_random() {
        let id = AccountId::new_random();
        assert!(id.as_str().starts_with("acc_"));
        assert!(id.is_valid());
        assert!(!AccountId::new("usr_123").is_valid());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("User@Example.com"), "user@example.com");
        assert_eq!(normalize_email("  user@example.com\t"), "user@example.com");
        assert_eq!(
            normalize_email("User@Example.com"),
            normalize_email("user@example.com")
        );
    }

    #[test]
    fn test_new_account_normalizes_email() {
        let new_account = NewAccount::new(" Alice@Example.COM ", "digest".to_string(), Utc::now());
        assert_eq!(new_account.email, "alice@example.com");

        let account = new_account.into_account();
        assert_eq!(account.failed_attempts, 0);
        assert!(account.locked_until.is_none());
        assert_eq!(account.created_at, account.updated_at);
    }

    #[test]
    fn test_debug_redacts_password_hash() {
        let account = NewAccount::new("a@example.com", "$argon2id$secret".to_string(), Utc::now())
            .into_account();
        let debug = format!("{account:?}");
        assert!(!debug.contains("$argon2id$secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_summary_serializes_without_hash() {
        let account = NewAccount::new("a@example.com", "$argon2id$secret".to_string(), Utc::now())
            .into_account();
        let json = serde_json::to_string(&account.summary()).unwrap();
        assert!(json.contains("a@example.com"));
        assert!(!json.contains("argon2id"));
    }
}
