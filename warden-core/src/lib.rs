//! Core functionality for the warden project
//!
//! This crate contains the credential-issuance core: password verification,
//! per-account lockout tracking and signed token issuance.
//!
//! Storage is abstracted behind the [`AccountRepository`] trait so the core never
//! talks to a database directly. An in-memory implementation lives in
//! [`repositories::memory`]; the SQLite backend lives in `warden-storage-sqlite`.
//!
//! The services in [`services`] are wired together by the `warden` facade crate,
//! which is the intended entry point for application code.
pub mod account;
pub mod error;
pub mod id;
pub mod lockout;
pub mod password;
pub mod repositories;
pub mod services;
pub mod token;
pub mod validation;

pub use account::{Account, AccountId, AccountSummary, NewAccount};
pub use error::Error;
pub use lockout::{LockoutConfig, LockoutRecord, LockoutStatus};
pub use password::{PasswordConfig, PasswordHasher};
pub use repositories::{AccountRepository, RepositoryProvider};
pub use token::{Claims, SigningKey, TokenConfig, TokenKind, TokenPair};
