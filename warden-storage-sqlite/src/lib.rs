//! SQLite storage backend for warden
//!
//! ```rust,ignore
//! let pool = SqlitePool::connect("sqlite://warden.db?mode=rwc").await?;
//! let provider = SqliteRepositoryProvider::new(pool);
//! provider.migrate().await?;
//! ```

pub mod migrations;
pub mod repositories;

pub use repositories::{SqliteAccountRepository, SqliteRepositoryProvider};
pub use sqlx::SqlitePool;
