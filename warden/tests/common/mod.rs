#![allow(dead_code)]

use chrono::{DateTime, Utc};
use warden::{PasswordConfig, SigningKey};
#[cfg(feature = "sqlite")]
use warden::{LockoutConfig, SqlitePool, SqliteRepositoryProvider, Warden, WardenBuilder};

// Test secret for HS256
pub const TEST_HS256_SECRET: &[u8] = b"this_is_a_test_secret_key_for_hs256_jwt_tokens_not_for_prod";

pub const EMAIL: &str = "user@example.com";
pub const PASSWORD: &str = "Correct#Horse1";

/// A fixed instant plus `seconds`
pub fn at(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
}

/// Cheap argon2 parameters so tests stay fast
pub fn fast_hashing() -> PasswordConfig {
    PasswordConfig::default().with_cost(1024, 1, 1)
}

pub fn signing_key(id: &str) -> SigningKey {
    SigningKey::hs256(id, TEST_HS256_SECRET).unwrap()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[cfg(feature = "sqlite")]
pub async fn memory_pool() -> SqlitePool {
    sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite")
}

#[cfg(feature = "sqlite")]
pub async fn warden_with_lockout(lockout: LockoutConfig) -> Warden<SqliteRepositoryProvider> {
    init_tracing();
    WardenBuilder::new()
        .with_sqlite("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite")
        .with_signing_key(signing_key("test-key"))
        .with_password_config(fast_hashing())
        .with_lockout_config(lockout)
        .apply_migrations(true)
        .build()
        .await
        .expect("Failed to build Warden")
}

#[cfg(feature = "sqlite")]
pub async fn warden() -> Warden<SqliteRepositoryProvider> {
    warden_with_lockout(LockoutConfig::default()).await
}

/// A warden over a temporary on-disk database with a multi-connection pool
///
/// Returns the database path so the caller can remove it.
#[cfg(feature = "sqlite")]
pub async fn file_warden_with_lockout(
    lockout: LockoutConfig,
) -> (Warden<SqliteRepositoryProvider>, std::path::PathBuf) {
    init_tracing();
    let path = std::env::temp_dir().join(format!(
        "warden-test-{}-{}.db",
        std::process::id(),
        Utc::now().timestamp_micros()
    ));
    let warden = WardenBuilder::new()
        .with_sqlite(&format!("sqlite://{}?mode=rwc", path.display()))
        .await
        .expect("Failed to open SQLite file")
        .with_signing_key(signing_key("test-key"))
        .with_password_config(fast_hashing())
        .with_lockout_config(lockout)
        .apply_migrations(true)
        .build()
        .await
        .expect("Failed to build Warden");
    (warden, path)
}
