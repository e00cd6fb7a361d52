//! Versioned schema migrations for warden storage backends
//!
//! A backend lists its [`Migration`]s in ascending version order and hands them
//! to a [`MigrationManager`], which records applied versions in its own table.
use async_trait::async_trait;
use sqlx::Database;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("Migration {version} is recorded as {recorded:?} but defined as {defined:?}")]
    VersionConflict {
        version: i64,
        recorded: String,
        defined: String,
    },
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, MigrationError>;

#[async_trait]
pub trait Migration<DB: Database>: Send + Sync {
    /// Execute the migration
    async fn up<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Rollback the migration
    async fn down<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Unique version number for ordering migrations
    fn version(&self) -> i64;

    /// Human readable name of the migration
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: i64, // unix timestamp since no database can agree on a datetime type
}

#[async_trait]
pub trait MigrationManager<DB: Database>: Send + Sync {
    fn get_migration_table_name(&self) -> &str {
        "_warden_migrations"
    }

    /// Initialize migration tracking table
    async fn initialize(&self) -> Result<()>;

    /// Apply pending migrations
    async fn up(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Rollback migrations
    async fn down(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Get list of applied migrations
    async fn get_applied_migrations(&self) -> Result<Vec<MigrationRecord>>;

    /// Check if specific migration was applied
    async fn is_applied(&self, version: i64) -> Result<bool>;
}

/// Check that migration versions are unique and strictly ascending
pub fn check_order<DB: Database>(migrations: &[Box<dyn Migration<DB>>]) -> Result<()> {
    check_versions(migrations.iter().map(|m| m.version()))
}

fn check_versions(versions: impl IntoIterator<Item = i64>) -> Result<()> {
    let mut previous: Option<i64> = None;
    for version in versions {
        if let Some(previous) = previous {
            if version <= previous {
                return Err(MigrationError::Migration(format!(
                    "migration version {version} must be greater than {previous}"
                )));
            }
        }
        previous = Some(version);
    }
    Ok(())
}

/// Check that the applied migrations match their definitions by version
pub fn check_applied<DB: Database>(
    applied: &[MigrationRecord],
    migrations: &[Box<dyn Migration<DB>>],
) -> Result<()> {
    check_names(
        applied,
        migrations.iter().map(|m| (m.version(), m.name())),
    )
}

fn check_names<'a>(
    applied: &[MigrationRecord],
    defined: impl IntoIterator<Item = (i64, &'a str)>,
) -> Result<()> {
    for (version, name) in defined {
        let Some(record) = applied.iter().find(|r| r.version == version) else {
            continue;
        };
        if record.name != name {
            return Err(MigrationError::VersionConflict {
                version,
                recorded: record.name.clone(),
                defined: name.to_string(),
            });
        }
    }
    Ok(())
}
