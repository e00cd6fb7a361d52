use crate::{Error, error::StorageError};

/// Extension trait for Result types to simplify database error mapping
///
/// Storage backends use this to turn driver errors into warden storage errors
/// without repeating the same `map_err` closure on every query.
///
/// # Example
///
/// ```rust,ignore
/// use warden_core::error::utilities::DatabaseResultExt;
///
/// sqlx::query("SELECT 1").execute(&pool).await.map_db_err_with_context("Health check failed")?;
/// ```
pub trait DatabaseResultExt<T> {
    /// Convert a database error to a warden storage error with additional context
    fn map_db_err_with_context(self, context: &str) -> Result<T, Error>;
}

impl<T, E: std::fmt::Display> DatabaseResultExt<T> for Result<T, E> {
    fn map_db_err_with_context(self, context: &str) -> Result<T, Error> {
        self.map_err(|e| Error::Storage(StorageError::Database(format!("{context}: {e}"))))
    }
}
