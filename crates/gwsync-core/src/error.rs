//! Core error types

use gwsync_db::DbError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The table schema is inconsistent. Fatal at startup.
    #[error("Invalid cache schema: {0}")]
    Schema(DbError),

    #[error("Not found")]
    NotFound,

    /// An upstream cannot be deleted while a route references it
    #[error("Still in use")]
    StillInUse,

    #[error("Storage error: {0}")]
    Storage(DbError),
}

impl CoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound)
    }
}

impl From<DbError> for CoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => CoreError::NotFound,
            DbError::Schema(_) => CoreError::Schema(err),
            other => CoreError::Storage(other),
        }
    }
}
