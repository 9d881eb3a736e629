//! Database error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    #[error("Invalid schema: {0}")]
    Schema(String),

    #[error("Record not found")]
    NotFound,

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown index {index} on table {table}")]
    UnknownIndex { table: String, index: String },

    #[error("Missing value for index {index} on table {table}")]
    MissingIndexValue { table: String, index: String },

    #[error("Duplicate value {value} for unique index {index} on table {table}")]
    UniqueViolation {
        table: String,
        index: String,
        value: String,
    },

    #[error("Record for table {found} cannot be stored in table {table}")]
    WrongTable { table: String, found: String },
}
