//! Gateway Sync Database Layer
//!
//! This crate provides the domain models mirrored from the gateway and the
//! indexed in-memory store they are kept in. The store is reached through the
//! [`IndexedStore`] capability so the engine behind it can be swapped.

pub mod error;
pub mod memdb;
pub mod models;
pub mod schema;
pub mod store;

pub use error::DbError;
pub use memdb::MemDb;
pub use models::*;
pub use schema::{DbSchema, ID_INDEX, IndexSchema, TableSchema, gateway_schema};
pub use store::{IndexedStore, ReadTxn, Record, WriteTxn};
