//! Indexed table store capability
//!
//! The cache only talks to its storage engine through these traits: open a
//! read or write transaction, look rows up through a named index, mutate, and
//! commit. A write transaction that is dropped without [`WriteTxn::commit`]
//! has no effect on the store.

use std::sync::Arc;

use crate::error::DbError;

/// A row type that can be stored in an indexed table
pub trait Record: Clone + Send + Sync + 'static {
    /// Name of the table this row belongs to
    fn table(&self) -> &'static str;

    /// Value of an indexable field, `None` when the field is unknown or empty
    fn field(&self, name: &str) -> Option<&str>;

    /// Indexable field names of rows stored in `table`
    fn fields(table: &str) -> &'static [&'static str];
}

/// Read access to one consistent version of the store
pub trait ReadTxn {
    type Row: Record;

    /// First row whose `index` value equals `key`
    fn first(&self, table: &str, index: &str, key: &str)
    -> Result<Option<Arc<Self::Row>>, DbError>;

    /// Every row whose `index` value equals `key`
    fn get(&self, table: &str, index: &str, key: &str) -> Result<Vec<Arc<Self::Row>>, DbError>;

    /// Every row reachable through `index`, in index order
    fn iter(&self, table: &str, index: &str) -> Result<Vec<Arc<Self::Row>>, DbError>;
}

/// Write access. Changes become visible to readers only on commit.
pub trait WriteTxn: ReadTxn {
    /// Insert a row, replacing any row with the same primary key
    fn insert(&mut self, table: &str, row: Self::Row) -> Result<(), DbError>;

    /// Delete the row with the same primary key as `row`
    fn delete(&mut self, table: &str, row: &Self::Row) -> Result<(), DbError>;

    /// Publish the changes made in this transaction
    fn commit(self);

    /// Discard the changes made in this transaction
    fn abort(self);
}

/// An indexed in-memory database
pub trait IndexedStore: Send + Sync {
    type Row: Record;

    type Read<'a>: ReadTxn<Row = Self::Row>
    where
        Self: 'a;

    type Write<'a>: WriteTxn<Row = Self::Row>
    where
        Self: 'a;

    /// Open a read transaction on the latest committed version
    fn read(&self) -> Self::Read<'_>;

    /// Open a write transaction. Blocks while another writer is in flight.
    fn write(&self) -> Self::Write<'_>;
}
