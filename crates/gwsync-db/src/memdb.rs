//! Copy-on-write in-memory engine
//!
//! The committed state is an immutable [`Snapshot`] published through an
//! [`ArcSwap`]. Readers grab the current snapshot without locking. A writer
//! takes the writer lock, works on a private copy of the snapshot and swaps it
//! in on commit, so readers never see a half-applied write and never block
//! the writer.
//!
//! Rows and index entries live in persistent maps. Copying a table is O(1)
//! and a write copies only the tree path it touches, so an insert or delete
//! stays O(log n) however large the table grows.

use arc_swap::ArcSwap;
use imbl::{OrdMap, OrdSet};
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

use crate::error::DbError;
use crate::schema::{DbSchema, ID_INDEX, IndexSchema, TableSchema};
use crate::store::{IndexedStore, ReadTxn, Record, WriteTxn};

/// Secondary index: field value -> primary keys
type IndexEntries = OrdMap<String, OrdSet<String>>;

#[derive(Debug, Clone)]
struct Table<R> {
    schema: Arc<TableSchema>,
    /// Primary index
    rows: OrdMap<String, Arc<R>>,
    secondary: HashMap<String, IndexEntries>,
}

impl<R: Record> Table<R> {
    fn new(schema: &TableSchema) -> Self {
        let secondary = schema
            .indexes
            .iter()
            .filter(|i| i.name != ID_INDEX)
            .map(|i| (i.name.clone(), IndexEntries::new()))
            .collect();

        Self {
            schema: Arc::new(schema.clone()),
            rows: OrdMap::new(),
            secondary,
        }
    }

    fn index_schema(&self, name: &str) -> Result<&IndexSchema, DbError> {
        self.schema.index(name).ok_or_else(|| DbError::UnknownIndex {
            table: self.schema.name.clone(),
            index: name.to_string(),
        })
    }

    fn primary_key<'r>(&self, row: &'r R) -> Result<&'r str, DbError> {
        let id = self.index_schema(ID_INDEX)?;
        row.field(&id.field).ok_or_else(|| DbError::MissingIndexValue {
            table: self.schema.name.clone(),
            index: ID_INDEX.to_string(),
        })
    }

    fn lookup(&self, index: &str, key: &str) -> Result<Vec<Arc<R>>, DbError> {
        self.index_schema(index)?;

        if index == ID_INDEX {
            return Ok(self.rows.get(key).cloned().into_iter().collect());
        }

        Ok(self
            .secondary
            .get(index)
            .and_then(|entries| entries.get(key))
            .map(|ids| ids.iter().filter_map(|id| self.rows.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    fn scan(&self, index: &str) -> Result<Vec<Arc<R>>, DbError> {
        self.index_schema(index)?;

        if index == ID_INDEX {
            return Ok(self.rows.values().cloned().collect());
        }

        Ok(self
            .secondary
            .get(index)
            .map(|entries| {
                entries
                    .values()
                    .flat_map(|ids| ids.iter())
                    .filter_map(|id| self.rows.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Secondary index keys of `row`, checked against the index constraints.
    /// Nothing is modified, so a failure leaves the table untouched.
    fn secondary_keys(&self, id: &str, row: &R) -> Result<Vec<(String, String)>, DbError> {
        let mut keys = Vec::new();

        for index in self.schema.indexes.iter().filter(|i| i.name != ID_INDEX) {
            let Some(value) = row.field(&index.field) else {
                if index.allow_missing {
                    continue;
                }
                return Err(DbError::MissingIndexValue {
                    table: self.schema.name.clone(),
                    index: index.name.clone(),
                });
            };

            if index.unique {
                let taken = self
                    .secondary
                    .get(&index.name)
                    .and_then(|entries| entries.get(value))
                    .is_some_and(|ids| ids.iter().any(|other| other != id));
                if taken {
                    return Err(DbError::UniqueViolation {
                        table: self.schema.name.clone(),
                        index: index.name.clone(),
                        value: value.to_string(),
                    });
                }
            }

            keys.push((index.name.clone(), value.to_string()));
        }

        Ok(keys)
    }

    fn unindex(&mut self, id: &str, row: &R) {
        for index in self.schema.indexes.iter().filter(|i| i.name != ID_INDEX) {
            let Some(value) = row.field(&index.field) else {
                continue;
            };
            if let Some(entries) = self.secondary.get_mut(&index.name)
                && let Some(ids) = entries.get_mut(value)
            {
                ids.remove(id);
                if ids.is_empty() {
                    entries.remove(value);
                }
            }
        }
    }

    fn insert(&mut self, row: R) -> Result<(), DbError> {
        let id = self.primary_key(&row)?.to_string();
        let keys = self.secondary_keys(&id, &row)?;

        if let Some(old) = self.rows.remove(&id) {
            self.unindex(&id, &old);
        }
        for (index, value) in keys {
            let entries = self.secondary.entry(index).or_default();
            let mut ids = entries.get(&value).cloned().unwrap_or_default();
            ids.insert(id.clone());
            entries.insert(value, ids);
        }
        self.rows.insert(id, Arc::new(row));
        Ok(())
    }

    fn delete(&mut self, row: &R) -> Result<(), DbError> {
        let id = self.primary_key(row)?.to_string();
        let old = self.rows.remove(&id).ok_or(DbError::NotFound)?;
        self.unindex(&id, &old);
        Ok(())
    }
}

/// One committed version of every table
#[derive(Debug)]
pub struct Snapshot<R> {
    tables: HashMap<String, Arc<Table<R>>>,
}

impl<R> Clone for Snapshot<R> {
    fn clone(&self) -> Self {
        Self {
            tables: self.tables.clone(),
        }
    }
}

impl<R: Record> Snapshot<R> {
    fn table(&self, name: &str) -> Result<&Table<R>, DbError> {
        self.tables
            .get(name)
            .map(Arc::as_ref)
            .ok_or_else(|| DbError::UnknownTable(name.to_string()))
    }

    /// Tables are shared between versions until a writer touches them
    fn table_mut(&mut self, name: &str) -> Result<&mut Table<R>, DbError> {
        self.tables
            .get_mut(name)
            .map(Arc::make_mut)
            .ok_or_else(|| DbError::UnknownTable(name.to_string()))
    }
}

/// In-memory indexed database with snapshot isolation
pub struct MemDb<R> {
    current: ArcSwap<Snapshot<R>>,
    writer: Mutex<()>,
}

impl<R: Record> MemDb<R> {
    /// Create an empty database, failing if the schema is inconsistent
    pub fn new(schema: DbSchema) -> Result<Self, DbError> {
        schema.validate::<R>()?;

        let tables = schema
            .tables
            .iter()
            .map(|t| (t.name.clone(), Arc::new(Table::new(t))))
            .collect();

        Ok(Self {
            current: ArcSwap::from_pointee(Snapshot { tables }),
            writer: Mutex::new(()),
        })
    }
}

/// Read transaction pinned to the snapshot current when it was opened
pub struct MemReadTxn<R> {
    snapshot: Arc<Snapshot<R>>,
}

impl<R: Record> ReadTxn for MemReadTxn<R> {
    type Row = R;

    fn first(&self, table: &str, index: &str, key: &str) -> Result<Option<Arc<R>>, DbError> {
        Ok(self.get(table, index, key)?.into_iter().next())
    }

    fn get(&self, table: &str, index: &str, key: &str) -> Result<Vec<Arc<R>>, DbError> {
        self.snapshot.table(table)?.lookup(index, key)
    }

    fn iter(&self, table: &str, index: &str) -> Result<Vec<Arc<R>>, DbError> {
        self.snapshot.table(table)?.scan(index)
    }
}

/// Write transaction holding the writer lock until it commits or is dropped
pub struct MemWriteTxn<'a, R> {
    current: &'a ArcSwap<Snapshot<R>>,
    working: Snapshot<R>,
    _guard: MutexGuard<'a, ()>,
}

impl<R: Record> ReadTxn for MemWriteTxn<'_, R> {
    type Row = R;

    fn first(&self, table: &str, index: &str, key: &str) -> Result<Option<Arc<R>>, DbError> {
        Ok(self.get(table, index, key)?.into_iter().next())
    }

    fn get(&self, table: &str, index: &str, key: &str) -> Result<Vec<Arc<R>>, DbError> {
        self.working.table(table)?.lookup(index, key)
    }

    fn iter(&self, table: &str, index: &str) -> Result<Vec<Arc<R>>, DbError> {
        self.working.table(table)?.scan(index)
    }
}

impl<R: Record> WriteTxn for MemWriteTxn<'_, R> {
    fn insert(&mut self, table: &str, row: R) -> Result<(), DbError> {
        if row.table() != table {
            return Err(DbError::WrongTable {
                table: table.to_string(),
                found: row.table().to_string(),
            });
        }
        self.working.table_mut(table)?.insert(row)
    }

    fn delete(&mut self, table: &str, row: &R) -> Result<(), DbError> {
        // Resolve the table on the shared copy first so a miss does not clone it
        let tbl = self.working.table(table)?;
        let id = tbl.primary_key(row)?;
        if !tbl.rows.contains_key(id) {
            return Err(DbError::NotFound);
        }
        self.working.table_mut(table)?.delete(row)
    }

    fn commit(self) {
        let Self {
            current,
            working,
            _guard,
        } = self;
        current.store(Arc::new(working));
        trace!("Committed write transaction");
    }

    fn abort(self) {
        trace!("Aborted write transaction");
    }
}

impl<R: Record> IndexedStore for MemDb<R> {
    type Row = R;
    type Read<'a>
        = MemReadTxn<R>
    where
        Self: 'a;
    type Write<'a>
        = MemWriteTxn<'a, R>
    where
        Self: 'a;

    fn read(&self) -> MemReadTxn<R> {
        MemReadTxn {
            snapshot: self.current.load_full(),
        }
    }

    fn write(&self) -> MemWriteTxn<'_, R> {
        let guard = self.writer.lock();
        // Loaded under the lock so the copy is the latest committed version
        let working = Snapshot::clone(&self.current.load());
        MemWriteTxn {
            current: &self.current,
            working,
            _guard: guard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entity, ROUTE_TABLE, Route, SSL_TABLE, Ssl, UPSTREAM_ID_INDEX};
    use crate::schema::gateway_schema;
    use std::time::{Duration, Instant};

    fn db() -> MemDb<Entity> {
        MemDb::new(gateway_schema()).expect("gateway schema is valid")
    }

    fn route(id: &str, upstream_id: &str) -> Entity {
        Entity::Route(Route {
            id: id.to_string(),
            name: format!("route-{}", id),
            upstream_id: upstream_id.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_uncommitted_write_is_invisible() {
        let db = db();

        let mut txn = db.write();
        txn.insert(ROUTE_TABLE, route("1", "")).unwrap();
        assert!(txn.first(ROUTE_TABLE, ID_INDEX, "1").unwrap().is_some());
        drop(txn);

        assert!(db.read().first(ROUTE_TABLE, ID_INDEX, "1").unwrap().is_none());

        let mut txn = db.write();
        txn.insert(ROUTE_TABLE, route("1", "")).unwrap();
        txn.abort();
        assert!(db.read().first(ROUTE_TABLE, ID_INDEX, "1").unwrap().is_none());
    }

    #[test]
    fn test_reader_keeps_its_snapshot() {
        let db = db();
        let before = db.read();

        let mut txn = db.write();
        txn.insert(ROUTE_TABLE, route("1", "")).unwrap();
        txn.commit();

        assert!(before.first(ROUTE_TABLE, ID_INDEX, "1").unwrap().is_none());
        assert!(db.read().first(ROUTE_TABLE, ID_INDEX, "1").unwrap().is_some());
    }

    #[test]
    fn test_upsert_moves_secondary_entry() {
        let db = db();

        let mut txn = db.write();
        txn.insert(ROUTE_TABLE, route("1", "u1")).unwrap();
        txn.insert(ROUTE_TABLE, route("1", "u2")).unwrap();
        txn.commit();

        let read = db.read();
        assert!(read.get(ROUTE_TABLE, UPSTREAM_ID_INDEX, "u1").unwrap().is_empty());
        assert_eq!(read.get(ROUTE_TABLE, UPSTREAM_ID_INDEX, "u2").unwrap().len(), 1);
        assert_eq!(read.iter(ROUTE_TABLE, ID_INDEX).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_upstream_is_not_indexed() {
        let db = db();

        let mut txn = db.write();
        txn.insert(ROUTE_TABLE, route("1", "")).unwrap();
        txn.insert(ROUTE_TABLE, route("2", "u1")).unwrap();
        txn.commit();

        let read = db.read();
        assert_eq!(read.iter(ROUTE_TABLE, UPSTREAM_ID_INDEX).unwrap().len(), 1);
        assert!(read.first(ROUTE_TABLE, UPSTREAM_ID_INDEX, "").unwrap().is_none());
    }

    #[test]
    fn test_missing_primary_key() {
        let db = db();

        let mut txn = db.write();
        let err = txn.insert(SSL_TABLE, Entity::Ssl(Ssl::default())).unwrap_err();
        assert_eq!(
            err,
            DbError::MissingIndexValue {
                table: SSL_TABLE.to_string(),
                index: ID_INDEX.to_string(),
            }
        );
    }

    #[test]
    fn test_wrong_table_and_unknowns() {
        let db = db();

        let mut txn = db.write();
        assert!(matches!(
            txn.insert(SSL_TABLE, route("1", "")),
            Err(DbError::WrongTable { .. })
        ));
        drop(txn);

        let read = db.read();
        assert!(matches!(
            read.iter("consumer", ID_INDEX),
            Err(DbError::UnknownTable(_))
        ));
        assert!(matches!(
            read.first(SSL_TABLE, UPSTREAM_ID_INDEX, "u1"),
            Err(DbError::UnknownIndex { .. })
        ));
    }

    #[test]
    fn test_delete() {
        let db = db();

        let mut txn = db.write();
        txn.insert(ROUTE_TABLE, route("1", "u1")).unwrap();
        txn.commit();

        let mut txn = db.write();
        assert_eq!(txn.delete(ROUTE_TABLE, &route("2", "")), Err(DbError::NotFound));
        txn.delete(ROUTE_TABLE, &route("1", "")).unwrap();
        txn.commit();

        let read = db.read();
        assert!(read.iter(ROUTE_TABLE, ID_INDEX).unwrap().is_empty());
        assert!(read.get(ROUTE_TABLE, UPSTREAM_ID_INDEX, "u1").unwrap().is_empty());
    }

    #[test]
    fn test_insert_cost_does_not_grow_with_table() {
        let db = db();
        let insert_range = |ids: std::ops::Range<usize>| {
            let start = Instant::now();
            for i in ids {
                let mut txn = db.write();
                txn.insert(ROUTE_TABLE, route(&i.to_string(), "u1")).unwrap();
                txn.commit();
            }
            start.elapsed()
        };

        insert_range(0..20_000);
        let elapsed = insert_range(20_000..21_000);

        // Every route shares one upstream, so the secondary entry is large too
        assert!(
            elapsed < Duration::from_secs(1),
            "1000 inserts into a 20000 row table took {:?}",
            elapsed
        );

        let read = db.read();
        assert_eq!(read.iter(ROUTE_TABLE, ID_INDEX).unwrap().len(), 21_000);
        assert_eq!(read.get(ROUTE_TABLE, UPSTREAM_ID_INDEX, "u1").unwrap().len(), 21_000);
    }

    #[test]
    fn test_old_snapshot_survives_many_writes() {
        let db = db();

        let mut txn = db.write();
        txn.insert(ROUTE_TABLE, route("0", "u1")).unwrap();
        txn.commit();
        let before = db.read();

        for i in 1..100 {
            let mut txn = db.write();
            txn.insert(ROUTE_TABLE, route(&i.to_string(), "u1")).unwrap();
            txn.commit();
        }
        let mut txn = db.write();
        txn.delete(ROUTE_TABLE, &route("0", "")).unwrap();
        txn.commit();

        assert_eq!(before.iter(ROUTE_TABLE, ID_INDEX).unwrap().len(), 1);
        assert_eq!(before.get(ROUTE_TABLE, UPSTREAM_ID_INDEX, "u1").unwrap().len(), 1);
        assert_eq!(db.read().iter(ROUTE_TABLE, ID_INDEX).unwrap().len(), 99);
    }

    #[test]
    fn test_unique_secondary_index() {
        let schema = DbSchema::new(vec![TableSchema::new(
            ROUTE_TABLE,
            vec![
                IndexSchema::unique(ID_INDEX, "id"),
                IndexSchema::unique("name", "name"),
            ],
        )]);
        let db: MemDb<Entity> = MemDb::new(schema).unwrap();

        let mut txn = db.write();
        txn.insert(ROUTE_TABLE, route("1", "")).unwrap();
        // Same name as route 1 is fine for route 1 itself
        txn.insert(ROUTE_TABLE, route("1", "u1")).unwrap();

        let mut clash = route("2", "");
        if let Entity::Route(r) = &mut clash {
            r.name = "route-1".to_string();
        }
        assert!(matches!(
            txn.insert(ROUTE_TABLE, clash),
            Err(DbError::UniqueViolation { .. })
        ));
        txn.commit();

        assert_eq!(db.read().iter(ROUTE_TABLE, ID_INDEX).unwrap().len(), 1);
    }
}
