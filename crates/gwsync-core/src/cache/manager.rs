//! Cache implementation over an indexed store

use gwsync_db::{
    DbError, Entity, ID_INDEX, IndexedStore, MemDb, ROUTE_TABLE, ReadTxn, Resource, Route,
    SSL_TABLE, Ssl, UPSTREAM_ID_INDEX, UPSTREAM_TABLE, Upstream, WriteTxn, gateway_schema,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::backend::Cache;
use super::policy::ReferenceGuard;
use crate::error::CoreError;

/// Configuration for the cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How upstream deletion checks for referencing routes
    #[serde(default)]
    pub reference_guard: ReferenceGuard,
}

/// Row counts taken from a single snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub routes: usize,
    pub upstreams: usize,
    pub ssl: usize,
}

/// Cache backed by an indexed in-memory database
pub struct DbCache<S = MemDb<Entity>> {
    db: S,
    config: CacheConfig,
}

impl DbCache<MemDb<Entity>> {
    /// Create a cache with the default configuration
    pub fn new() -> Result<Self, CoreError> {
        Self::with_config(CacheConfig::default())
    }

    /// Create a cache over a fresh in-memory database
    pub fn with_config(config: CacheConfig) -> Result<Self, CoreError> {
        let db = MemDb::new(gateway_schema()).map_err(CoreError::Schema)?;
        Ok(Self::with_store(db, config))
    }
}

impl<S> DbCache<S>
where
    S: IndexedStore<Row = Entity>,
{
    /// Create a cache over an existing store
    pub fn with_store(db: S, config: CacheConfig) -> Self {
        info!(
            "Initializing cache (reference guard: {})",
            config.reference_guard.as_str()
        );
        Self { db, config }
    }

    /// Row counts of every table, read from one consistent version
    pub fn stats(&self) -> Result<CacheStats, CoreError> {
        let txn = self.db.read();
        Ok(CacheStats {
            routes: txn.iter(ROUTE_TABLE, ID_INDEX)?.len(),
            upstreams: txn.iter(UPSTREAM_TABLE, ID_INDEX)?.len(),
            ssl: txn.iter(SSL_TABLE, ID_INDEX)?.len(),
        })
    }

    /// Routes bound to the given upstream
    pub fn routes_referencing(&self, upstream_id: &str) -> Result<Vec<Route>, CoreError> {
        let txn = self.db.read();
        let rows = match txn.get(ROUTE_TABLE, UPSTREAM_ID_INDEX, upstream_id) {
            Ok(rows) => rows,
            Err(DbError::NotFound) => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(rows
            .iter()
            .filter_map(|row| Route::from_entity(row).cloned())
            .collect())
    }

    fn insert<R: Resource>(&self, obj: &R) -> Result<(), CoreError> {
        let result = self.try_insert(obj);
        record(R::TABLE, "insert", &result);
        result
    }

    fn try_insert<R: Resource>(&self, obj: &R) -> Result<(), CoreError> {
        let row = obj.clone().into_entity();
        let mut txn = self.db.write();
        txn.insert(R::TABLE, row)?;
        txn.commit();

        debug!("Inserted {} {}", R::TABLE, obj.id());
        Ok(())
    }

    fn get<R: Resource>(&self, id: &str) -> Result<R, CoreError> {
        let txn = self.db.read();
        let row = txn.first(R::TABLE, ID_INDEX, id)?.ok_or(CoreError::NotFound)?;
        R::from_entity(&row).cloned().ok_or(CoreError::NotFound)
    }

    fn list<R: Resource>(&self) -> Result<Vec<R>, CoreError> {
        let txn = self.db.read();
        let rows = txn.iter(R::TABLE, ID_INDEX)?;
        Ok(rows
            .iter()
            .filter_map(|row| R::from_entity(row).cloned())
            .collect())
    }

    fn delete<R: Resource>(&self, obj: &R) -> Result<(), CoreError> {
        let result = self.try_delete(obj);
        record(R::TABLE, "delete", &result);
        result
    }

    fn try_delete<R: Resource>(&self, obj: &R) -> Result<(), CoreError> {
        let row = obj.clone().into_entity();
        let mut txn = self.db.write();
        txn.delete(R::TABLE, &row)?;
        txn.commit();

        debug!("Deleted {} {}", R::TABLE, obj.id());
        Ok(())
    }

    fn try_delete_upstream(&self, upstream: &Upstream) -> Result<(), CoreError> {
        match self.config.reference_guard {
            ReferenceGuard::Snapshot => {
                check_upstream_reference(&self.db.read(), &upstream.id)?;
                self.try_delete(upstream)
            }
            ReferenceGuard::InTransaction => {
                let row = upstream.clone().into_entity();
                let mut txn = self.db.write();
                check_upstream_reference(&txn, &upstream.id)?;
                txn.delete(UPSTREAM_TABLE, &row)?;
                txn.commit();

                debug!("Deleted {} {}", UPSTREAM_TABLE, upstream.id);
                Ok(())
            }
        }
    }
}

/// Refuse with [`CoreError::StillInUse`] when any route is bound to `upstream_id`
fn check_upstream_reference<T>(txn: &T, upstream_id: &str) -> Result<(), CoreError>
where
    T: ReadTxn<Row = Entity>,
{
    match txn.first(ROUTE_TABLE, UPSTREAM_ID_INDEX, upstream_id) {
        Ok(Some(_)) => Err(CoreError::StillInUse),
        Ok(None) | Err(DbError::NotFound) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn record(table: &'static str, op: &'static str, result: &Result<(), CoreError>) {
    let outcome = match result {
        Ok(()) => "ok",
        Err(CoreError::NotFound) => "not_found",
        Err(CoreError::StillInUse) => "still_in_use",
        Err(_) => "error",
    };
    metrics::counter!(
        "gwsync_cache_operations_total",
        "table" => table,
        "op" => op,
        "outcome" => outcome
    )
    .increment(1);
}

impl<S> Cache for DbCache<S>
where
    S: IndexedStore<Row = Entity>,
{
    fn insert_route(&self, route: &Route) -> Result<(), CoreError> {
        self.insert(route)
    }

    fn insert_ssl(&self, ssl: &Ssl) -> Result<(), CoreError> {
        self.insert(ssl)
    }

    fn insert_upstream(&self, upstream: &Upstream) -> Result<(), CoreError> {
        self.insert(upstream)
    }

    fn get_route(&self, id: &str) -> Result<Route, CoreError> {
        self.get(id)
    }

    fn get_ssl(&self, id: &str) -> Result<Ssl, CoreError> {
        self.get(id)
    }

    fn get_upstream(&self, id: &str) -> Result<Upstream, CoreError> {
        self.get(id)
    }

    fn list_routes(&self) -> Result<Vec<Route>, CoreError> {
        self.list()
    }

    fn list_ssl(&self) -> Result<Vec<Ssl>, CoreError> {
        self.list()
    }

    fn list_upstreams(&self) -> Result<Vec<Upstream>, CoreError> {
        self.list()
    }

    fn delete_route(&self, route: &Route) -> Result<(), CoreError> {
        self.delete(route)
    }

    fn delete_ssl(&self, ssl: &Ssl) -> Result<(), CoreError> {
        self.delete(ssl)
    }

    fn delete_upstream(&self, upstream: &Upstream) -> Result<(), CoreError> {
        let result = self.try_delete_upstream(upstream);
        record(UPSTREAM_TABLE, "delete", &result);
        result
    }
}
