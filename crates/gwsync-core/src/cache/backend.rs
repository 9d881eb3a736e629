//! Cache trait

use gwsync_db::{Route, Ssl, Upstream};

use crate::error::CoreError;

/// Cache trait
///
/// Every value crossing this boundary is copied: the cache keeps its own copy
/// of what is inserted and hands out independent copies on reads.
pub trait Cache: Send + Sync {
    /// Insert or replace a route
    fn insert_route(&self, route: &Route) -> Result<(), CoreError>;

    /// Insert or replace an SSL object
    fn insert_ssl(&self, ssl: &Ssl) -> Result<(), CoreError>;

    /// Insert or replace an upstream
    fn insert_upstream(&self, upstream: &Upstream) -> Result<(), CoreError>;

    /// Get a route by ID
    fn get_route(&self, id: &str) -> Result<Route, CoreError>;

    /// Get an SSL object by ID
    fn get_ssl(&self, id: &str) -> Result<Ssl, CoreError>;

    /// Get an upstream by ID
    fn get_upstream(&self, id: &str) -> Result<Upstream, CoreError>;

    /// List all routes, in no particular order
    fn list_routes(&self) -> Result<Vec<Route>, CoreError>;

    /// List all SSL objects, in no particular order
    fn list_ssl(&self) -> Result<Vec<Ssl>, CoreError>;

    /// List all upstreams, in no particular order
    fn list_upstreams(&self) -> Result<Vec<Upstream>, CoreError>;

    /// Delete a route
    fn delete_route(&self, route: &Route) -> Result<(), CoreError>;

    /// Delete an SSL object
    fn delete_ssl(&self, ssl: &Ssl) -> Result<(), CoreError>;

    /// Delete an upstream, refused with [`CoreError::StillInUse`] while a route references it
    fn delete_upstream(&self, upstream: &Upstream) -> Result<(), CoreError>;
}
