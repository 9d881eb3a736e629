//! Loading a gateway snapshot into the cache

use gwsync_apisix::GatewayObjects;
use gwsync_core::{Cache, CacheStats, CoreError, DbCache};
use gwsync_db::{Entity, IndexedStore};
use tracing::{debug, warn};

/// Outcome of loading one snapshot
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub stats: CacheStats,
    /// `(route id, upstream id)` for routes bound to an upstream the cache does not hold
    pub dangling: Vec<(String, String)>,
    /// Upstreams no route is bound to
    pub unused: Vec<String>,
}

/// Insert every object, then report dangling route bindings and unused upstreams
pub fn load_snapshot<S>(
    cache: &DbCache<S>,
    objects: &GatewayObjects,
) -> Result<SyncReport, CoreError>
where
    S: IndexedStore<Row = Entity>,
{
    for upstream in &objects.upstreams {
        cache.insert_upstream(upstream)?;
    }
    for route in &objects.routes {
        cache.insert_route(route)?;
    }
    for ssl in &objects.ssl {
        cache.insert_ssl(ssl)?;
    }

    let mut dangling = Vec::new();
    for route in cache.list_routes()? {
        if route.upstream_id.is_empty() {
            continue;
        }
        match cache.get_upstream(&route.upstream_id) {
            Ok(_) => {}
            Err(CoreError::NotFound) => {
                warn!(
                    "Route {} references missing upstream {}",
                    route.id, route.upstream_id
                );
                dangling.push((route.id, route.upstream_id));
            }
            Err(e) => return Err(e),
        }
    }
    dangling.sort();

    let mut unused = Vec::new();
    for upstream in cache.list_upstreams()? {
        if cache.routes_referencing(&upstream.id)?.is_empty() {
            unused.push(upstream.id);
        }
    }
    unused.sort();

    let report = SyncReport {
        stats: cache.stats()?,
        dangling,
        unused,
    };
    debug!("Snapshot loaded: {:?}", report);
    Ok(report)
}
