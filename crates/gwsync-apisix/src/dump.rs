//! Offline gateway snapshots
//!
//! A dump directory holds the raw Admin API LIST responses as
//! `routes.json`, `upstreams.json` and `ssl.json`. A missing file means the
//! collection is empty.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::ApisixError;
use crate::resource::{GatewayObjects, ListResponse};

pub const ROUTES_FILE: &str = "routes.json";
pub const UPSTREAMS_FILE: &str = "upstreams.json";
pub const SSL_FILE: &str = "ssl.json";

/// Directory of dumped LIST responses
#[derive(Debug, Clone)]
pub struct DumpDir {
    path: PathBuf,
}

impl DumpDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self, file: &str) -> Result<Option<ListResponse>, ApisixError> {
        let path = self.path.join(file);
        if !path.exists() {
            debug!("No dump at {}, treating as empty", path.display());
            return Ok(None);
        }

        let content = std::fs::read(&path).map_err(|source| ApisixError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let resp = serde_json::from_slice(&content).map_err(|source| ApisixError::Dump {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(resp))
    }

    /// Decode every dumped collection
    pub fn load(&self) -> Result<GatewayObjects, ApisixError> {
        let routes = match self.read(ROUTES_FILE)? {
            Some(resp) => resp.routes()?,
            None => Vec::new(),
        };
        let upstreams = match self.read(UPSTREAMS_FILE)? {
            Some(resp) => resp.upstreams()?,
            None => Vec::new(),
        };
        let ssl = match self.read(SSL_FILE)? {
            Some(resp) => resp.ssl()?,
            None => Vec::new(),
        };

        info!(
            "Loaded dump from {} ({} routes, {} upstreams, {} ssl)",
            self.path.display(),
            routes.len(),
            upstreams.len(),
            ssl.len()
        );

        Ok(GatewayObjects {
            routes,
            upstreams,
            ssl,
        })
    }
}
