//! Gateway object models
//!
//! These mirror the objects the gateway Admin API stores. Values are plain
//! owned data, so `Clone` always yields a full-depth copy with nothing shared
//! with the original.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::store::Record;

pub const ROUTE_TABLE: &str = "route";
pub const UPSTREAM_TABLE: &str = "upstream";
pub const SSL_TABLE: &str = "ssl";

/// Route secondary index keyed by the bound upstream
pub const UPSTREAM_ID_INDEX: &str = "upstream_id";

/// Lower bound the gateway accepts for active health check intervals
pub const ACTIVE_HEALTH_CHECK_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Route model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Route {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub desc: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub host: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uri: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub uris: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remote_addrs: Vec<String>,
    pub priority: i32,
    /// Empty when the route is not bound to an upstream
    pub upstream_id: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub plugins: BTreeMap<String, serde_json::Value>,
}

/// Upstream backend target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamNode {
    pub host: String,
    pub port: u16,
    pub weight: u32,
}

/// Upstream timeouts in seconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamTimeout {
    pub connect: u64,
    pub send: u64,
    pub read: u64,
}

/// Upstream model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Upstream {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub desc: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Load balancing algorithm (roundrobin, chash, ...)
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub hash_on: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(deserialize_with = "seq_or_empty_object")]
    pub nodes: Vec<UpstreamNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<UpstreamHealthCheck>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scheme: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<UpstreamTimeout>,
}

/// Health checker settings of an upstream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamHealthCheck {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<ActiveHealthCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passive: Option<PassiveHealthCheck>,
}

/// Active health checker: the gateway probes targets on its own
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActiveHealthCheck {
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    /// Probe timeout in seconds
    pub timeout: f64,
    pub concurrency: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub http_path: String,
    #[serde(rename = "https_verify_certificate")]
    pub https_verify_cert: bool,
    #[serde(rename = "req_headers", skip_serializing_if = "Vec::is_empty")]
    pub http_request_headers: Vec<String>,
    pub healthy: ActiveHealthCheckHealthy,
    pub unhealthy: ActiveHealthCheckUnhealthy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActiveHealthCheckHealthy {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub http_statuses: Vec<u16>,
    pub successes: u32,
    /// Probe interval in seconds, 0 when unset
    pub interval: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActiveHealthCheckUnhealthy {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub http_statuses: Vec<u16>,
    pub http_failures: u32,
    pub tcp_failures: u32,
    pub timeouts: f64,
    /// Probe interval in seconds, 0 when unset
    pub interval: u64,
}

/// Passive health checker: the gateway judges targets from proxied traffic
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassiveHealthCheck {
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    pub healthy: PassiveHealthCheckHealthy,
    pub unhealthy: PassiveHealthCheckUnhealthy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassiveHealthCheckHealthy {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub http_statuses: Vec<u16>,
    pub successes: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassiveHealthCheckUnhealthy {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub http_statuses: Vec<u16>,
    pub http_failures: u32,
    pub tcp_failures: u32,
    pub timeouts: f64,
}

/// TLS certificate model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ssl {
    pub id: String,
    pub snis: Vec<String>,
    pub cert: String,
    pub key: String,
    pub status: i32,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// Any object the store can hold
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Route(Route),
    Upstream(Upstream),
    Ssl(Ssl),
}

impl Entity {
    pub fn id(&self) -> &str {
        match self {
            Entity::Route(r) => &r.id,
            Entity::Upstream(u) => &u.id,
            Entity::Ssl(s) => &s.id,
        }
    }
}

impl Record for Entity {
    fn table(&self) -> &'static str {
        match self {
            Entity::Route(_) => ROUTE_TABLE,
            Entity::Upstream(_) => UPSTREAM_TABLE,
            Entity::Ssl(_) => SSL_TABLE,
        }
    }

    fn field(&self, name: &str) -> Option<&str> {
        let value: &str = match (self, name) {
            (_, "id") => self.id(),
            (Entity::Route(r), "name") => &r.name,
            (Entity::Route(r), "upstream_id") => &r.upstream_id,
            (Entity::Upstream(u), "name") => &u.name,
            _ => return None,
        };
        (!value.is_empty()).then_some(value)
    }

    fn fields(table: &str) -> &'static [&'static str] {
        match table {
            ROUTE_TABLE => &["id", "name", "upstream_id"],
            UPSTREAM_TABLE => &["id", "name"],
            SSL_TABLE => &["id"],
            _ => &[],
        }
    }
}

/// Typed view of one [`Entity`] variant and the table it lives in
pub trait Resource: Clone + Send + Sync + 'static {
    const TABLE: &'static str;

    fn id(&self) -> &str;

    fn into_entity(self) -> Entity;

    fn from_entity(entity: &Entity) -> Option<&Self>;
}

impl Resource for Route {
    const TABLE: &'static str = ROUTE_TABLE;

    fn id(&self) -> &str {
        &self.id
    }

    fn into_entity(self) -> Entity {
        Entity::Route(self)
    }

    fn from_entity(entity: &Entity) -> Option<&Self> {
        match entity {
            Entity::Route(r) => Some(r),
            _ => None,
        }
    }
}

impl Resource for Upstream {
    const TABLE: &'static str = UPSTREAM_TABLE;

    fn id(&self) -> &str {
        &self.id
    }

    fn into_entity(self) -> Entity {
        Entity::Upstream(self)
    }

    fn from_entity(entity: &Entity) -> Option<&Self> {
        match entity {
            Entity::Upstream(u) => Some(u),
            _ => None,
        }
    }
}

impl Resource for Ssl {
    const TABLE: &'static str = SSL_TABLE;

    fn id(&self) -> &str {
        &self.id
    }

    fn into_entity(self) -> Entity {
        Entity::Ssl(self)
    }

    fn from_entity(entity: &Entity) -> Option<&Self> {
        match entity {
            Entity::Ssl(s) => Some(s),
            _ => None,
        }
    }
}

/// Deserialize a JSON array, also accepting `{}` as an empty array.
///
/// The gateway's JSON encoder cannot tell an empty array from an empty table
/// and emits `{}` for both. Any other object is rejected.
pub fn seq_or_empty_object<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Box::<RawValue>::deserialize(deserializer)?;
    let text = raw.get();

    if text.starts_with('{') {
        if text.len() != 2 {
            return Err(D::Error::custom("unexpected non-empty object"));
        }
        return Ok(Vec::new());
    }
    if text == "null" {
        return Ok(Vec::new());
    }

    serde_json::from_str(text).map_err(D::Error::custom)
}
