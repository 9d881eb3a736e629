//! Admin API response decoding

use gwsync_db::{ACTIVE_HEALTH_CHECK_MIN_INTERVAL, Route, Ssl, Upstream, seq_or_empty_object};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;
use tracing::debug;

use crate::error::ApisixError;

/// Response of a single object GET
#[derive(Debug, Deserialize)]
pub struct GetResponse {
    #[serde(rename = "node")]
    pub item: Item,
}

/// Unified LIST response of the Admin API
#[derive(Debug, Deserialize)]
pub struct ListResponse {
    /// Number of stored objects as reported by the gateway
    #[serde(default)]
    pub count: String,
    pub node: Node,
}

#[derive(Debug, Default, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub key: String,
    #[serde(default, rename = "nodes")]
    pub items: Items,
}

/// Items of a LIST response.
///
/// The gateway encodes an empty list as `{}`, which is accepted here.
#[derive(Debug, Default)]
pub struct Items(pub Vec<Item>);

impl<'de> Deserialize<'de> for Items {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        seq_or_empty_object(deserializer).map(Items)
    }
}

/// One stored object: its etcd-style key and raw JSON value
#[derive(Debug, Deserialize)]
pub struct Item {
    pub key: String,
    pub value: Box<RawValue>,
}

impl Item {
    /// Decode the value as a route
    pub fn route(&self) -> Result<Route, ApisixError> {
        debug!("got route: {}", self.value.get());
        self.decode("route")
    }

    /// Decode the value as an upstream, filling in unset active health check intervals
    pub fn upstream(&self) -> Result<Upstream, ApisixError> {
        debug!("got upstream: {}", self.value.get());
        let mut ups: Upstream = self.decode("upstream")?;

        // The gateway schema rejects a zero interval but does not default it
        if let Some(active) = ups.checks.as_mut().and_then(|c| c.active.as_mut()) {
            let min = ACTIVE_HEALTH_CHECK_MIN_INTERVAL.as_secs();
            if active.healthy.interval == 0 {
                active.healthy.interval = min;
            }
            if active.unhealthy.interval == 0 {
                active.unhealthy.interval = min;
            }
        }
        Ok(ups)
    }

    /// Decode the value as an SSL object
    pub fn ssl(&self) -> Result<Ssl, ApisixError> {
        debug!("got ssl: {}", self.value.get());
        self.decode("ssl")
    }

    fn decode<T: DeserializeOwned>(&self, kind: &'static str) -> Result<T, ApisixError> {
        if !self.key.split('/').any(|segment| !segment.is_empty()) {
            return Err(ApisixError::BadConfigKey {
                kind,
                key: self.key.clone(),
            });
        }

        serde_json::from_str(self.value.get()).map_err(|source| ApisixError::Decode {
            kind,
            key: self.key.clone(),
            source,
        })
    }
}

impl ListResponse {
    pub fn items(&self) -> &[Item] {
        &self.node.items.0
    }

    pub fn routes(&self) -> Result<Vec<Route>, ApisixError> {
        self.items().iter().map(Item::route).collect()
    }

    pub fn upstreams(&self) -> Result<Vec<Upstream>, ApisixError> {
        self.items().iter().map(Item::upstream).collect()
    }

    pub fn ssl(&self) -> Result<Vec<Ssl>, ApisixError> {
        self.items().iter().map(Item::ssl).collect()
    }
}

/// Everything loaded from one gateway snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatewayObjects {
    pub routes: Vec<Route>,
    pub upstreams: Vec<Upstream>,
    pub ssl: Vec<Ssl>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(key: &str, value: &str) -> Item {
        Item {
            key: key.to_string(),
            value: RawValue::from_string(value.to_string()).unwrap(),
        }
    }

    #[test]
    fn test_list_empty_object() {
        let resp: ListResponse =
            serde_json::from_str(r#"{"count":"1","node":{"key":"/apisix/routes","nodes":{}}}"#)
                .unwrap();
        assert_eq!(resp.count, "1");
        assert!(resp.items().is_empty());
        assert!(resp.routes().unwrap().is_empty());
    }

    #[test]
    fn test_list_non_empty_object_rejected() {
        let err = serde_json::from_str::<ListResponse>(
            r#"{"node":{"key":"/apisix/routes","nodes":{"a":1}}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unexpected non-empty object"));
    }

    #[test]
    fn test_list_routes() {
        let resp: ListResponse = serde_json::from_str(
            r#"{
                "count": "2",
                "node": {
                    "key": "/apisix/routes",
                    "nodes": [
                        {"key": "/apisix/routes/1", "value": {"id": "1", "name": "a", "uri": "/a", "upstream_id": "u1"}},
                        {"key": "/apisix/routes/2", "value": {"id": "2", "name": "b", "uris": ["/b", "/c"]}}
                    ]
                }
            }"#,
        )
        .unwrap();

        let routes = resp.routes().unwrap();
        assert_eq!(resp.count, "2");
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].upstream_id, "u1");
        assert_eq!(routes[0].uri, "/a");
        assert_eq!(routes[1].uris, vec!["/b", "/c"]);
        assert!(routes[1].upstream_id.is_empty());
    }

    #[test]
    fn test_get_response() {
        let resp: GetResponse = serde_json::from_str(
            r#"{"node":{"key":"/apisix/ssl/s1","value":{"id":"s1","snis":["a.com"],"cert":"c","key":"k","status":1}}}"#,
        )
        .unwrap();

        let ssl = resp.item.ssl().unwrap();
        assert_eq!(ssl.id, "s1");
        assert_eq!(ssl.snis, vec!["a.com"]);
        assert_eq!(ssl.status, 1);
    }

    #[test]
    fn test_bad_config_key() {
        let err = item("", r#"{"id":"1"}"#).route().unwrap_err();
        assert!(matches!(err, ApisixError::BadConfigKey { kind: "route", .. }));

        let err = item("/", r#"{"id":"1"}"#).upstream().unwrap_err();
        assert_eq!(err.to_string(), "bad upstream config key: /");
    }

    #[test]
    fn test_decode_error_carries_key() {
        let err = item("/apisix/routes/9", r#"{"id": 9}"#).route().unwrap_err();
        assert!(matches!(err, ApisixError::Decode { kind: "route", .. }));
        assert!(err.to_string().contains("/apisix/routes/9"));
    }

    #[test]
    fn test_upstream_interval_defaults() {
        let ups = item(
            "/apisix/upstreams/1",
            r#"{"id":"1","nodes":{},"checks":{"active":{"http_path":"/healthz","healthy":{"successes":2},"unhealthy":{"http_failures":3}}}}"#,
        )
        .upstream()
        .unwrap();

        let active = ups.checks.unwrap().active.unwrap();
        let min = ACTIVE_HEALTH_CHECK_MIN_INTERVAL.as_secs();
        assert_eq!(active.healthy.interval, min);
        assert_eq!(active.unhealthy.interval, min);
        assert_eq!(active.healthy.successes, 2);
        assert_eq!(active.unhealthy.http_failures, 3);
    }

    #[test]
    fn test_upstream_interval_kept() {
        let ups = item(
            "/apisix/upstreams/1",
            r#"{"id":"1","checks":{"active":{"healthy":{"interval":5},"unhealthy":{"interval":7}}}}"#,
        )
        .upstream()
        .unwrap();

        let active = ups.checks.unwrap().active.unwrap();
        assert_eq!(active.healthy.interval, 5);
        assert_eq!(active.unhealthy.interval, 7);
    }

    #[test]
    fn test_upstream_without_active_check_untouched() {
        let ups = item(
            "/apisix/upstreams/1",
            r#"{"id":"1","checks":{"passive":{"healthy":{"successes":1}}}}"#,
        )
        .upstream()
        .unwrap();

        let checks = ups.checks.unwrap();
        assert!(checks.active.is_none());
        assert_eq!(checks.passive.unwrap().healthy.successes, 1);
    }
}
