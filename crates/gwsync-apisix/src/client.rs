//! Read-only APISIX Admin API client

use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::ApisixError;
use crate::resource::{GatewayObjects, ListResponse};

/// Admin API client configuration
#[derive(Clone, Debug)]
pub struct AdminClientConfig {
    /// Base URL of the Admin API, e.g. `http://127.0.0.1:9180/apisix/admin`
    pub url: String,
    /// Value of the `X-API-KEY` header
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Skip TLS certificate verification
    pub skip_tls_verify: bool,
}

/// APISIX Admin API client
pub struct AdminClient {
    config: AdminClientConfig,
    client: Client,
}

impl AdminClient {
    /// Create a new Admin API client
    pub fn new(config: AdminClientConfig) -> Result<Self, ApisixError> {
        let mut builder = Client::builder().timeout(config.timeout);

        if config.skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build()?;

        info!("Created Admin API client for {}", config.url);

        Ok(Self { config, client })
    }

    /// List one resource collection (`routes`, `upstreams`, `ssl`)
    async fn list(&self, resource: &str) -> Result<ListResponse, ApisixError> {
        let url = format!("{}/{}", self.config.url.trim_end_matches('/'), resource);

        debug!("Listing {}", url);

        let mut request = self.client.get(&url);

        if let Some(key) = &self.config.api_key {
            request = request.header("X-API-KEY", key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(ApisixError::NotFound(resource.to_string()));
        }

        if !status.is_success() {
            return Err(ApisixError::Gateway {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn list_routes(&self) -> Result<Vec<gwsync_db::Route>, ApisixError> {
        self.list("routes").await?.routes()
    }

    pub async fn list_upstreams(&self) -> Result<Vec<gwsync_db::Upstream>, ApisixError> {
        self.list("upstreams").await?.upstreams()
    }

    pub async fn list_ssl(&self) -> Result<Vec<gwsync_db::Ssl>, ApisixError> {
        self.list("ssl").await?.ssl()
    }

    /// Fetch routes, upstreams and SSL objects
    pub async fn fetch_all(&self) -> Result<GatewayObjects, ApisixError> {
        let (routes, upstreams, ssl) =
            tokio::try_join!(self.list_routes(), self.list_upstreams(), self.list_ssl())?;
        Ok(GatewayObjects {
            routes,
            upstreams,
            ssl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single canned HTTP response and hand back the raw request
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{}/apisix/admin", addr), handle)
    }

    fn client(url: String) -> AdminClient {
        AdminClient::new(AdminClientConfig {
            url,
            api_key: Some("secret".to_string()),
            timeout: Duration::from_secs(5),
            skip_tls_verify: false,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_upstreams() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"node":{"key":"/apisix/upstreams","nodes":[{"key":"/apisix/upstreams/u1","value":{"id":"u1","nodes":{},"checks":{"active":{}}}}]}}"#,
        )
        .await;

        let upstreams = client(url).list_upstreams().await.unwrap();
        assert_eq!(upstreams.len(), 1);
        assert_eq!(upstreams[0].id, "u1");
        assert_eq!(
            upstreams[0].checks.as_ref().unwrap().active.as_ref().unwrap().healthy.interval,
            1
        );

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /apisix/admin/upstreams "));
        assert!(request.contains("x-api-key: secret"));
    }

    #[tokio::test]
    async fn test_gateway_error() {
        let (url, _server) =
            serve_once("500 Internal Server Error", r#"{"error_msg":"boom"}"#).await;

        let err = client(url).list_routes().await.unwrap_err();
        assert!(matches!(err, ApisixError::Gateway { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_not_found() {
        let (url, _server) = serve_once("404 Not Found", "{}").await;

        let err = client(url).list_ssl().await.unwrap_err();
        assert!(matches!(err, ApisixError::NotFound(resource) if resource == "ssl"));
    }
}
