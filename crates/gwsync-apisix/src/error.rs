//! APISIX adapter error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApisixError {
    #[error("bad {kind} config key: {key}")]
    BadConfigKey { kind: &'static str, key: String },

    #[error("failed to decode {kind} {key}: {source}")]
    Decode {
        kind: &'static str,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Gateway returned error: {status} - {message}")]
    Gateway { status: u16, message: String },

    #[error("Malformed dump {path}: {source}")]
    Dump {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
