//! Gateway Sync APISIX Adapter
//!
//! This crate decodes APISIX Admin API payloads into the models stored by the
//! cache, and provides the sources those payloads come from: a read-only
//! Admin API client and a directory of dumped list responses.

pub mod client;
pub mod dump;
pub mod error;
pub mod resource;

pub use client::{AdminClient, AdminClientConfig};
pub use dump::DumpDir;
pub use error::ApisixError;
pub use resource::{GatewayObjects, GetResponse, Item, Items, ListResponse, Node};
