//! Transactional cache module

mod backend;
mod manager;
mod policy;

pub use backend::Cache;
pub use manager::{CacheConfig, CacheStats, DbCache};
pub use policy::ReferenceGuard;
