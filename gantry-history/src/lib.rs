//! Gantry History
//!
//! Cache-aside access to recorded pipeline runs.
//!
//! The [`PipelineHistoryRepository`] sits between callers and the relational
//! store. Reads are served from a [`CacheStore`] when possible and populated
//! on miss; the only mutation (a run's comment) goes to the store and evicts
//! the id-keyed cache entry.
//!
//! Collaborators are injected as trait objects:
//! - [`StoreGateway`]: typed queries against the store
//! - [`CacheStore`]: shared key/value cache
//! - [`ConfigProvider`]: the set of currently configured pipelines

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod repository;

#[cfg(test)]
mod testing;

pub use cache::{CacheStats, CacheStore, InMemoryCache};
pub use config::{ConfigProvider, SharedPipelineConfig, StaticPipelineConfig};
pub use error::{HistoryError, Lookup, Result};
pub use gateway::{GatewayError, StoreGateway};
pub use repository::{PipelineHistoryRepository, RepositoryOptions};
