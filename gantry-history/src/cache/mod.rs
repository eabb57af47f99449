//! Cache store and key scheme
//!
//! Every cached value is an enriched `PipelineInstanceModel`. A run can be
//! cached under two keys that live in separate namespaces:
//!
//! - `history:<name>:<counter>` populated by name/counter lookups
//! - `history:<id>` populated by id lookups and bulk loads
//!
//! Comment updates evict only the id key. A name/counter entry cached before
//! the update keeps the old comment until the cache store itself drops it
//! (TTL or capacity eviction). Id-keyed reads always see the new comment.

mod memory;

pub use memory::{CacheStats, InMemoryCache};

use gantry_core::domain::instance::PipelineInstanceModel;
use gantry_core::domain::pipeline::fold_name;

const KEY_PREFIX: &str = "history";

/// Key for a run addressed by name and counter
///
/// Pipeline names are case-insensitive, so the name is folded.
pub fn name_and_counter_key(name: &str, counter: i32) -> String {
    format!("{}:{}:{}", KEY_PREFIX, fold_name(name), counter)
}

/// Key for a run addressed by its store id
pub fn id_key(id: i64) -> String {
    format!("{}:{}", KEY_PREFIX, id)
}

/// Shared key/value cache of pipeline instance models
///
/// Implementations must be safe for concurrent use. Expiry and capacity
/// policy belong to the implementation; callers assume none.
pub trait CacheStore: Send + Sync {
    /// Returns a copy of the cached model, if present
    fn get(&self, key: &str) -> Option<PipelineInstanceModel>;

    /// Stores `value` under `key`, replacing any previous entry
    fn put(&self, key: &str, value: PipelineInstanceModel);

    /// Removes the entry under `key`; absent keys are ignored
    fn remove(&self, key: &str);
}
