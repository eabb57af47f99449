//! Pipeline domain types

use serde::{Deserialize, Serialize};

/// Persisted header of one pipeline run
///
/// Shares its id space with `PipelineInstanceModel`. This is the record the
/// comment mutation is applied to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: i64,
    pub name: String,
    pub counter: i32,
    pub label: String,
    pub comment: Option<String>,
}

/// Canonical form of a pipeline name
///
/// Names are case-insensitive under full Unicode lowercasing, matching the
/// store's `LOWER(name)` comparisons.
pub fn fold_name(name: &str) -> String {
    name.to_lowercase()
}

/// Whether two pipeline names refer to the same pipeline
pub fn same_name(a: &str, b: &str) -> bool {
    a == b
        || a.chars()
            .flat_map(char::to_lowercase)
            .eq(b.chars().flat_map(char::to_lowercase))
}
