//! Error types for the history repository

use thiserror::Error;

use crate::gateway::GatewayError;

/// Result type alias for repository operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Errors returned by the pipeline history repository
#[derive(Debug, Error)]
pub enum HistoryError {
    /// No record backs the requested run
    #[error("Pipeline history not found: {0}")]
    NotFound(Lookup),

    /// The store gateway failed or timed out
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] GatewayError),

    /// Cache and store disagree about the identity of a run
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl HistoryError {
    pub fn not_found_by_name(name: &str, counter: i32) -> Self {
        Self::NotFound(Lookup::NameAndCounter {
            name: name.to_string(),
            counter,
        })
    }

    pub fn not_found_by_id(id: i64) -> Self {
        Self::NotFound(Lookup::Id(id))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

/// How a run was addressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    NameAndCounter { name: String, counter: i32 },
    Id(i64),
}

impl std::fmt::Display for Lookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lookup::NameAndCounter { name, counter } => write!(f, "{}/{}", name, counter),
            Lookup::Id(id) => write!(f, "id {}", id),
        }
    }
}
