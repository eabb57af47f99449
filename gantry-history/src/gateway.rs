//! Store gateway
//!
//! The repository's only view of the relational store: a fixed set of named
//! queries, each taking its own typed parameter struct. Implementations own
//! connection pooling and timeouts and report every failure as a
//! [`GatewayError`].

use async_trait::async_trait;
use gantry_core::domain::instance::PipelineInstanceModel;
use gantry_core::domain::material::MaterialRevisions;
use gantry_core::domain::pipeline::Pipeline;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for gateway queries
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Failures reported by a store gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The query reached the store and failed
    #[error("Query {query} failed: {source}")]
    QueryFailed {
        query: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The query did not complete in time
    #[error("Query {query} timed out after {elapsed:?}")]
    Timeout {
        query: &'static str,
        elapsed: Duration,
    },

    /// No connection to the store could be obtained
    #[error("Store connection unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    pub fn query_failed(
        query: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::QueryFailed {
            query,
            source: source.into(),
        }
    }
}

// =============================================================================
// Query Parameters
// =============================================================================

/// Address of a run by pipeline name and counter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameAndCounter {
    pub name: String,
    pub counter: i32,
}

impl NameAndCounter {
    pub fn new(name: impl Into<String>, counter: i32) -> Self {
        Self {
            name: name.into(),
            counter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryById {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryByIds {
    pub ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentUpdate {
    pub name: String,
    pub counter: i32,
    pub comment: String,
}

/// One page of a pipeline's history, most recent run first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub name: String,
    pub page_size: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryCount {
    pub name: String,
}

// =============================================================================
// Gateway Trait
// =============================================================================

/// Typed query executor against the pipeline history store
///
/// Records returned by the history queries carry no material revisions; the
/// repository attaches them with [`StoreGateway::material_revisions_for_pipeline`].
#[async_trait]
pub trait StoreGateway: Send + Sync {
    /// Full history record of one run addressed by name and counter
    async fn history_by_name_and_counter(
        &self,
        params: &NameAndCounter,
    ) -> GatewayResult<Option<PipelineInstanceModel>>;

    /// Persisted header of one run addressed by name and counter
    async fn pipeline_by_name_and_counter(
        &self,
        params: &NameAndCounter,
    ) -> GatewayResult<Option<Pipeline>>;

    /// Full history record of one run addressed by id
    async fn history_by_id(
        &self,
        params: &HistoryById,
    ) -> GatewayResult<Option<PipelineInstanceModel>>;

    /// Full history records for a batch of ids, in no particular order
    async fn history_by_ids(
        &self,
        params: &HistoryByIds,
    ) -> GatewayResult<Vec<PipelineInstanceModel>>;

    /// Material revisions that triggered a run; empty if none were recorded
    async fn material_revisions_for_pipeline(
        &self,
        params: &HistoryById,
    ) -> GatewayResult<MaterialRevisions>;

    /// Sets the comment of a run, returning the number of affected rows
    async fn update_comment(&self, params: &CommentUpdate) -> GatewayResult<u64>;

    /// Ids of the runs in one history page, most recent first
    async fn pipeline_range(&self, params: &PageQuery) -> GatewayResult<Vec<i64>>;

    /// Full history records of one page, most recent first
    async fn history_by_name(
        &self,
        params: &PageQuery,
    ) -> GatewayResult<Vec<PipelineInstanceModel>>;

    /// Every active run across all pipelines
    async fn all_active_instances(&self) -> GatewayResult<Vec<PipelineInstanceModel>>;

    /// Number of recorded runs of a pipeline
    async fn count_history(&self, params: &HistoryCount) -> GatewayResult<i64>;
}
