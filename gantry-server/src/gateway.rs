//! Postgres store gateway
//!
//! Implements [`StoreGateway`] over the sqlx repositories. Every query runs
//! under the configured timeout.

use async_trait::async_trait;
use gantry_core::domain::instance::PipelineInstanceModel;
use gantry_core::domain::material::MaterialRevisions;
use gantry_core::domain::pipeline::Pipeline;
use gantry_history::gateway::{
    CommentUpdate, GatewayError, GatewayResult, HistoryById, HistoryByIds, HistoryCount,
    NameAndCounter, PageQuery, StoreGateway,
};
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;

use crate::repository::{history_repository, material_repository, pipeline_repository};

pub struct PgStoreGateway {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgStoreGateway {
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    async fn timed<T, F>(&self, query: &'static str, fut: F) -> GatewayResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result.map_err(|err| map_sqlx_error(query, err)),
            Err(_) => Err(GatewayError::Timeout {
                query,
                elapsed: self.query_timeout,
            }),
        }
    }
}

fn map_sqlx_error(query: &'static str, err: sqlx::Error) -> GatewayError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            GatewayError::Unavailable(err.to_string())
        }
        other => GatewayError::query_failed(query, other),
    }
}

#[async_trait]
impl StoreGateway for PgStoreGateway {
    async fn history_by_name_and_counter(
        &self,
        params: &NameAndCounter,
    ) -> GatewayResult<Option<PipelineInstanceModel>> {
        self.timed(
            "history_by_name_and_counter",
            history_repository::find_by_name_and_counter(&self.pool, &params.name, params.counter),
        )
        .await
    }

    async fn pipeline_by_name_and_counter(
        &self,
        params: &NameAndCounter,
    ) -> GatewayResult<Option<Pipeline>> {
        self.timed(
            "pipeline_by_name_and_counter",
            pipeline_repository::find_by_name_and_counter(&self.pool, &params.name, params.counter),
        )
        .await
    }

    async fn history_by_id(
        &self,
        params: &HistoryById,
    ) -> GatewayResult<Option<PipelineInstanceModel>> {
        self.timed(
            "history_by_id",
            history_repository::find_by_id(&self.pool, params.id),
        )
        .await
    }

    async fn history_by_ids(
        &self,
        params: &HistoryByIds,
    ) -> GatewayResult<Vec<PipelineInstanceModel>> {
        self.timed(
            "history_by_ids",
            history_repository::find_by_ids(&self.pool, &params.ids),
        )
        .await
    }

    async fn material_revisions_for_pipeline(
        &self,
        params: &HistoryById,
    ) -> GatewayResult<MaterialRevisions> {
        self.timed(
            "material_revisions_for_pipeline",
            material_repository::find_revisions_for_pipeline(&self.pool, params.id),
        )
        .await
    }

    async fn update_comment(&self, params: &CommentUpdate) -> GatewayResult<u64> {
        self.timed(
            "update_comment",
            pipeline_repository::update_comment(
                &self.pool,
                &params.name,
                params.counter,
                &params.comment,
            ),
        )
        .await
    }

    async fn pipeline_range(&self, params: &PageQuery) -> GatewayResult<Vec<i64>> {
        self.timed(
            "pipeline_range",
            history_repository::find_range(
                &self.pool,
                &params.name,
                params.page_size,
                params.offset,
            ),
        )
        .await
    }

    async fn history_by_name(
        &self,
        params: &PageQuery,
    ) -> GatewayResult<Vec<PipelineInstanceModel>> {
        self.timed(
            "history_by_name",
            history_repository::find_page(
                &self.pool,
                &params.name,
                params.page_size,
                params.offset,
            ),
        )
        .await
    }

    async fn all_active_instances(&self) -> GatewayResult<Vec<PipelineInstanceModel>> {
        self.timed(
            "all_active_instances",
            history_repository::find_active(&self.pool),
        )
        .await
    }

    async fn count_history(&self, params: &HistoryCount) -> GatewayResult<i64> {
        self.timed(
            "count_history",
            history_repository::count_by_name(&self.pool, &params.name),
        )
        .await
    }
}
