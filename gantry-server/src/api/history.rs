//! Pipeline History API Handlers
//!
//! HTTP endpoints over the pipeline history repository.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use gantry_core::domain::instance::PipelineInstanceModel;
use gantry_core::dto::history::{HistoryPage, MAX_PAGE_SIZE, PageParams, UpdateComment};
use gantry_history::CacheStats;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

const MAX_COMMENT_LENGTH: usize = 1000;

/// GET /history/{name}/{counter}
/// Get one run by pipeline name and counter
pub async fn get_instance(
    State(state): State<AppState>,
    Path((name, counter)): Path<(String, i32)>,
) -> ApiResult<Json<PipelineInstanceModel>> {
    tracing::debug!("Getting pipeline run: {}/{}", name, counter);

    validate_counter(counter)?;
    let pim = state
        .repository
        .find_history_by_name_and_counter(&name, counter)
        .await?;

    Ok(Json(pim))
}

/// POST /history/{name}/{counter}/comment
/// Replace the comment of a run
pub async fn update_comment(
    State(state): State<AppState>,
    Path((name, counter)): Path<(String, i32)>,
    Json(req): Json<UpdateComment>,
) -> ApiResult<StatusCode> {
    tracing::info!("Updating comment of pipeline run: {}/{}", name, counter);

    validate_counter(counter)?;
    validate_comment(&req.comment)?;
    state
        .repository
        .update_comment(&name, counter, &req.comment)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /history/{name}?page_size=&offset=
/// One page of a pipeline's history, most recent run first
pub async fn get_history(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<HistoryPage>> {
    tracing::debug!(
        "Loading history of {} (size {}, offset {})",
        name,
        params.page_size,
        params.offset
    );

    validate_page_size(params.page_size)?;
    let pipelines = state
        .repository
        .load_history(&name, params.page_size, params.offset)
        .await?;
    let count = state.repository.count_history(&name).await?;

    Ok(Json(HistoryPage { pipelines, count }))
}

/// GET /active/{name}
/// Active runs of a configured pipeline
pub async fn get_active(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Vec<PipelineInstanceModel>>> {
    tracing::debug!("Listing active runs of {}", name);

    let active = state.repository.load_active_instances_for(&name).await?;
    Ok(Json(active))
}

/// GET /instance/{id}
/// Get one run by ID
pub async fn get_instance_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<PipelineInstanceModel>> {
    tracing::debug!("Getting pipeline run: id {}", id);

    if id <= 0 {
        return Err(ApiError::BadRequest("id must be positive".to_string()));
    }
    let pim = state.repository.find_history_by_id(id).await?;

    Ok(Json(pim))
}

/// GET /cache/stats
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

// =============================================================================
// Validation
// =============================================================================

fn validate_counter(counter: i32) -> ApiResult<()> {
    if counter < 1 {
        return Err(ApiError::BadRequest(format!(
            "counter must be at least 1, got {counter}"
        )));
    }
    Ok(())
}

fn validate_page_size(page_size: u32) -> ApiResult<()> {
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(ApiError::BadRequest(format!(
            "page_size must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    Ok(())
}

fn validate_comment(comment: &str) -> ApiResult<()> {
    if comment.chars().count() > MAX_COMMENT_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "comment too long (max {MAX_COMMENT_LENGTH} characters)"
        )));
    }
    Ok(())
}
