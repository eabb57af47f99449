//! Pipeline Configuration API Handlers
//!
//! Reads and reloads the set of configured pipelines at runtime.

use axum::{Json, extract::State, http::StatusCode};
use gantry_core::dto::config::ConfiguredPipelines;
use gantry_history::ConfigProvider;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

/// GET /config/pipelines
/// Currently configured pipeline names, sorted
pub async fn get_pipelines(State(state): State<AppState>) -> Json<ConfiguredPipelines> {
    let mut pipelines: Vec<String> = state
        .pipelines
        .configured_pipeline_names()
        .into_iter()
        .collect();
    pipelines.sort();

    Json(ConfiguredPipelines { pipelines })
}

/// PUT /config/pipelines
/// Replace the configured pipeline set
pub async fn replace_pipelines(
    State(state): State<AppState>,
    Json(req): Json<ConfiguredPipelines>,
) -> ApiResult<StatusCode> {
    validate_names(&req.pipelines)?;

    state.pipelines.replace(req.pipelines);

    Ok(StatusCode::NO_CONTENT)
}

fn validate_names(names: &[String]) -> ApiResult<()> {
    if names.iter().any(|name| name.trim().is_empty()) {
        return Err(ApiError::BadRequest(
            "pipeline names cannot be empty".to_string(),
        ));
    }
    Ok(())
}
