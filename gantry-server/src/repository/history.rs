//! History Repository
//!
//! Reads full pipeline run records: the `pipelines` header joined with its
//! `stages`. Material revisions are loaded separately, see
//! [`crate::repository::material`].

use chrono::{DateTime, Utc};
use gantry_core::domain::instance::{
    BuildCause, PipelineInstanceModel, StageInstanceModel, StageState, TriggerKind,
};
use gantry_core::domain::material::MaterialRevisions;
use sqlx::PgPool;
use std::collections::HashMap;

const SELECT_HISTORY: &str = r#"
    SELECT id, name, counter, label, build_cause_type, build_cause_by,
           build_cause_message, comment
    FROM pipelines
"#;

/// Find a run by pipeline name (case-insensitive) and counter
pub async fn find_by_name_and_counter(
    pool: &PgPool,
    name: &str,
    counter: i32,
) -> Result<Option<PipelineInstanceModel>, sqlx::Error> {
    let query = format!("{SELECT_HISTORY} WHERE LOWER(name) = LOWER($1) AND counter = $2");
    let row = sqlx::query_as::<_, HistoryRow>(&query)
        .bind(name)
        .bind(counter)
        .fetch_optional(pool)
        .await?;

    Ok(with_stages(pool, row.into_iter().collect()).await?.pop())
}

/// Find a run by ID
pub async fn find_by_id(
    pool: &PgPool,
    id: i64,
) -> Result<Option<PipelineInstanceModel>, sqlx::Error> {
    let query = format!("{SELECT_HISTORY} WHERE id = $1");
    let row = sqlx::query_as::<_, HistoryRow>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(with_stages(pool, row.into_iter().collect()).await?.pop())
}

/// Find a batch of runs by ID; unknown ids are skipped
pub async fn find_by_ids(
    pool: &PgPool,
    ids: &[i64],
) -> Result<Vec<PipelineInstanceModel>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let query = format!("{SELECT_HISTORY} WHERE id = ANY($1)");
    let rows = sqlx::query_as::<_, HistoryRow>(&query)
        .bind(ids)
        .fetch_all(pool)
        .await?;

    with_stages(pool, rows).await
}

/// One page of a pipeline's runs, most recent counter first
pub async fn find_page(
    pool: &PgPool,
    name: &str,
    limit: u32,
    offset: u32,
) -> Result<Vec<PipelineInstanceModel>, sqlx::Error> {
    let query = format!(
        "{SELECT_HISTORY} WHERE LOWER(name) = LOWER($1) ORDER BY counter DESC LIMIT $2 OFFSET $3"
    );
    let rows = sqlx::query_as::<_, HistoryRow>(&query)
        .bind(name)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(pool)
        .await?;

    with_stages(pool, rows).await
}

/// Ids of one page of a pipeline's runs, most recent counter first
pub async fn find_range(
    pool: &PgPool,
    name: &str,
    limit: u32,
    offset: u32,
) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT id
        FROM pipelines
        WHERE LOWER(name) = LOWER($1)
        ORDER BY counter DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(name)
    .bind(i64::from(limit))
    .bind(i64::from(offset))
    .fetch_all(pool)
    .await
}

/// Every run with at least one building stage, across all pipelines
pub async fn find_active(pool: &PgPool) -> Result<Vec<PipelineInstanceModel>, sqlx::Error> {
    let query = format!(
        r#"{SELECT_HISTORY}
        WHERE EXISTS (
            SELECT 1 FROM stages s
            WHERE s.pipeline_id = pipelines.id AND s.state = $1
        )
        ORDER BY id DESC"#
    );
    let rows = sqlx::query_as::<_, HistoryRow>(&query)
        .bind(StageState::Building.as_str())
        .fetch_all(pool)
        .await?;

    with_stages(pool, rows).await
}

/// Number of recorded runs of a pipeline
pub async fn count_by_name(pool: &PgPool, name: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM pipelines WHERE LOWER(name) = LOWER($1)")
        .bind(name)
        .fetch_one(pool)
        .await
}

/// Loads the stages of `rows` with one query and assembles the models
async fn with_stages(
    pool: &PgPool,
    rows: Vec<HistoryRow>,
) -> Result<Vec<PipelineInstanceModel>, sqlx::Error> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let stages = sqlx::query_as::<_, StageRow>(
        r#"
        SELECT pipeline_id, name, counter, state, approved_by, scheduled_at
        FROM stages
        WHERE pipeline_id = ANY($1)
        ORDER BY pipeline_id, id
        "#,
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    Ok(assemble(rows, stages))
}

fn assemble(rows: Vec<HistoryRow>, stages: Vec<StageRow>) -> Vec<PipelineInstanceModel> {
    let mut by_pipeline: HashMap<i64, Vec<StageInstanceModel>> = HashMap::new();
    for stage in stages {
        by_pipeline
            .entry(stage.pipeline_id)
            .or_default()
            .push(stage.into());
    }

    rows.into_iter()
        .map(|row| {
            let stages = by_pipeline.remove(&row.id).unwrap_or_default();
            row.into_model(stages)
        })
        .collect()
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: i64,
    name: String,
    counter: i32,
    label: String,
    build_cause_type: String,
    build_cause_by: String,
    build_cause_message: String,
    comment: Option<String>,
}

impl HistoryRow {
    fn into_model(self, stages: Vec<StageInstanceModel>) -> PipelineInstanceModel {
        let trigger = TriggerKind::parse(&self.build_cause_type).unwrap_or_else(|| {
            tracing::warn!(
                "Unknown build cause type '{}' on pipeline {}; treating as automatic",
                self.build_cause_type,
                self.id
            );
            TriggerKind::Automatic
        });

        PipelineInstanceModel {
            id: self.id,
            name: self.name,
            counter: self.counter,
            label: self.label,
            build_cause: BuildCause {
                trigger,
                approver: self.build_cause_by,
                message: self.build_cause_message,
                material_revisions: MaterialRevisions::default(),
            },
            stages,
            comment: self.comment,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StageRow {
    pipeline_id: i64,
    name: String,
    counter: i32,
    state: String,
    approved_by: Option<String>,
    scheduled_at: Option<DateTime<Utc>>,
}

impl From<StageRow> for StageInstanceModel {
    fn from(row: StageRow) -> Self {
        StageInstanceModel {
            name: row.name,
            counter: row.counter,
            state: StageState::parse(&row.state),
            approved_by: row.approved_by,
            scheduled_at: row.scheduled_at,
        }
    }
}
