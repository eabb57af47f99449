//! Pipeline Repository
//!
//! Reads and updates the `pipelines` header rows.

use gantry_core::domain::pipeline::Pipeline;
use sqlx::PgPool;

/// Find a pipeline run header by name (case-insensitive) and counter
pub async fn find_by_name_and_counter(
    pool: &PgPool,
    name: &str,
    counter: i32,
) -> Result<Option<Pipeline>, sqlx::Error> {
    let row = sqlx::query_as::<_, PipelineRow>(
        r#"
        SELECT id, name, counter, label, comment
        FROM pipelines
        WHERE LOWER(name) = LOWER($1) AND counter = $2
        "#,
    )
    .bind(name)
    .bind(counter)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// Replace the comment of a run, returning the number of affected rows
pub async fn update_comment(
    pool: &PgPool,
    name: &str,
    counter: i32,
    comment: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE pipelines
        SET comment = $1
        WHERE LOWER(name) = LOWER($2) AND counter = $3
        "#,
    )
    .bind(comment)
    .bind(name)
    .bind(counter)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct PipelineRow {
    id: i64,
    name: String,
    counter: i32,
    label: String,
    comment: Option<String>,
}

impl From<PipelineRow> for Pipeline {
    fn from(row: PipelineRow) -> Self {
        Pipeline {
            id: row.id,
            name: row.name,
            counter: row.counter,
            label: row.label,
            comment: row.comment,
        }
    }
}
