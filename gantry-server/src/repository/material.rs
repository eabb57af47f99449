//! Material Repository
//!
//! Loads the material revisions that triggered a pipeline run.

use chrono::{DateTime, Utc};
use gantry_core::domain::material::{Material, MaterialRevision, MaterialRevisions, Modification};
use sqlx::PgPool;

/// Material revisions of a run, each with its modifications newest first
///
/// A run with no recorded revisions yields an empty collection.
pub async fn find_revisions_for_pipeline(
    pool: &PgPool,
    pipeline_id: i64,
) -> Result<MaterialRevisions, sqlx::Error> {
    let rows = sqlx::query_as::<_, RevisionRow>(
        r#"
        SELECT pmr.id AS revision_id, pmr.changed,
               m.fingerprint, m.name AS material_name, m.type AS material_type,
               md.revision, md.username, md.email, md.comment, md.modified_time
        FROM pipeline_material_revisions pmr
        JOIN materials m ON m.id = pmr.material_id
        JOIN modifications md
          ON md.material_id = pmr.material_id
         AND md.id BETWEEN pmr.from_modification_id AND pmr.to_modification_id
        WHERE pmr.pipeline_id = $1
        ORDER BY pmr.id, md.id DESC
        "#,
    )
    .bind(pipeline_id)
    .fetch_all(pool)
    .await?;

    Ok(group_rows(rows))
}

/// Folds joined rows into revisions; rows must be ordered by `revision_id`
fn group_rows(rows: Vec<RevisionRow>) -> MaterialRevisions {
    let mut revisions: Vec<(i64, MaterialRevision)> = Vec::new();

    for row in rows {
        let modification = Modification::new(
            row.username,
            row.comment,
            row.email,
            row.modified_time,
            row.revision,
        );

        match revisions.last_mut() {
            Some((id, revision)) if *id == row.revision_id => {
                revision.modifications.push(modification);
            }
            _ => revisions.push((
                row.revision_id,
                MaterialRevision {
                    material: Material {
                        fingerprint: row.fingerprint,
                        name: row.material_name,
                        material_type: row.material_type,
                    },
                    modifications: vec![modification],
                    changed: row.changed,
                },
            )),
        }
    }

    MaterialRevisions::new(revisions.into_iter().map(|(_, r)| r).collect())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct RevisionRow {
    revision_id: i64,
    changed: bool,
    fingerprint: String,
    material_name: String,
    material_type: String,
    revision: String,
    username: String,
    email: Option<String>,
    comment: String,
    modified_time: DateTime<Utc>,
}
