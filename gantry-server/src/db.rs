use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create pipelines table (one row per run)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipelines (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            counter INTEGER NOT NULL,
            label VARCHAR(255) NOT NULL,
            build_cause_type VARCHAR(50) NOT NULL,
            build_cause_by VARCHAR(255) NOT NULL,
            build_cause_message TEXT NOT NULL DEFAULT '',
            comment TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create stages table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stages (
            id BIGSERIAL PRIMARY KEY,
            pipeline_id BIGINT NOT NULL REFERENCES pipelines(id) ON DELETE CASCADE,
            name VARCHAR(255) NOT NULL,
            counter INTEGER NOT NULL,
            state VARCHAR(50) NOT NULL,
            approved_by VARCHAR(255),
            scheduled_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create materials and modifications tables
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS materials (
            id BIGSERIAL PRIMARY KEY,
            fingerprint VARCHAR(255) NOT NULL UNIQUE,
            name VARCHAR(255) NOT NULL,
            type VARCHAR(50) NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS modifications (
            id BIGSERIAL PRIMARY KEY,
            material_id BIGINT NOT NULL REFERENCES materials(id) ON DELETE CASCADE,
            revision VARCHAR(1024) NOT NULL,
            username VARCHAR(255) NOT NULL,
            email VARCHAR(255),
            comment TEXT NOT NULL DEFAULT '',
            modified_time TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Modifications between from/to (inclusive) triggered the run
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_material_revisions (
            id BIGSERIAL PRIMARY KEY,
            pipeline_id BIGINT NOT NULL REFERENCES pipelines(id) ON DELETE CASCADE,
            material_id BIGINT NOT NULL REFERENCES materials(id),
            from_modification_id BIGINT NOT NULL REFERENCES modifications(id),
            to_modification_id BIGINT NOT NULL REFERENCES modifications(id),
            changed BOOLEAN NOT NULL DEFAULT false
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for better query performance
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_pipelines_name_counter ON pipelines(LOWER(name), counter DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_stages_pipeline_id ON stages(pipeline_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_stages_state ON stages(state)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_modifications_material_id ON modifications(material_id, id DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_pmr_pipeline_id ON pipeline_material_revisions(pipeline_id)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
