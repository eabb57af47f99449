use anyhow::Context;
use gantry_history::{
    InMemoryCache, PipelineHistoryRepository, RepositoryOptions, SharedPipelineConfig,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::gateway::PgStoreGateway;

pub mod api;
pub mod config;
pub mod db;
pub mod gateway;
pub mod repository;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "gantry_server=debug,gantry_history=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Gantry history server...");

    let config = load_config();
    config.validate().context("Invalid configuration")?;

    tracing::info!("Connecting to database...");

    // Create database connection pool
    let pool = db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Database connection pool created");

    // Run migrations
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let mut cache = InMemoryCache::new(config.cache_max_entries);
    if let Some(ttl) = config.cache_ttl {
        cache = cache.with_ttl(ttl);
    }
    let cache = Arc::new(cache);

    let pipelines = Arc::new(SharedPipelineConfig::new(
        config.configured_pipelines.iter().cloned(),
    ));
    tracing::info!(
        "{} pipelines configured",
        config.configured_pipelines.len()
    );

    let repository = PipelineHistoryRepository::new(
        Arc::new(PgStoreGateway::new(pool, config.query_timeout)),
        cache.clone(),
        pipelines.clone(),
    )
    .with_options(RepositoryOptions {
        range_paging: config.range_paging,
    });

    // Build router with all API endpoints
    let app = api::create_router(api::AppState {
        repository: Arc::new(repository),
        cache,
        pipelines,
    });

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}

/// Loads configuration from the environment, falling back to defaults
fn load_config() -> Config {
    match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Failed to load config from environment: {}", e);
            tracing::info!("Using default configuration");
            Config::default()
        }
    }
}
