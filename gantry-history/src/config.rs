//! Configured pipelines
//!
//! The configuration source is authoritative for whether a pipeline exists.
//! The repository asks it before issuing any store query for bulk views.

use gantry_core::domain::pipeline::same_name;
use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

/// Provider of the names of currently configured pipelines
pub trait ConfigProvider: Send + Sync {
    fn configured_pipeline_names(&self) -> HashSet<String>;

    /// Case-insensitive membership test
    fn is_configured(&self, name: &str) -> bool {
        self.configured_pipeline_names()
            .iter()
            .any(|configured| same_name(configured, name))
    }
}

/// Fixed set of pipeline names
#[derive(Debug, Clone, Default)]
pub struct StaticPipelineConfig {
    names: HashSet<String>,
}

impl StaticPipelineConfig {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl ConfigProvider for StaticPipelineConfig {
    fn configured_pipeline_names(&self) -> HashSet<String> {
        self.names.clone()
    }
}

/// Pipeline names that can be swapped at runtime, e.g. on config reload
#[derive(Debug, Default)]
pub struct SharedPipelineConfig {
    names: RwLock<HashSet<String>>,
}

impl SharedPipelineConfig {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: RwLock::new(names.into_iter().map(Into::into).collect()),
        }
    }

    /// Replaces the whole set atomically
    pub fn replace<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: HashSet<String> = names.into_iter().map(Into::into).collect();
        tracing::info!("Configured pipelines replaced ({} pipelines)", names.len());
        *self.names.write().unwrap_or_else(PoisonError::into_inner) = names;
    }
}

impl ConfigProvider for SharedPipelineConfig {
    fn configured_pipeline_names(&self) -> HashSet<String> {
        self.names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_configured(&self, name: &str) -> bool {
        self.names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|configured| same_name(configured, name))
    }
}
