//! Pipeline history DTOs

use serde::{Deserialize, Serialize};

use crate::domain::instance::PipelineInstanceModel;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Request to replace the comment of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateComment {
    pub comment: String,
}

/// Paging parameters for history listings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

/// One page of pipeline history, most recent run first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPage {
    pub pipelines: Vec<PipelineInstanceModel>,
    /// Total number of recorded runs of the pipeline
    pub count: i64,
}

impl HistoryPage {
    /// A page shorter than the requested size is the last one
    pub fn is_last_page(&self, params: &PageParams) -> bool {
        self.pipelines.len() < params.page_size as usize
    }
}
