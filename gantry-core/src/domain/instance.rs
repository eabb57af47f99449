//! Pipeline instance domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::material::MaterialRevisions;

/// One recorded execution of a pipeline
///
/// Addressable either by its store-assigned `id` or by `(name, counter)`;
/// both resolve to the same run. Everything except `comment` is fixed once
/// the run completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInstanceModel {
    pub id: i64,
    pub name: String,
    pub counter: i32,
    pub label: String,
    pub build_cause: BuildCause,
    pub stages: Vec<StageInstanceModel>,
    pub comment: Option<String>,
}

impl PipelineInstanceModel {
    /// Creates a model that has not been persisted yet (`id` is 0)
    pub fn new(
        name: impl Into<String>,
        counter: i32,
        label: impl Into<String>,
        build_cause: BuildCause,
        stages: Vec<StageInstanceModel>,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            counter,
            label: label.into(),
            build_cause,
            stages,
            comment: None,
        }
    }

    /// A run is active while any of its stages is still building
    pub fn is_active(&self) -> bool {
        self.stages.iter().any(|s| s.state.is_active())
    }

    /// The stage currently building, if any
    pub fn active_stage(&self) -> Option<&StageInstanceModel> {
        self.stages.iter().find(|s| s.state.is_active())
    }

    pub fn material_revisions(&self) -> &MaterialRevisions {
        &self.build_cause.material_revisions
    }

    pub fn set_material_revisions(&mut self, revisions: MaterialRevisions) {
        self.build_cause.material_revisions = revisions;
    }

    /// Revision of the most recent modification that triggered this run
    pub fn latest_revision(&self) -> Option<&str> {
        self.build_cause.material_revisions.latest_revision()
    }

    /// Whether `other` describes the same run (same id, name and counter)
    pub fn same_run_as(&self, other: &PipelineInstanceModel) -> bool {
        self.id == other.id && self.name == other.name && self.counter == other.counter
    }
}

/// Why a pipeline run was triggered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildCause {
    pub trigger: TriggerKind,
    pub approver: String,
    pub message: String,
    pub material_revisions: MaterialRevisions,
}

impl BuildCause {
    /// A run forced by hand, without material revisions attached yet
    pub fn manual_forced() -> Self {
        Self {
            trigger: TriggerKind::Manual,
            approver: "anonymous".to_string(),
            message: "Forced by anonymous".to_string(),
            material_revisions: MaterialRevisions::default(),
        }
    }

    pub fn is_forced(&self) -> bool {
        self.trigger == TriggerKind::Manual
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerKind {
    Manual,
    Automatic,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Manual => "Manual",
            TriggerKind::Automatic => "Automatic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Manual" => Some(TriggerKind::Manual),
            "Automatic" => Some(TriggerKind::Automatic),
            _ => None,
        }
    }
}

/// Summary of one stage of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageInstanceModel {
    pub name: String,
    pub counter: i32,
    pub state: StageState,
    pub approved_by: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Stage execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageState {
    Building,
    Passed,
    Failed,
    Cancelled,
    Unknown,
}

impl StageState {
    pub fn is_active(&self) -> bool {
        matches!(self, StageState::Building)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageState::Building => "Building",
            StageState::Passed => "Passed",
            StageState::Failed => "Failed",
            StageState::Cancelled => "Cancelled",
            StageState::Unknown => "Unknown",
        }
    }

    /// Unrecognized values map to `Unknown`
    pub fn parse(s: &str) -> Self {
        match s {
            "Building" => StageState::Building,
            "Passed" => StageState::Passed,
            "Failed" => StageState::Failed,
            "Cancelled" => StageState::Cancelled,
            _ => StageState::Unknown,
        }
    }
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
