//! Material and modification domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::revision;

/// One detected change from a single material
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modification {
    pub username: String,
    pub email: Option<String>,
    pub comment: String,
    pub modified_time: DateTime<Utc>,
    pub revision: String,
}

impl Modification {
    pub fn new(
        username: impl Into<String>,
        comment: impl Into<String>,
        email: Option<String>,
        modified_time: DateTime<Utc>,
        revision: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email,
            comment: comment.into(),
            modified_time,
            revision: revision.into(),
        }
    }
}

/// External change source feeding a pipeline (e.g. a source repository)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    /// Stable identity of the material across pipelines
    pub fingerprint: String,
    pub name: String,
    #[serde(rename = "type")]
    pub material_type: String,
}

/// A material together with the modifications that triggered a run
///
/// `modifications` is ordered most-recent-first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialRevision {
    pub material: Material,
    pub modifications: Vec<Modification>,
    pub changed: bool,
}

impl MaterialRevision {
    /// The most recent modification of this material, if any
    pub fn latest(&self) -> Option<&Modification> {
        self.modifications.first()
    }
}

/// Ordered collection of material revisions attached to a trigger cause
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialRevisions(Vec<MaterialRevision>);

impl MaterialRevisions {
    pub fn new(revisions: Vec<MaterialRevision>) -> Self {
        Self(revisions)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MaterialRevision> {
        self.0.iter()
    }

    /// Whether any material changed since the previous run
    pub fn has_changed(&self) -> bool {
        self.0.iter().any(|r| r.changed)
    }

    /// Revision of the latest modification across every material
    pub fn latest_revision(&self) -> Option<&str> {
        let lists: Vec<&[Modification]> =
            self.0.iter().map(|r| r.modifications.as_slice()).collect();
        revision::latest_revision_from_ordered_lists(&lists)
    }
}

impl From<Vec<MaterialRevision>> for MaterialRevisions {
    fn from(revisions: Vec<MaterialRevision>) -> Self {
        Self(revisions)
    }
}

impl<'a> IntoIterator for &'a MaterialRevisions {
    type Item = &'a MaterialRevision;
    type IntoIter = std::slice::Iter<'a, MaterialRevision>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
