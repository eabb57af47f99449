//! Pipeline configuration DTOs

use serde::{Deserialize, Serialize};

/// The full set of configured pipeline names
///
/// Used both to read the current set and to replace it wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfiguredPipelines {
    pub pipelines: Vec<String>,
}
