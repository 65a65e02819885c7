//! Session configuration

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Order in which the worklist hands out nodes.
///
/// The fixed point does not depend on it; only the step count does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorklistOrder {
    #[default]
    Fifo,
    Lifo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Upper bound on worklist steps per drain before giving up.
    pub max_iterations: usize,
    pub worklist_order: WorklistOrder,
    /// Emit a `trace!` event for every value change.
    pub trace_values: bool,
}

impl AnalysisConfig {
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        Ok(config)
    }

    pub fn with_order(mut self, order: WorklistOrder) -> Self {
        self.worklist_order = order;
        self
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100_000,
            worklist_order: WorklistOrder::Fifo,
            trace_values: false,
        }
    }
}
