use thiserror::Error;

use crate::state::PipelineState;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize entities: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors surfaced to the caller of a run. Everything below planning is
/// recovered inside the run and only shows up in the stats.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("planning failed: {0}")]
    Planning(#[from] planner::PlanError),

    #[error("export failed: {0}")]
    Export(#[from] ExportError),

    #[error("illegal state transition {from:?} -> {to:?}")]
    IllegalTransition {
        from: PipelineState,
        to: PipelineState,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
