pub mod config;
pub mod error;
pub mod export;
pub mod orchestrator;
pub mod state;
pub mod stats;

pub use config::{ExtractionConfig, PipelineConfig, RetryConfig};
pub use error::{ExportError, PipelineError};
pub use export::{ExportSink, JsonFileSink};
pub use orchestrator::{Collaborators, Pipeline, RunOutcome, RunStatus};
pub use state::{PipelineState, StateMachine};
pub use stats::RunStats;
