pub mod error;
pub mod executor;
pub mod retry;
pub mod tavily;

pub use error::SearchError;
pub use executor::{RetrievalExecutor, RetrievalSettings, RetrievalStatus, Retrieved};
pub use retry::{Attempted, BackoffPolicy, RecordingSleeper, Sleeper, TokioSleeper};
pub use tavily::TavilyClient;

use async_trait::async_trait;

/// Opaque text returned by the search collaborator for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResult {
    pub text: String,
}

impl RawResult {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<RawResult, SearchError>;
}
