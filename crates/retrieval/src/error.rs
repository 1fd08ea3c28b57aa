use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SearchError {
    /// The provider asked us to slow down. Retried with backoff.
    #[error("search rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("transient search failure: {0}")]
    Transient(String),

    #[error("search failed: {0}")]
    Permanent(String),

    #[error("search stage deadline passed")]
    DeadlineExceeded,
}
