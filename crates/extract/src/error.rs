use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("extraction collaborator failed: {0}")]
    Collaborator(String),

    #[error("no JSON object or array found in extractor output")]
    NoJsonObject,
}

/// Failures of the OpenAI-compatible chat endpoint.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request to chat endpoint failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("chat endpoint rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("chat endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("chat endpoint returned no content")]
    EmptyResponse,
}
