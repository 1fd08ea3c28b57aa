pub mod config;
pub mod logging;
pub mod routes;

use extract::ChatClient;
use pipeline::{Collaborators, Pipeline, PipelineConfig, PipelineError};
use planner::LlmTermGenerator;
use retrieval::TavilyClient;
use std::sync::Arc;

use crate::config::Settings;

/// Wires the live collaborators into a pipeline.
pub fn build_pipeline(settings: &Settings, config: &PipelineConfig) -> Result<Pipeline, PipelineError> {
    let terms_client = ChatClient::new(
        settings.openai_base_url.clone(),
        settings.fast_llm_model.clone(),
        settings.openai_api_key.clone(),
    );
    let extraction_client = ChatClient::new(
        settings.openai_base_url.clone(),
        settings.long_context_model.clone(),
        settings.openai_api_key.clone(),
    );

    let collaborators = Collaborators {
        terms: Arc::new(LlmTermGenerator::new(terms_client)),
        search: Arc::new(TavilyClient::with_api_key(settings.tavily_api_key.clone())),
        extractor: Arc::new(extraction_client),
    };

    Pipeline::new(collaborators, config)
}
