use extract::ExtractionSettings;
use retrieval::{BackoffPolicy, RetrievalSettings};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::PipelineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub query_budget: usize,
    pub retrieval: RetrievalSettings,
    pub retry: RetryConfig,
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_wait_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub repair_attempts: usize,
    pub max_input_chars: usize,
    pub stage_timeout_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            query_budget: planner::DEFAULT_QUERY_BUDGET,
            retrieval: RetrievalSettings::default(),
            retry: RetryConfig {
                max_retries: 3,
                base_wait_secs: 10,
            },
            extraction: ExtractionConfig {
                repair_attempts: 1,
                max_input_chars: 24_000,
                stage_timeout_secs: Some(900),
            },
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.max_retries, Duration::from_secs(self.base_wait_secs))
    }
}

impl ExtractionConfig {
    pub fn settings(&self) -> ExtractionSettings {
        ExtractionSettings {
            repair_attempts: self.repair_attempts,
            max_input_chars: self.max_input_chars,
        }
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_secs.map(Duration::from_secs)
    }
}

impl PipelineConfig {
    /// Defaults overlaid with any `RESEARCH_*` environment variables.
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PipelineError> {
        let mut config = Self::default();

        overlay(&lookup, "RESEARCH_QUERY_BUDGET", &mut config.query_budget)?;
        overlay(&lookup, "RESEARCH_BATCH_SIZE", &mut config.retrieval.batch_size)?;
        overlay(
            &lookup,
            "RESEARCH_BATCH_COOLDOWN_SECS",
            &mut config.retrieval.batch_cooldown_secs,
        )?;
        overlay_timeout(
            &lookup,
            "RESEARCH_RETRIEVAL_TIMEOUT_SECS",
            &mut config.retrieval.stage_timeout_secs,
        )?;
        overlay(&lookup, "RESEARCH_MAX_RETRIES", &mut config.retry.max_retries)?;
        overlay(&lookup, "RESEARCH_BASE_WAIT_SECS", &mut config.retry.base_wait_secs)?;
        overlay(
            &lookup,
            "RESEARCH_REPAIR_ATTEMPTS",
            &mut config.extraction.repair_attempts,
        )?;
        overlay(
            &lookup,
            "RESEARCH_MAX_INPUT_CHARS",
            &mut config.extraction.max_input_chars,
        )?;
        overlay_timeout(
            &lookup,
            "RESEARCH_EXTRACTION_TIMEOUT_SECS",
            &mut config.extraction.stage_timeout_secs,
        )?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.retrieval.batch_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "retrieval.batch_size must be at least 1".to_string(),
            ));
        }
        if self.query_budget == 0 {
            return Err(PipelineError::InvalidConfig(
                "query_budget must be at least 1".to_string(),
            ));
        }
        if self.extraction.max_input_chars == 0 {
            return Err(PipelineError::InvalidConfig(
                "extraction.max_input_chars must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn overlay<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    target: &mut T,
) -> Result<(), PipelineError> {
    if let Some(raw) = lookup(name) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| PipelineError::InvalidConfig(format!("{} is not a valid number: {:?}", name, raw)))?;
    }
    Ok(())
}

// 0 disables the timeout.
fn overlay_timeout(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    target: &mut Option<u64>,
) -> Result<(), PipelineError> {
    let mut secs = target.unwrap_or(0);
    overlay(lookup, name, &mut secs)?;
    *target = (secs > 0).then_some(secs);
    Ok(())
}
