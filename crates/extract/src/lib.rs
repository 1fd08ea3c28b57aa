pub mod error;
pub mod llm;
pub mod normalizer;
pub mod prompt;
pub mod schema;

pub use error::{ExtractError, LlmError};
pub use llm::ChatClient;
pub use normalizer::{parse_json_object, RecordNormalizer};
pub use schema::{
    is_placeholder, Domain, EntityDetails, EntityRecord, ExtractionRecord, ReviewMetadata,
    CONTACT_FOR_PRICING, NOT_AVAILABLE, NOT_FOUND,
    TargetSchema,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Text-to-structure collaborator. Output is best effort and may not be
/// valid JSON.
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    async fn extract(
        &self,
        topic: &str,
        raw_text: &str,
        schema: &TargetSchema,
    ) -> Result<String, ExtractError>;

    /// Ask for a corrected version of an answer that did not parse.
    async fn repair(&self, _invalid: &str, _schema: &TargetSchema) -> Result<String, ExtractError> {
        Err(ExtractError::Collaborator("repair not supported".to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSettings {
    pub repair_attempts: usize,
    pub max_input_chars: usize,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            repair_attempts: 1,
            max_input_chars: 24_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionFailure {
    /// The collaborator call itself failed.
    Collaborator,
    /// The answer never parsed, even after repair attempts.
    Parse,
    /// The caller's deadline passed before the call completed.
    TimedOut,
}

#[derive(Debug, Default)]
pub struct ExtractionOutcome {
    pub records: Vec<ExtractionRecord>,
    /// Entries present in the answer that could not become records.
    pub dropped: usize,
    pub failure: Option<ExtractionFailure>,
}

impl ExtractionOutcome {
    pub fn failed(failure: ExtractionFailure) -> Self {
        Self {
            failure: Some(failure),
            ..Self::default()
        }
    }
}

/// Turns raw search text into candidate records. Never fails: collaborator and
/// parse errors are logged and yield an empty outcome.
pub struct ExtractionEngine {
    extractor: Arc<dyn StructuredExtractor>,
    settings: ExtractionSettings,
}

impl ExtractionEngine {
    pub fn new(extractor: Arc<dyn StructuredExtractor>, settings: ExtractionSettings) -> Self {
        Self { extractor, settings }
    }

    pub async fn extract(&self, topic: &str, raw_result: &str) -> Vec<ExtractionRecord> {
        self.extract_detailed(topic, raw_result).await.records
    }

    pub async fn extract_detailed(&self, topic: &str, raw_result: &str) -> ExtractionOutcome {
        let domain = Domain::classify(topic);
        let schema = TargetSchema::for_domain(domain);
        let input = truncate_chars(raw_result, self.settings.max_input_chars);

        let answer = match self.extractor.extract(topic, input, &schema).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(operation = "extract", error = %e, "Extraction call failed, skipping result");
                return ExtractionOutcome::failed(ExtractionFailure::Collaborator);
            }
        };

        let value = match self.parse_with_repair(&answer, &schema).await {
            Some(value) => value,
            None => return ExtractionOutcome::failed(ExtractionFailure::Parse),
        };

        let batch = RecordNormalizer::new(domain).normalize(&value);
        if batch.dropped > 0 {
            debug!(dropped = batch.dropped, "Dropped entries without a usable name");
        }

        ExtractionOutcome {
            records: batch.records,
            dropped: batch.dropped,
            failure: None,
        }
    }

    async fn parse_with_repair(
        &self,
        answer: &str,
        schema: &TargetSchema,
    ) -> Option<serde_json::Value> {
        let mut current = answer.to_string();

        for attempt in 0..=self.settings.repair_attempts {
            match parse_json_object(&current) {
                Ok(value) => return Some(value),
                Err(e) if attempt < self.settings.repair_attempts => {
                    warn!(
                        operation = "extract",
                        attempt = attempt + 1,
                        error = %e,
                        "Extractor output did not parse, asking for a repair"
                    );
                    match self.extractor.repair(&current, schema).await {
                        Ok(repaired) => current = repaired,
                        Err(e) => {
                            warn!(operation = "repair", error = %e, "Repair call failed");
                            return None;
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        operation = "extract",
                        error = %e,
                        "Extractor output did not parse, skipping result"
                    );
                }
            }
        }

        None
    }
}

/// Cut `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replays canned answers and records the inputs it saw.
    struct ScriptedExtractor {
        answers: Mutex<Vec<Result<String, ExtractError>>>,
        repairs: Mutex<Vec<String>>,
        inputs: Mutex<Vec<String>>,
    }

    impl ScriptedExtractor {
        fn new(answers: Vec<Result<String, ExtractError>>, repairs: Vec<&str>) -> Self {
            Self {
                answers: Mutex::new(answers),
                repairs: Mutex::new(repairs.into_iter().map(String::from).collect()),
                inputs: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl StructuredExtractor for ScriptedExtractor {
        async fn extract(
            &self,
            _topic: &str,
            raw_text: &str,
            _schema: &TargetSchema,
        ) -> Result<String, ExtractError> {
            self.inputs.lock().unwrap().push(raw_text.to_string());
            self.answers.lock().unwrap().remove(0)
        }

        async fn repair(&self, _invalid: &str, _schema: &TargetSchema) -> Result<String, ExtractError> {
            let mut repairs = self.repairs.lock().unwrap();
            if repairs.is_empty() {
                return Err(ExtractError::Collaborator("no repair scripted".to_string()));
            }
            Ok(repairs.remove(0))
        }
    }

    fn engine(extractor: ScriptedExtractor, repair_attempts: usize) -> (ExtractionEngine, Arc<ScriptedExtractor>) {
        let extractor = Arc::new(extractor);
        let engine = ExtractionEngine::new(
            extractor.clone(),
            ExtractionSettings {
                repair_attempts,
                max_input_chars: 10,
            },
        );
        (engine, extractor)
    }

    #[tokio::test]
    async fn test_prose_wrapped_object_yields_record() {
        let answer = "Sure, here is what I found:\n{\"companies\": [{\"name\": \"Acme Cleaning\", \"rating\": 4.5}]}\nThanks!";
        let (engine, _) = engine(ScriptedExtractor::new(vec![Ok(answer.to_string())], vec![]), 0);

        let records = engine.extract("House Cleaning Services", "raw").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Acme Cleaning");
        assert_eq!(records[0].rating, "4.5");
    }

    #[tokio::test]
    async fn test_non_json_yields_empty_sequence() {
        let (engine, _) = engine(
            ScriptedExtractor::new(vec![Ok("No providers were mentioned.".to_string())], vec![]),
            0,
        );

        let outcome = engine.extract_detailed("Vector databases", "raw").await;
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.failure, Some(ExtractionFailure::Parse));
    }

    #[tokio::test]
    async fn test_repair_prompt_recovers_answer() {
        let (engine, _) = engine(
            ScriptedExtractor::new(
                vec![Ok("{\"companies\": [{\"name\": \"Acme\"".to_string())],
                vec!["{\"companies\": [{\"name\": \"Acme\"}]}"],
            ),
            1,
        );

        let records = engine.extract("Vector databases", "raw").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Acme");
    }

    #[tokio::test]
    async fn test_collaborator_error_is_recovered() {
        let (engine, _) = engine(
            ScriptedExtractor::new(vec![Err(ExtractError::Collaborator("boom".to_string()))], vec![]),
            1,
        );

        let outcome = engine.extract_detailed("Vector databases", "raw").await;
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.failure, Some(ExtractionFailure::Collaborator));
    }

    #[tokio::test]
    async fn test_input_is_bounded() {
        let (engine, extractor) = engine(ScriptedExtractor::new(vec![Ok("{}".to_string())], vec![]), 0);

        engine.extract("Vector databases", "0123456789abcdef").await;
        assert_eq!(extractor.inputs.lock().unwrap()[0], "0123456789");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
