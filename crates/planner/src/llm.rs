use async_trait::async_trait;
use extract::{ChatClient, LlmError};
use serde_json::Value;

use crate::prompt;
use crate::terms::{PlanError, TermGenerator, TermGroups};

/// Term generator backed by a chat model.
pub struct LlmTermGenerator {
    client: ChatClient,
}

impl LlmTermGenerator {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TermGenerator for LlmTermGenerator {
    async fn generate_terms(&self, topic: &str) -> Result<TermGroups, PlanError> {
        let answer = self
            .client
            .generate(prompt::TERMS_SYSTEM_PROMPT, &prompt::build_terms_prompt(topic))
            .await
            .map_err(classify_llm_error)?;

        let value = extract::parse_json_object(&answer)
            .map_err(|e| PlanError::Permanent(format!("unparseable terms: {}", e)))?;

        Ok(term_groups_from_value(&value))
    }
}

fn classify_llm_error(err: LlmError) -> PlanError {
    match &err {
        LlmError::RateLimited { .. } | LlmError::Request(_) => PlanError::Transient(err.to_string()),
        LlmError::Status { status, .. } if *status >= 500 => PlanError::Transient(err.to_string()),
        _ => PlanError::Permanent(err.to_string()),
    }
}

/// Accepts both the three-group shape and a flat `main_terms`/`related_terms`
/// answer.
pub fn term_groups_from_value(value: &Value) -> TermGroups {
    let list = |keys: &[&str]| -> Vec<String> {
        keys.iter()
            .filter_map(|key| value.get(*key))
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    };

    TermGroups {
        primary: list(&["primary_terms", "primary", "main_terms"]),
        providers: list(&["provider_terms", "providers", "platform_terms"]),
        reviews: list(&["review_terms", "reviews", "related_terms"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_flat_shape_is_accepted() {
        let groups = term_groups_from_value(&json!({
            "main_terms": ["maid service", " "],
            "related_terms": ["maid reviews"]
        }));
        assert_eq!(groups.primary, vec!["maid service"]);
        assert!(groups.providers.is_empty());
        assert_eq!(groups.reviews, vec!["maid reviews"]);
    }

    #[tokio::test]
    async fn test_generate_terms_from_chat_answer() {
        let server = MockServer::start().await;
        let content = "```json\n{\"primary_terms\": [\"house cleaning Charlotte\"], \"provider_terms\": [\"Molly Maid\"], \"review_terms\": [\"cleaning reviews\"]}\n```";
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": content}}]
            })))
            .mount(&server)
            .await;

        let generator = LlmTermGenerator::new(ChatClient::new(server.uri(), "gpt-test".into(), None));
        let groups = generator.generate_terms("House Cleaning Services in Charlotte, NC").await.unwrap();

        assert_eq!(groups.primary, vec!["house cleaning Charlotte"]);
        assert_eq!(groups.providers, vec!["Molly Maid"]);
        assert_eq!(groups.reviews, vec!["cleaning reviews"]);
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let generator = LlmTermGenerator::new(ChatClient::new(server.uri(), "gpt-test".into(), None));
        let err = generator.generate_terms("Vector databases").await.unwrap_err();
        assert!(matches!(err, PlanError::Transient(_)));
    }
}
