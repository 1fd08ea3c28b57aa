use anyhow::{Context, Result};
use std::path::PathBuf;

/// Endpoints, models and secrets for the outside services.
#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    /// Cheap model used for term planning.
    pub fast_llm_model: String,
    /// Model used for extraction over long search results.
    pub long_context_model: String,
    pub tavily_api_key: String,
    pub reports_dir: PathBuf,
    pub bind_addr: String,
}

impl Settings {
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str, default: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            openai_api_key: lookup("OPENAI_API_KEY").filter(|v| !v.trim().is_empty()),
            openai_base_url: var("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            fast_llm_model: var("FAST_LLM_MODEL", "gpt-3.5-turbo-0125"),
            long_context_model: var("LONG_CONTEXT_MODEL", "gpt-4-turbo-preview"),
            tavily_api_key: lookup("TAVILY_API_KEY")
                .filter(|v| !v.trim().is_empty())
                .context("TAVILY_API_KEY must be set")?,
            reports_dir: PathBuf::from(var("REPORTS_DIR", "reports")),
            bind_addr: var("BIND_ADDR", "0.0.0.0:3000"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_gaps() {
        let settings = Settings::from_lookup(|name| match name {
            "TAVILY_API_KEY" => Some("tvly-test".to_string()),
            "FAST_LLM_MODEL" => Some("gpt-4o-mini".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(settings.fast_llm_model, "gpt-4o-mini");
        assert_eq!(settings.long_context_model, "gpt-4-turbo-preview");
        assert_eq!(settings.openai_base_url, "https://api.openai.com/v1");
        assert_eq!(settings.reports_dir, PathBuf::from("reports"));
        assert!(settings.openai_api_key.is_none());
    }

    #[test]
    fn test_search_key_required() {
        assert!(Settings::from_lookup(|_| None).is_err());
    }
}
