use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::OrderedSet;

/// Fatal planning failure. Aborts the run.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("topic is empty")]
    EmptyTopic,

    #[error("term generation failed (transient): {0}")]
    Transient(String),

    #[error("term generation failed: {0}")]
    Permanent(String),

    #[error("term generation returned no main terms for {0:?}")]
    EmptyMainTerms(String),
}

/// Terms as the generator groups them internally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermGroups {
    #[serde(default)]
    pub primary: Vec<String>,
    #[serde(default)]
    pub providers: Vec<String>,
    #[serde(default)]
    pub reviews: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchTermSet {
    pub main_terms: Vec<String>,
    pub related_terms: Vec<String>,
}

#[async_trait]
pub trait TermGenerator: Send + Sync {
    async fn generate_terms(&self, topic: &str) -> Result<TermGroups, PlanError>;
}

pub struct TermPlanner {
    generator: Arc<dyn TermGenerator>,
}

impl TermPlanner {
    pub fn new(generator: Arc<dyn TermGenerator>) -> Self {
        Self { generator }
    }

    /// Calls the generator once and flattens its groups: primary and provider
    /// terms become `main_terms`, review terms become `related_terms`.
    pub async fn plan(&self, topic: &str) -> Result<SearchTermSet, PlanError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(PlanError::EmptyTopic);
        }

        let groups = self.generator.generate_terms(topic).await.map_err(|e| {
            warn!(operation = "plan", topic, error = %e, "Term generation failed");
            e
        })?;

        let main: OrderedSet = groups
            .primary
            .iter()
            .chain(groups.providers.iter())
            .map(String::as_str)
            .collect();
        if main.is_empty() {
            return Err(PlanError::EmptyMainTerms(topic.to_string()));
        }

        let mut related: OrderedSet = groups.reviews.iter().map(String::as_str).collect();
        if related.is_empty() {
            info!(topic, "No review terms generated, using topic defaults");
            related.insert(&format!("{} reviews", topic));
            related.insert(&format!("{} comparison", topic));
        }

        let terms = SearchTermSet {
            main_terms: main.into_vec(),
            related_terms: related.into_vec(),
        };
        info!(
            main_terms = terms.main_terms.len(),
            related_terms = terms.related_terms.len(),
            "Search terms planned"
        );
        Ok(terms)
    }
}
