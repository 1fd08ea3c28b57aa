use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::SearchError;
use crate::retry::{BackoffPolicy, Sleeper};
use crate::{RawResult, SearchProvider};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Queries per batch; also the cap on concurrent search calls.
    pub batch_size: usize,
    pub batch_cooldown_secs: u64,
    /// Upper bound on the whole retrieval stage. `None` disables it.
    pub stage_timeout_secs: Option<u64>,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            batch_size: 2,
            batch_cooldown_secs: 5,
            stage_timeout_secs: Some(900),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStatus {
    Found,
    /// The provider answered but had nothing for this query.
    NoHits,
    /// Non rate-limit error, or still rate limited after all retries.
    Failed,
    /// The stage deadline passed before the call completed.
    TimedOut,
}

/// One query and what came back for it. `result` is `None` unless `status`
/// is `Found`.
#[derive(Debug, Clone)]
pub struct Retrieved {
    pub query: String,
    pub result: Option<RawResult>,
    pub status: RetrievalStatus,
    pub attempts: u32,
    pub rate_limited: u32,
}

impl Retrieved {
    fn empty(query: &str, status: RetrievalStatus, attempts: u32, rate_limited: u32) -> Self {
        Self {
            query: query.to_string(),
            result: None,
            status,
            attempts,
            rate_limited,
        }
    }
}

/// Issues queries in fixed-size batches with backoff per call and a cooldown
/// between batches. A single query's failure never fails the batch.
pub struct RetrievalExecutor {
    provider: Arc<dyn SearchProvider>,
    policy: BackoffPolicy,
    sleeper: Arc<dyn Sleeper>,
    settings: RetrievalSettings,
}

impl RetrievalExecutor {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        policy: BackoffPolicy,
        sleeper: Arc<dyn Sleeper>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            provider,
            policy,
            sleeper,
            settings,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.settings.batch_size.max(1)
    }

    /// Deadline for a stage starting now. A timeout too large to represent
    /// means no deadline.
    pub fn stage_deadline(&self) -> Option<Instant> {
        self.settings
            .stage_timeout_secs
            .and_then(|secs| Instant::now().checked_add(Duration::from_secs(secs)))
    }

    /// Splits `queries` into the batches [`retrieve`](Self::retrieve) issues.
    pub fn batches<'q>(&self, queries: &'q [String]) -> std::slice::Chunks<'q, String> {
        queries.chunks(self.batch_size())
    }

    /// All queries, batch by batch, with a cooldown between batches.
    pub async fn retrieve(&self, queries: &[String]) -> Vec<Retrieved> {
        let deadline = self.stage_deadline();
        let batches = self.batches(queries);
        let batch_count = batches.len();
        let mut retrieved = Vec::with_capacity(queries.len());

        for (index, batch) in batches.enumerate() {
            retrieved.extend(self.retrieve_batch(batch, deadline).await);
            self.cooldown_after(index, batch_count).await;
        }

        retrieved
    }

    /// Runs one batch concurrently and waits for every call to resolve.
    pub async fn retrieve_batch(&self, batch: &[String], deadline: Option<Instant>) -> Vec<Retrieved> {
        debug!(size = batch.len(), "Issuing search batch");
        join_all(batch.iter().map(|query| self.retrieve_one(query, deadline))).await
    }

    /// Cools down after batch `index` of `batch_count`, except after the last.
    pub async fn cooldown_after(&self, index: usize, batch_count: usize) {
        if index + 1 < batch_count {
            self.cooldown().await;
        }
    }

    async fn cooldown(&self) {
        let cooldown = Duration::from_secs(self.settings.batch_cooldown_secs);
        if !cooldown.is_zero() {
            debug!(cooldown_secs = self.settings.batch_cooldown_secs, "Batch cooldown");
            self.sleeper.sleep(cooldown).await;
        }
    }

    async fn retrieve_one(&self, query: &str, deadline: Option<Instant>) -> Retrieved {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            warn!(query, "Retrieval stage deadline passed, skipping query");
            return Retrieved::empty(query, RetrievalStatus::TimedOut, 0, 0);
        }

        let attempted = self
            .policy
            .retry("search", self.sleeper.as_ref(), deadline, || self.provider.search(query))
            .await;

        match attempted.result {
            Ok(raw) if raw.is_empty() => {
                info!(query, "Search returned no hits");
                Retrieved::empty(query, RetrievalStatus::NoHits, attempted.attempts, attempted.rate_limited)
            }
            Ok(raw) => Retrieved {
                query: query.to_string(),
                result: Some(raw),
                status: RetrievalStatus::Found,
                attempts: attempted.attempts,
                rate_limited: attempted.rate_limited,
            },
            Err(SearchError::DeadlineExceeded) => {
                warn!(query, attempts = attempted.attempts, "Search call timed out");
                Retrieved::empty(query, RetrievalStatus::TimedOut, attempted.attempts, attempted.rate_limited)
            }
            Err(e) => {
                warn!(query, error = %e, "Search failed, continuing with empty result");
                Retrieved::empty(query, RetrievalStatus::Failed, attempted.attempts, attempted.rate_limited)
            }
        }
    }
}
