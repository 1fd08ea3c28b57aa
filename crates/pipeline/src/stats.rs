use extract::{ExtractionFailure, ExtractionOutcome};
use merge::MergeOutcome;
use retrieval::{RetrievalStatus, Retrieved};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Counters and stage timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub queries_planned: usize,
    pub queries_issued: usize,
    pub queries_succeeded: usize,
    pub queries_empty: usize,
    /// Calls answered with a rate-limit signal.
    pub rate_limited_calls: u32,
    /// Calls re-issued after a rate-limit signal.
    pub rate_limit_retries: u32,

    pub records_extracted: usize,
    pub records_dropped: usize,
    pub parse_failures: usize,
    pub extraction_failures: usize,

    pub entities_inserted: usize,
    pub entities_updated: usize,

    // Timing (in milliseconds)
    pub planning_ms: u64,
    pub retrieval_ms: u64,
    pub extraction_merge_ms: u64,
    pub total_ms: u64,
}

impl RunStats {
    pub fn record_retrieval(&mut self, retrieved: &[Retrieved]) {
        for item in retrieved {
            if item.attempts > 0 {
                self.queries_issued += 1;
            }
            // The last signal of an exhausted or timed-out query is not retried.
            self.rate_limited_calls += item.rate_limited;
            self.rate_limit_retries += item.rate_limited.min(item.attempts.saturating_sub(1));
            match item.status {
                RetrievalStatus::Found => self.queries_succeeded += 1,
                _ => self.queries_empty += 1,
            }
        }
    }

    pub fn record_extraction(&mut self, outcome: &ExtractionOutcome) {
        self.records_extracted += outcome.records.len();
        self.records_dropped += outcome.dropped;
        match outcome.failure {
            Some(ExtractionFailure::Parse) => self.parse_failures += 1,
            Some(ExtractionFailure::Collaborator | ExtractionFailure::TimedOut) => {
                self.extraction_failures += 1
            }
            None => {}
        }
    }

    pub fn record_merge(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Inserted => self.entities_inserted += 1,
            MergeOutcome::Updated => self.entities_updated += 1,
            MergeOutcome::Unchanged => {}
        }
    }
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrieval::RawResult;

    fn retrieved(status: RetrievalStatus, attempts: u32, rate_limited: u32) -> Retrieved {
        Retrieved {
            query: "q".to_string(),
            result: (status == RetrievalStatus::Found).then(|| RawResult::new("hits")),
            status,
            attempts,
            rate_limited,
        }
    }

    #[test]
    fn test_retrieval_counts() {
        let mut stats = RunStats::default();
        stats.record_retrieval(&[
            // Recovered after one signal.
            retrieved(RetrievalStatus::Found, 2, 1),
            // Still limited after three retries.
            retrieved(RetrievalStatus::Failed, 4, 4),
            // Deadline hit during the second backoff.
            retrieved(RetrievalStatus::TimedOut, 2, 2),
            retrieved(RetrievalStatus::TimedOut, 0, 0),
            retrieved(RetrievalStatus::Failed, 1, 0),
        ]);

        assert_eq!(stats.queries_issued, 4);
        assert_eq!(stats.queries_succeeded, 1);
        assert_eq!(stats.queries_empty, 4);
        assert_eq!(stats.rate_limited_calls, 7);
        assert_eq!(stats.rate_limit_retries, 5);
    }

    #[test]
    fn test_extraction_failures_split_by_kind() {
        let mut stats = RunStats::default();
        stats.record_extraction(&ExtractionOutcome::failed(ExtractionFailure::Parse));
        stats.record_extraction(&ExtractionOutcome::failed(ExtractionFailure::TimedOut));

        assert_eq!(stats.parse_failures, 1);
        assert_eq!(stats.extraction_failures, 1);
        assert_eq!(stats.records_extracted, 0);
    }
}
