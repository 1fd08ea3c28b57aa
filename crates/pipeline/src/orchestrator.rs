use extract::{
    EntityRecord, ExtractionEngine, ExtractionFailure, ExtractionOutcome, StructuredExtractor,
};
use futures::future::join_all;
use merge::EntityMerger;
use planner::{QueryGenerator, TermGenerator, TermPlanner};
use retrieval::{RetrievalExecutor, Retrieved, SearchProvider, Sleeper, TokioSleeper};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::export::ExportSink;
use crate::state::{PipelineState, StateMachine};
use crate::stats::{RunStats, TimedOperation};

/// External services one run depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub terms: Arc<dyn TermGenerator>,
    pub search: Arc<dyn SearchProvider>,
    pub extractor: Arc<dyn StructuredExtractor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// Every query or extraction came back empty.
    Empty,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub topic: String,
    pub status: RunStatus,
    /// Canonical entities in first-seen order.
    pub entities: Vec<EntityRecord>,
    /// Where the export sink put the entities, if they were exported.
    pub location: Option<String>,
    pub stats: RunStats,
    pub states: Vec<PipelineState>,
}

/// Sequences planning, query generation, retrieval and extraction+merge for
/// one topic. Retrieval and extraction are interleaved per batch; the entity
/// map is only written from this task.
pub struct Pipeline {
    planner: TermPlanner,
    queries: QueryGenerator,
    retrieval: RetrievalExecutor,
    extraction: ExtractionEngine,
    extraction_timeout: Option<Duration>,
}

impl Pipeline {
    pub fn new(collaborators: Collaborators, config: &PipelineConfig) -> Result<Self, PipelineError> {
        Self::with_sleeper(collaborators, config, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(
        collaborators: Collaborators,
        config: &PipelineConfig,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        Ok(Self {
            planner: TermPlanner::new(collaborators.terms),
            queries: QueryGenerator::new(config.query_budget),
            retrieval: RetrievalExecutor::new(
                collaborators.search,
                config.retry.policy(),
                sleeper,
                config.retrieval.clone(),
            ),
            extraction: ExtractionEngine::new(collaborators.extractor, config.extraction.settings()),
            extraction_timeout: config.extraction.stage_timeout(),
        })
    }

    pub async fn run(&self, topic: &str) -> Result<RunOutcome, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("research_run", %run_id, topic);
        self.execute(run_id, topic).instrument(span).await
    }

    /// Runs the pipeline and hands a non-empty result to `sink`.
    pub async fn run_and_export(
        &self,
        topic: &str,
        sink: &dyn ExportSink,
    ) -> Result<RunOutcome, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("research_run", %run_id, topic);
        self.execute_and_export(run_id, topic, sink).instrument(span).await
    }

    async fn execute_and_export(
        &self,
        run_id: Uuid,
        topic: &str,
        sink: &dyn ExportSink,
    ) -> Result<RunOutcome, PipelineError> {
        let mut outcome = self.execute(run_id, topic).await?;
        if outcome.status == RunStatus::Empty {
            warn!("Skipping export for empty result set");
            return Ok(outcome);
        }

        let location = sink.export(&outcome.entities).await?;
        info!(location = %location, "Entities exported");
        outcome.location = Some(location);
        Ok(outcome)
    }

    async fn execute(&self, run_id: Uuid, topic: &str) -> Result<RunOutcome, PipelineError> {
        let run_timer = TimedOperation::start();
        let mut machine = StateMachine::new();
        let mut stats = RunStats::default();

        machine.advance(PipelineState::Planning)?;
        let timer = TimedOperation::start();
        let terms = match self.planner.plan(topic).await {
            Ok(terms) => terms,
            Err(e) => {
                error!(error = %e, "Planning failed, aborting run");
                machine.advance(PipelineState::Failed)?;
                return Err(PipelineError::Planning(e));
            }
        };
        stats.planning_ms = timer.elapsed_ms();

        machine.advance(PipelineState::QueryGen)?;
        let queries = self.queries.generate(topic, &terms);
        stats.queries_planned = queries.len();
        info!(
            main_terms = terms.main_terms.len(),
            related_terms = terms.related_terms.len(),
            queries = queries.len(),
            "Queries generated"
        );

        let mut merger = EntityMerger::new();
        let retrieval_deadline = self.retrieval.stage_deadline();
        let extraction_deadline = self
            .extraction_timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));
        let batches = self.retrieval.batches(&queries);
        let batch_count = batches.len();

        for (index, batch) in batches.enumerate() {
            machine.advance(PipelineState::Retrieval)?;
            let timer = TimedOperation::start();
            let retrieved = self.retrieval.retrieve_batch(batch, retrieval_deadline).await;
            stats.record_retrieval(&retrieved);
            stats.retrieval_ms += timer.elapsed_ms();

            machine.advance(PipelineState::ExtractionMerge)?;
            let timer = TimedOperation::start();
            for outcome in self.extract_batch(topic, &retrieved, extraction_deadline).await {
                stats.record_extraction(&outcome);
                for record in outcome.records {
                    stats.record_merge(merger.absorb(record));
                }
            }
            stats.extraction_merge_ms += timer.elapsed_ms();

            info!(
                batch = index + 1,
                batches = batch_count,
                entities = merger.len(),
                "Batch processed"
            );

            self.retrieval.cooldown_after(index, batch_count).await;
        }

        machine.advance(PipelineState::Done)?;
        let entities = merger.into_entities();
        stats.total_ms = run_timer.elapsed_ms();

        let status = if entities.is_empty() {
            warn!(
                queries = stats.queries_planned,
                succeeded = stats.queries_succeeded,
                "Run produced no entities"
            );
            RunStatus::Empty
        } else {
            info!(entities = entities.len(), total_ms = stats.total_ms, "Run complete");
            RunStatus::Completed
        };

        Ok(RunOutcome {
            run_id,
            topic: topic.to_string(),
            status,
            entities,
            location: None,
            stats,
            states: machine.into_history(),
        })
    }

    /// Extracts every non-empty result of one batch concurrently and waits for
    /// all of them. Results with no hits never reach the extractor.
    async fn extract_batch(
        &self,
        topic: &str,
        retrieved: &[Retrieved],
        deadline: Option<Instant>,
    ) -> Vec<ExtractionOutcome> {
        let jobs = retrieved
            .iter()
            .filter_map(|item| item.result.as_ref().map(|raw| (item.query.as_str(), raw)))
            .map(|(query, raw)| async move {
                let call = self.extraction.extract_detailed(topic, &raw.text);
                match deadline {
                    Some(deadline) => match tokio::time::timeout_at(deadline, call).await {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            warn!(query, "Extraction timed out, treating result as empty");
                            ExtractionOutcome::failed(ExtractionFailure::TimedOut)
                        }
                    },
                    None => call.await,
                }
            });

        join_all(jobs).await
    }
}
