use serde::Serialize;
use tracing::info;

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Init,
    Planning,
    QueryGen,
    Retrieval,
    ExtractionMerge,
    Done,
    Failed,
}

impl PipelineState {
    /// Retrieval and extraction+merge alternate once per batch. Only planning
    /// can fail the run.
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Init, Planning)
                | (Planning, QueryGen)
                | (Planning, Failed)
                | (QueryGen, Retrieval)
                | (QueryGen, Done)
                | (Retrieval, ExtractionMerge)
                | (ExtractionMerge, Retrieval)
                | (ExtractionMerge, Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

/// Tracks the current state of one run and the path it took.
#[derive(Debug)]
pub struct StateMachine {
    current: PipelineState,
    history: Vec<PipelineState>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: PipelineState::Init,
            history: vec![PipelineState::Init],
        }
    }

    pub fn current(&self) -> PipelineState {
        self.current
    }

    pub fn advance(&mut self, next: PipelineState) -> Result<(), PipelineError> {
        if !self.current.can_transition_to(next) {
            return Err(PipelineError::IllegalTransition {
                from: self.current,
                to: next,
            });
        }
        // Per-batch alternation is too chatty for info.
        if !matches!(next, PipelineState::Retrieval | PipelineState::ExtractionMerge)
            || self.current == PipelineState::QueryGen
        {
            info!(from = ?self.current, to = ?next, "Pipeline state changed");
        }
        self.current = next;
        if !self.history.contains(&next) {
            self.history.push(next);
        }
        Ok(())
    }

    /// States visited, in first-visit order.
    pub fn into_history(self) -> Vec<PipelineState> {
        self.history
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PipelineState::*;

    #[test]
    fn test_failed_only_from_planning() {
        for state in [Init, QueryGen, Retrieval, ExtractionMerge, Done, Failed] {
            assert!(!state.can_transition_to(Failed), "{:?} -> Failed", state);
        }
        assert!(Planning.can_transition_to(Failed));
    }

    #[test]
    fn test_batches_alternate() {
        let mut machine = StateMachine::new();
        for state in [Planning, QueryGen, Retrieval, ExtractionMerge, Retrieval, ExtractionMerge, Done] {
            machine.advance(state).unwrap();
        }
        assert!(machine.current().is_terminal());
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let mut machine = StateMachine::new();
        let err = machine.advance(Retrieval).unwrap_err();
        assert!(matches!(err, PipelineError::IllegalTransition { from: Init, to: Retrieval }));
        assert_eq!(machine.current(), Init);
    }
}
