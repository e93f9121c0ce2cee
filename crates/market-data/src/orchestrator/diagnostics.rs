//! Trace of which sources a fallback walk visited and what happened.

use serde::Serialize;

/// Why a source was passed over without being called.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// Not registered under that name.
    Unknown,
    /// Missing credentials or a failed client setup.
    Unavailable { reason: String },
    /// The source's capability set lacks the operation.
    NotSupported,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum AttemptOutcome {
    Skipped(SkipReason),
    Failed(String),
    /// Answered, but with nothing where data was expected.
    Empty,
    Succeeded,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SourceAttempt {
    pub source: String,
    pub outcome: AttemptOutcome,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct FailoverDiagnostics {
    pub attempts: Vec<SourceAttempt>,
}

impl FailoverDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, source: &str, outcome: AttemptOutcome) {
        self.attempts.push(SourceAttempt {
            source: source.to_string(),
            outcome,
        });
    }

    pub fn record_skip(&mut self, source: &str, reason: SkipReason) {
        self.push(source, AttemptOutcome::Skipped(reason));
    }

    pub fn record_error(&mut self, source: &str, error: String) {
        self.push(source, AttemptOutcome::Failed(error));
    }

    pub fn record_empty(&mut self, source: &str) {
        self.push(source, AttemptOutcome::Empty);
    }

    pub fn record_success(&mut self, source: &str) {
        self.push(source, AttemptOutcome::Succeeded);
    }

    /// Sources actually called, skipped ones excluded.
    pub fn called(&self) -> Vec<String> {
        self.attempts
            .iter()
            .filter(|a| !matches!(a.outcome, AttemptOutcome::Skipped(_)))
            .map(|a| a.source.clone())
            .collect()
    }

    /// Whether any called source answered without error.
    pub fn any_answered(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| matches!(a.outcome, AttemptOutcome::Succeeded | AttemptOutcome::Empty))
    }

    pub fn last_error(&self) -> Option<&str> {
        self.attempts.iter().rev().find_map(|a| match &a.outcome {
            AttemptOutcome::Failed(e) => Some(e.as_str()),
            _ => None,
        })
    }

    /// One line for logging, e.g. `yahoo: ERROR (...) -> polygon: SUCCESS`.
    pub fn summary(&self) -> String {
        self.attempts
            .iter()
            .map(|a| match &a.outcome {
                AttemptOutcome::Succeeded => format!("{}: SUCCESS", a.source),
                AttemptOutcome::Empty => format!("{}: EMPTY", a.source),
                AttemptOutcome::Skipped(reason) => format!("{}: SKIPPED ({:?})", a.source, reason),
                AttemptOutcome::Failed(e) => format!("{}: ERROR ({})", a.source, e),
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}
