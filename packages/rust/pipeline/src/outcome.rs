//! Per-item outcomes and the state they are aggregated into.

/// Result of handling one work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<S, F> {
    /// Nothing to record (placeholder or filtered item).
    Skip,
    Processed(ItemReport<S, F>),
}

impl<S, F> Outcome<S, F> {
    /// Shorthand for a processed item that failed with `message`.
    pub fn failed(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Processed(ItemReport::failed(id, message))
    }
}

impl<S, F> From<ItemReport<S, F>> for Outcome<S, F> {
    fn from(report: ItemReport<S, F>) -> Self {
        Self::Processed(report)
    }
}

/// What happened to one processed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport<S, F> {
    pub id: String,
    /// The item was changed (and persisted).
    pub modified: bool,
    pub error: Option<String>,
    pub success: Option<S>,
    pub failure: Option<F>,
}

impl<S, F> ItemReport<S, F> {
    /// The item was already consistent.
    pub fn unchanged(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            modified: false,
            error: None,
            success: None,
            failure: None,
        }
    }

    /// The item was changed.
    pub fn modified(id: impl Into<String>) -> Self {
        Self {
            modified: true,
            ..Self::unchanged(id)
        }
    }

    /// Processing failed.
    pub fn failed(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::unchanged(id).with_error(message)
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    pub fn with_success(mut self, payload: S) -> Self {
        self.success = Some(payload);
        self
    }

    pub fn with_failure(mut self, payload: F) -> Self {
        self.failure = Some(payload);
        self
    }
}

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// Outcomes aggregated over one run, in completion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineState<S, F> {
    /// Ids of modified items.
    pub modified: Vec<String>,
    /// `(id, message)` for every failed item.
    pub errors: Vec<(String, String)>,
    pub successes: Vec<(String, S)>,
    pub failures: Vec<(String, F)>,
    /// Items that produced a non-skip outcome.
    pub processed: usize,
    /// Items taken off the queue and acknowledged, skips included.
    pub acknowledged: usize,
}

// Manual impl: a derive would require `S: Default` and `F: Default`.
impl<S, F> Default for PipelineState<S, F> {
    fn default() -> Self {
        Self {
            modified: Vec::new(),
            errors: Vec::new(),
            successes: Vec::new(),
            failures: Vec::new(),
            processed: 0,
            acknowledged: 0,
        }
    }
}

impl<S, F> PipelineState<S, F> {
    /// Fold one outcome into the aggregate lists.
    pub(crate) fn record(&mut self, outcome: Outcome<S, F>) {
        let Outcome::Processed(report) = outcome else {
            return;
        };
        self.processed += 1;

        let ItemReport {
            id,
            modified,
            error,
            success,
            failure,
        } = report;
        if let Some(payload) = success {
            self.successes.push((id.clone(), payload));
        }
        if let Some(payload) = failure {
            self.failures.push((id.clone(), payload));
        }
        if let Some(message) = error {
            self.errors.push((id.clone(), message));
        }
        if modified {
            self.modified.push(id);
        }
    }

    /// Total entries across the four aggregate lists.
    pub fn recorded_entries(&self) -> usize {
        self.modified.len() + self.errors.len() + self.successes.len() + self.failures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type State = PipelineState<u32, Vec<String>>;

    #[test]
    fn skip_is_not_recorded() {
        let mut state = State::default();
        state.record(Outcome::Skip);
        assert_eq!(state, State::default());
    }

    #[test]
    fn report_fields_go_to_matching_lists() {
        let mut state = State::default();
        state.record(
            ItemReport::modified("a")
                .with_success(3)
                .with_error("albums failed")
                .with_failure(vec!["X (album)".to_string()])
                .into(),
        );
        state.record(ItemReport::unchanged("b").into());
        state.record(Outcome::failed("c", "boom"));

        assert_eq!(state.modified, ["a"]);
        assert_eq!(state.successes, [("a".to_string(), 3)]);
        assert_eq!(
            state.errors,
            [
                ("a".to_string(), "albums failed".to_string()),
                ("c".to_string(), "boom".to_string())
            ]
        );
        assert_eq!(state.failures.len(), 1);
        assert_eq!(state.processed, 3);
        assert_eq!(state.recorded_entries(), 5);
    }
}
