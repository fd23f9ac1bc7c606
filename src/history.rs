//! History workflow: the session's past summaries.
//!
//! The list is fetched wholesale and replaces whatever was there. Refresh has
//! its own in-flight flag (the `Loading` state); loading a single past
//! summary shares the submit gate, which the app enforces.
use crate::api::{ApiError, SummaryId, SummaryRecord};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HistoryState {
    #[default]
    Idle,
    Loading,
    Loaded(Vec<SummaryRecord>),
    Failed(String),
}

#[derive(Debug, Default)]
pub struct HistoryWorkflow {
    list: HistoryState,
    selecting: Option<SummaryId>,
    select_error: Option<String>,
}

impl HistoryWorkflow {
    pub fn state(&self) -> &HistoryState {
        &self.list
    }

    /// Cached records; empty unless the last refresh succeeded.
    pub fn records(&self) -> &[SummaryRecord] {
        match &self.list {
            HistoryState::Loaded(records) => records,
            _ => &[],
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.list, HistoryState::Loading)
    }

    pub fn is_selecting(&self) -> bool {
        self.selecting.is_some()
    }

    pub fn error(&self) -> Option<&str> {
        if let Some(e) = &self.select_error {
            return Some(e);
        }
        match &self.list {
            HistoryState::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn dismiss_error(&mut self) {
        self.select_error = None;
        if matches!(self.list, HistoryState::Failed(_)) {
            self.list = HistoryState::Idle;
        }
    }

    /// `false` if a refresh is already running.
    pub fn begin_refresh(&mut self) -> bool {
        if self.is_loading() {
            return false;
        }
        self.list = HistoryState::Loading;
        true
    }

    pub fn finish_refresh(&mut self, result: Result<Vec<SummaryRecord>, ApiError>) {
        self.list = match result {
            Ok(records) => {
                tracing::debug!(count = records.len(), "history loaded");
                HistoryState::Loaded(records)
            }
            Err(e) => {
                tracing::warn!(error = %e, "history refresh failed");
                HistoryState::Failed(format!("Failed to load history: {e}"))
            }
        };
    }

    /// `false` if another summary is already being fetched.
    pub fn begin_select(&mut self, id: SummaryId) -> bool {
        if self.selecting.is_some() {
            return false;
        }
        self.select_error = None;
        self.selecting = Some(id);
        true
    }

    /// Returns the id and text to display on success.
    pub fn finish_select(&mut self, result: Result<String, ApiError>) -> Option<(SummaryId, String)> {
        let Some(id) = self.selecting.take() else {
            tracing::warn!("summary arrived with no selection in flight");
            return None;
        };
        match result {
            Ok(text) => Some((id, text)),
            Err(e) => {
                tracing::warn!(%id, error = %e, "loading summary failed");
                self.select_error = Some(format!("Failed to load summary: {e}"));
                None
            }
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
