//! Composition root.
//!
//! `App` owns every piece of client state: the session, both workflows, the
//! summary on display and the theme flag. Workflows only move their own state
//! machines; the app applies their outcomes, wires session changes to resets
//! and history reloads, and enforces the gate shared by submit and select.
use serde::{Deserialize, Serialize};

use crate::api::{ApiClient, FilePart, SummaryId, Transport};
use crate::error::{AuthError, ValidationError};
use crate::history::HistoryWorkflow;
use crate::session::{Credentials, SessionController};
use crate::store::{KeyValueStore, TokenStore};
use crate::upload::{Artifact, UploadWorkflow};

/// The summary currently on display. `source_id` is set when it came from
/// history, so the matching history row can be highlighted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSummary {
    pub text: String,
    pub source_id: Option<SummaryId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Where an upload goes: stored in history, or summarized and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    History,
    Preview,
}

pub struct App<S, T> {
    api: ApiClient<T>,
    session: SessionController<S>,
    upload: UploadWorkflow,
    history: HistoryWorkflow,
    active: Option<ActiveSummary>,
    theme: Theme,
}

impl<S: KeyValueStore, T: Transport> App<S, T> {
    pub fn new(api: ApiClient<T>, store: TokenStore<S>, theme: Theme) -> Self {
        Self {
            api,
            session: SessionController::new(store),
            upload: UploadWorkflow::default(),
            history: HistoryWorkflow::default(),
            active: None,
            theme,
        }
    }

    // ── Read side ─────────────────────────────────────────────────────────────

    pub fn session(&self) -> &SessionController<S> {
        &self.session
    }

    pub fn upload(&self) -> &UploadWorkflow {
        &self.upload
    }

    pub fn history(&self) -> &HistoryWorkflow {
        &self.history
    }

    pub fn active(&self) -> Option<&ActiveSummary> {
        self.active.as_ref()
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn base_url(&self) -> &str {
        self.api.base_url()
    }

    /// Submit or history selection in flight.
    pub fn is_busy(&self) -> bool {
        self.upload.is_submitting() || self.history.is_selecting()
    }

    // ── Session ───────────────────────────────────────────────────────────────

    /// Load history for a session restored from storage.
    pub async fn start(&mut self) {
        if self.session.is_authenticated() {
            self.refresh_history().await;
        }
    }

    pub async fn login(&mut self, credentials: &Credentials) -> Result<(), AuthError> {
        self.session.login(&self.api, credentials).await?;
        self.on_session_changed().await;
        Ok(())
    }

    pub async fn register(&mut self, credentials: &Credentials) -> Result<(), AuthError> {
        self.session.register(&self.api, credentials).await?;
        self.on_session_changed().await;
        Ok(())
    }

    pub async fn logout(&mut self) {
        self.session.logout();
        self.on_session_changed().await;
    }

    pub fn toggle_auth_mode(&mut self) {
        self.session.toggle_mode();
    }

    async fn on_session_changed(&mut self) {
        if self.session.is_authenticated() {
            self.history.dismiss_error();
            self.refresh_history().await;
        } else {
            self.upload.reset();
            self.history.clear();
            self.active = None;
        }
    }

    // ── Upload ────────────────────────────────────────────────────────────────

    /// Ignored while a request holds the shared gate.
    pub fn select_file(&mut self, file: FilePart) -> Result<(), ValidationError> {
        if self.is_busy() {
            tracing::debug!("file selection ignored while busy");
            return Ok(());
        }
        self.upload.select_file(file)?;
        self.active = None;
        Ok(())
    }

    pub async fn submit(&mut self) {
        self.submit_to(Destination::History).await;
    }

    pub async fn submit_to(&mut self, destination: Destination) {
        if self.history.is_selecting() {
            return;
        }
        let Some(file) = self.upload.begin_submit() else {
            return;
        };
        let token = self.session.access_token();
        let result = match destination {
            Destination::History => self.api.summarize(&file, token).await,
            Destination::Preview => self.api.preview(&file, token).await,
        };
        let Some(text) = self.upload.finish_submit(result.map(|s| s.summary)) else {
            return;
        };
        self.active = Some(ActiveSummary {
            text,
            source_id: None,
        });
        if destination == Destination::History {
            self.refresh_history().await;
        }
    }

    pub fn download(&self) -> Option<Artifact> {
        self.active
            .as_ref()
            .and_then(|a| Artifact::from_summary(&a.text))
    }

    // ── History ───────────────────────────────────────────────────────────────

    /// Anonymous sessions have no history; the list is cleared instead.
    pub async fn refresh_history(&mut self) {
        if !self.session.is_authenticated() {
            self.history.clear();
            return;
        }
        if !self.history.begin_refresh() {
            return;
        }
        let result = self.api.list_summaries(self.session.access_token()).await;
        self.history.finish_refresh(result);
    }

    /// No-op when anonymous or while a submit holds the shared gate.
    pub async fn select_summary(&mut self, id: SummaryId) {
        if !self.session.is_authenticated() || self.upload.is_submitting() {
            return;
        }
        if !self.history.begin_select(id.clone()) {
            return;
        }
        let result = self
            .api
            .get_summary(&id, self.session.access_token())
            .await
            .map(|d| d.summary);
        if let Some((source_id, text)) = self.history.finish_select(result) {
            self.active = Some(ActiveSummary {
                text,
                source_id: Some(source_id),
            });
        }
    }

    // ── Misc ──────────────────────────────────────────────────────────────────

    pub fn dismiss_errors(&mut self) {
        self.session.dismiss_error();
        self.upload.dismiss_error();
        self.history.dismiss_error();
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
    }
}
