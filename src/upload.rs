//! Upload/summarize workflow.
//!
//! Empty → FileSelected → Submitting → Succeeded | Failed. The file stays
//! attached after a submit so it can be sent again; choosing a new file
//! starts over from FileSelected.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::api::{ApiError, FilePart};
use crate::error::ValidationError;

pub const PDF_MIME: &str = "application/pdf";
pub const ARTIFACT_NAME: &str = "summary.txt";

// ── Pending upload ────────────────────────────────────────────────────────────

/// A file whose declared type is PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload(FilePart);

impl PendingUpload {
    pub fn new(file: FilePart) -> Result<Self, ValidationError> {
        if file.mime != PDF_MIME {
            return Err(ValidationError::NotPdf);
        }
        Ok(Self(file))
    }

    pub fn name(&self) -> &str {
        &self.0.file_name
    }

    pub fn size(&self) -> usize {
        self.0.bytes.len()
    }

    pub fn part(&self) -> &FilePart {
        &self.0
    }
}

/// Read a local file, declaring its type from the extension unless `mime`
/// overrides it. Nothing is validated here; that happens on selection.
pub fn read_file(path: &Path, mime: Option<&str>) -> Result<FilePart> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    Ok(FilePart {
        mime: mime.map_or_else(|| declared_mime(path).to_string(), str::to_string),
        file_name,
        bytes,
    })
}

pub fn declared_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("pdf") => PDF_MIME,
        Some("txt") => "text/plain",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

// ── State ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadState {
    #[default]
    Empty,
    FileSelected(PendingUpload),
    Submitting(PendingUpload),
    Succeeded(PendingUpload),
    Failed { file: PendingUpload, message: String },
}

impl UploadState {
    pub fn file(&self) -> Option<&PendingUpload> {
        match self {
            UploadState::Empty => None,
            UploadState::FileSelected(f)
            | UploadState::Submitting(f)
            | UploadState::Succeeded(f)
            | UploadState::Failed { file: f, .. } => Some(f),
        }
    }
}

#[derive(Debug, Default)]
pub struct UploadWorkflow {
    state: UploadState,
    /// Last rejected selection; the state doesn't move on rejection.
    rejected: Option<ValidationError>,
}

impl UploadWorkflow {
    pub fn state(&self) -> &UploadState {
        &self.state
    }

    pub fn pending(&self) -> Option<&PendingUpload> {
        self.state.file()
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.state, UploadState::Submitting(_))
    }

    pub fn error(&self) -> Option<String> {
        if let Some(e) = &self.rejected {
            return Some(e.to_string());
        }
        match &self.state {
            UploadState::Failed { message, .. } => Some(message.clone()),
            _ => None,
        }
    }

    pub fn dismiss_error(&mut self) {
        self.rejected = None;
        if let UploadState::Failed { file, .. } = &self.state {
            self.state = UploadState::FileSelected(file.clone());
        }
    }

    /// Store a new PDF, discarding the previous one. A non-PDF is rejected
    /// and the current file (if any) stays.
    pub fn select_file(&mut self, file: FilePart) -> Result<(), ValidationError> {
        self.rejected = None;
        match PendingUpload::new(file) {
            Ok(upload) => {
                tracing::debug!(file = upload.name(), bytes = upload.size(), "file selected");
                self.state = UploadState::FileSelected(upload);
                Ok(())
            }
            Err(e) => {
                self.rejected = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Enter `Submitting` and hand back the file to send. `None` when there is
    /// nothing to send or a submit is already in flight.
    pub fn begin_submit(&mut self) -> Option<FilePart> {
        let file = match std::mem::take(&mut self.state) {
            UploadState::FileSelected(f)
            | UploadState::Succeeded(f)
            | UploadState::Failed { file: f, .. } => f,
            other => {
                self.state = other;
                return None;
            }
        };
        self.rejected = None;
        let part = file.part().clone();
        self.state = UploadState::Submitting(file);
        Some(part)
    }

    /// Apply the upload result. Returns the summary text on success.
    pub fn finish_submit(&mut self, result: Result<String, ApiError>) -> Option<String> {
        let UploadState::Submitting(file) = std::mem::take(&mut self.state) else {
            tracing::warn!("submit result arrived with no submit in flight");
            return None;
        };
        match result {
            Ok(summary) => {
                self.state = UploadState::Succeeded(file);
                Some(summary)
            }
            Err(e) => {
                tracing::warn!(file = file.name(), error = %e, "summarize failed");
                self.state = UploadState::Failed {
                    file,
                    message: format!("Error: {e}"),
                };
                None
            }
        }
    }

    pub fn reset(&mut self) {
        self.state = UploadState::Empty;
        self.rejected = None;
    }
}

// ── Artifact ──────────────────────────────────────────────────────────────────

/// Plain-text download of the current summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: &'static str,
    pub mime: &'static str,
    pub contents: String,
}

impl Artifact {
    /// `None` when there is no summary text to save.
    pub fn from_summary(text: &str) -> Option<Self> {
        if text.is_empty() {
            return None;
        }
        Some(Self {
            file_name: ARTIFACT_NAME,
            mime: "text/plain",
            contents: text.to_string(),
        })
    }

    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(self.file_name);
        std::fs::write(&path, &self.contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}
