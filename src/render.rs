//! Plain-terminal rendering shared by the one-shot commands and the shell.
//!
//! Every section is produced as lines of text so the shell can redraw after
//! each state change. Colour comes from the theme palette and can be turned
//! off entirely (pipes, tests).
use chrono::{DateTime, Local};
use crossterm::style::{Color, Stylize};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::api::{SummaryId, SummaryRecord, Transport};
use crate::app::{App, Theme};
use crate::history::HistoryState;
use crate::session::SessionState;
use crate::store::KeyValueStore;
use crate::upload::UploadState;

const HISTORY_WIDTH: usize = 72;

// ── Palette ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Palette {
    accent: Color,
    muted: Color,
    error: Color,
    ok: Color,
}

fn palette(theme: Theme) -> Palette {
    match theme {
        Theme::Light => Palette {
            accent: Color::DarkBlue,
            muted: Color::DarkGrey,
            error: Color::DarkRed,
            ok: Color::DarkGreen,
        },
        Theme::Dark => Palette {
            accent: Color::Cyan,
            muted: Color::Grey,
            error: Color::Red,
            ok: Color::Green,
        },
    }
}

pub struct Painter {
    palette: Palette,
    color: bool,
}

impl Painter {
    pub fn new(theme: Theme, color: bool) -> Self {
        Self {
            palette: palette(theme),
            color,
        }
    }

    pub fn plain() -> Self {
        Self::new(Theme::default(), false)
    }

    fn paint(&self, s: &str, color: Color) -> String {
        if self.color {
            s.with(color).to_string()
        } else {
            s.to_string()
        }
    }

    pub fn accent(&self, s: &str) -> String {
        self.paint(s, self.palette.accent)
    }

    pub fn muted(&self, s: &str) -> String {
        self.paint(s, self.palette.muted)
    }

    pub fn error(&self, s: &str) -> String {
        self.paint(&format!("✗ {s}"), self.palette.error)
    }

    pub fn ok(&self, s: &str) -> String {
        self.paint(&format!("✓ {s}"), self.palette.ok)
    }
}

// ── Sections ──────────────────────────────────────────────────────────────────

pub fn header<S: KeyValueStore, T: Transport>(app: &App<S, T>, p: &Painter) -> Vec<String> {
    let who = match app.session().state() {
        SessionState::Authenticated(_) => p.ok("signed in"),
        SessionState::Anonymous => p.muted("signed out"),
    };
    let theme = match app.theme() {
        Theme::Light => "light mode",
        Theme::Dark => "dark mode",
    };
    vec![format!(
        "  {}  {}  {}  {}",
        p.accent("▲ notesum"),
        p.muted(app.base_url()),
        who,
        p.muted(theme)
    )]
}

pub fn auth_section<S: KeyValueStore, T: Transport>(app: &App<S, T>, p: &Painter) -> Vec<String> {
    let session = app.session();
    let mut out = vec![format!("  {}", p.accent(&format!("[{}]", session.mode().label())))];
    if let Some(e) = session.error() {
        out.push(format!("  {}", p.error(e)));
    }
    out
}

pub fn upload_section<S: KeyValueStore, T: Transport>(app: &App<S, T>, p: &Painter) -> Vec<String> {
    let upload = app.upload();
    let mut out = Vec::new();
    let line = match upload.state() {
        UploadState::Empty => p.muted("Choose a PDF file to get a summary"),
        UploadState::FileSelected(f) | UploadState::Succeeded(f) | UploadState::Failed { file: f, .. } => {
            format!("file  {}  {}", f.name(), p.muted(&format_size(f.size())))
        }
        UploadState::Submitting(f) => format!("{}  {}", f.name(), p.accent("Summarizing...")),
    };
    out.push(format!("  {line}"));
    if let Some(e) = upload.error() {
        out.push(format!("  {}", p.error(&e)));
    }
    out
}

pub fn summary_section<S: KeyValueStore, T: Transport>(app: &App<S, T>, p: &Painter) -> Vec<String> {
    match app.active() {
        Some(active) if !active.text.is_empty() => {
            let mut out = vec![format!("  {}", p.accent("Summary"))];
            out.extend(active.text.lines().map(|l| format!("  {l}")));
            out
        }
        _ => vec![format!("  {}", p.muted("No summary generated yet."))],
    }
}

pub fn history_section<S: KeyValueStore, T: Transport>(app: &App<S, T>, p: &Painter) -> Vec<String> {
    let history = app.history();
    let selected = app.active().and_then(|a| a.source_id.as_ref());
    let mut out = vec![format!("  {}", p.accent("Summary History"))];
    match history.state() {
        HistoryState::Loading => out.push(format!("  {}", p.muted("Loading history..."))),
        HistoryState::Loaded(records) if !records.is_empty() => {
            out.extend(
                records
                    .iter()
                    .map(|r| history_line(r, selected, HISTORY_WIDTH, p)),
            );
        }
        _ => out.push(format!("  {}", p.muted("No past summaries found."))),
    }
    if let Some(e) = history.error() {
        out.push(format!("  {}", p.error(e)));
    }
    out
}

pub fn history_line(
    record: &SummaryRecord,
    selected: Option<&SummaryId>,
    width: usize,
    p: &Painter,
) -> String {
    let marker = if selected == Some(&record.id) { "▸" } else { " " };
    let id = format!("{:>5}", record.id.as_str());
    let when = format_timestamp(&record.created_at);
    let budget = width.saturating_sub(id.width() + when.width() + 6);
    let name = truncate_display(&record.filename, budget);
    format!("  {marker} {} {name} - {}", p.muted(&id), p.muted(&when))
}

pub fn footer(p: &Painter) -> String {
    let year = Local::now().format("%Y");
    p.muted(&format!("  © {year} AI-Powered Notes Summarizer"))
}

// ── Formatting helpers ────────────────────────────────────────────────────────

/// Server timestamps shown in local time; anything unparseable is shown as-is.
pub fn format_timestamp(created_at: &str) -> String {
    DateTime::parse_from_rfc3339(created_at)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| created_at.to_string())
}

/// Cut to `max` terminal columns, ending in `…` when shortened.
pub fn truncate_display(s: &str, max: usize) -> String {
    if s.width() <= max {
        return s.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

fn format_size(bytes: usize) -> String {
    match bytes {
        0..=1023 => format!("{bytes} B"),
        1024..=1_048_575 => format!("{:.1} KB", bytes as f64 / 1024.0),
        _ => format!("{:.1} MB", bytes as f64 / 1_048_576.0),
    }
}
