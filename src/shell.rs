//! Interactive shell: a line-oriented front end that drives `App` directly
//! and redraws the affected sections after every command.
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::api::{SummaryId, Transport};
use crate::app::{App, Destination};
use crate::render::{self, Painter};
use crate::session::{AuthMode, Credentials};
use crate::store::KeyValueStore;
use crate::upload;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Log in or register, depending on the current form mode
    Auth { username: String, password: String },
    Mode,
    File(PathBuf),
    Submit,
    Preview,
    History,
    Open(String),
    Download(PathBuf),
    Theme,
    Status,
    Dismiss,
    Logout,
    Help,
    Quit,
}

pub fn parse(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err(String::new());
    };
    let rest: Vec<&str> = words.collect();
    let cmd = match (head, rest.as_slice()) {
        ("login" | "register" | "auth", [username, password]) => Command::Auth {
            username: username.to_string(),
            password: password.to_string(),
        },
        ("login" | "register" | "auth", _) => return Err(format!("usage: {head} <username> <password>")),
        ("mode", []) => Command::Mode,
        ("file", []) => return Err("usage: file <path.pdf>".to_string()),
        ("file", _) => Command::File(PathBuf::from(rest.join(" "))),
        ("submit", []) => Command::Submit,
        ("preview", []) => Command::Preview,
        ("history", []) => Command::History,
        ("open", [id]) => Command::Open(id.to_string()),
        ("open", _) => return Err("usage: open <id>".to_string()),
        ("download", []) => Command::Download(PathBuf::from(".")),
        ("download", [dir]) => Command::Download(PathBuf::from(dir)),
        ("theme", []) => Command::Theme,
        ("status", []) => Command::Status,
        ("dismiss", []) => Command::Dismiss,
        ("logout", []) => Command::Logout,
        ("help" | "?", _) => Command::Help,
        ("quit" | "exit" | "q", []) => Command::Quit,
        _ => return Err(format!("unknown command: {line}  (try `help`)")),
    };
    Ok(cmd)
}

const HELP: &str = "\
  login <user> <pass>   sign in (or register, see `mode`)
  mode                  switch between login and register
  file <path>           choose a PDF
  submit                summarize the chosen PDF and save it to history
  preview               summarize without saving
  history               reload past summaries
  open <id>             show a past summary
  download [dir]        save the current summary as summary.txt
  theme                 toggle light/dark
  status                redraw everything
  dismiss               clear error messages
  logout                sign out
  quit";

pub async fn run<S: KeyValueStore, T: Transport>(mut app: App<S, T>) -> Result<()> {
    let color = std::io::stdout().is_terminal();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    app.start().await;
    draw(&app, color, &mut stdout).await?;

    loop {
        stdout.write_all(b"\n  notesum> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let cmd = match parse(&line) {
            Ok(cmd) => cmd,
            Err(msg) if msg.is_empty() => continue,
            Err(msg) => {
                let p = Painter::new(app.theme(), color);
                stdout.write_all(format!("  {}\n", p.error(&msg)).as_bytes()).await?;
                continue;
            }
        };
        if cmd == Command::Quit {
            break;
        }
        let note = apply(&mut app, cmd).await;
        draw(&app, color, &mut stdout).await?;
        if let Some(note) = note {
            stdout.write_all(format!("\n  {note}\n").as_bytes()).await?;
        }
    }
    Ok(())
}

/// Run one command. Returns an extra line to show under the redraw.
async fn apply<S: KeyValueStore, T: Transport>(app: &mut App<S, T>, cmd: Command) -> Option<String> {
    let p = Painter::new(app.theme(), std::io::stdout().is_terminal());
    let note = match cmd {
        Command::Auth { username, password } => {
            if app.session().is_authenticated() {
                return Some(p.muted("already signed in; `logout` first"));
            }
            match Credentials::new(&username, &password) {
                Ok(creds) => {
                    let mode = app.session().mode();
                    let result = match mode {
                        AuthMode::Login => app.login(&creds).await,
                        AuthMode::Register => app.register(&creds).await,
                    };
                    // failures are already on the auth section
                    result.ok().map(|()| p.ok(&format!("welcome, {}", creds.username())))
                }
                Err(e) => Some(p.error(&e.to_string())),
            }
        }
        Command::Mode => {
            app.toggle_auth_mode();
            None
        }
        Command::File(path) => {
            if !app.session().is_authenticated() {
                return Some(p.muted("sign in first"));
            }
            match upload::read_file(&path, None) {
                Ok(file) => {
                    // a rejection shows up in the upload section
                    let _ = app.select_file(file);
                    None
                }
                Err(e) => Some(p.error(&format!("{e:#}"))),
            }
        }
        Command::Submit => {
            app.submit().await;
            None
        }
        Command::Preview => {
            app.submit_to(Destination::Preview).await;
            None
        }
        Command::History => {
            app.refresh_history().await;
            None
        }
        Command::Open(id) => {
            if !app.session().is_authenticated() {
                return Some(p.muted("sign in first"));
            }
            app.select_summary(SummaryId::new(id)).await;
            None
        }
        Command::Download(dir) => match app.download() {
            Some(artifact) => match artifact.write_to(&dir) {
                Ok(path) => Some(p.ok(&format!("saved {}", path.display()))),
                Err(e) => Some(p.error(&format!("{e:#}"))),
            },
            None => Some(p.muted("nothing to download yet")),
        },
        Command::Theme => {
            app.toggle_theme();
            None
        }
        Command::Dismiss => {
            app.dismiss_errors();
            None
        }
        Command::Logout => {
            app.logout().await;
            None
        }
        Command::Help => Some(HELP.to_string()),
        Command::Status | Command::Quit => None,
    };
    note
}

async fn draw<S: KeyValueStore, T: Transport>(
    app: &App<S, T>,
    color: bool,
    out: &mut tokio::io::Stdout,
) -> Result<()> {
    let p = Painter::new(app.theme(), color);
    let mut lines = vec![String::new()];
    lines.extend(render::header(app, &p));
    lines.push(String::new());
    if app.session().is_authenticated() {
        lines.extend(render::upload_section(app, &p));
        lines.push(String::new());
        lines.extend(render::summary_section(app, &p));
        lines.push(String::new());
        lines.extend(render::history_section(app, &p));
    } else {
        lines.extend(render::auth_section(app, &p));
        lines.push(format!("  {}", p.muted("type `help` for commands")));
    }
    lines.push(String::new());
    lines.push(render::footer(&p));
    out.write_all(format!("{}\n", lines.join("\n")).as_bytes()).await?;
    out.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use crate::app::Theme;
    use crate::store::{MemoryStore, TokenPair, TokenStore};
    use crate::testing::ScriptedTransport;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse("login alice secret1"),
            Ok(Command::Auth { username: "alice".to_string(), password: "secret1".to_string() })
        );
        assert_eq!(parse("file my notes.pdf"), Ok(Command::File(PathBuf::from("my notes.pdf"))));
        assert_eq!(parse("open 12"), Ok(Command::Open("12".to_string())));
        assert_eq!(parse("download"), Ok(Command::Download(PathBuf::from("."))));
        assert_eq!(parse("download /tmp/out"), Ok(Command::Download(PathBuf::from("/tmp/out"))));
        assert_eq!(parse("  submit  "), Ok(Command::Submit));
        assert_eq!(parse("q"), Ok(Command::Quit));
    }

    #[tokio::test]
    async fn test_download_failure_keeps_shell_state() {
        let transport = ScriptedTransport::default();
        let api = ApiClient::new(transport.clone(), "http://api.test/api");
        let mut store = TokenStore::new(MemoryStore::default());
        store.save(&TokenPair::new("A1", "R1"));
        let mut app = App::new(api, store, Theme::Light);
        transport.push_json(200, r#"{"summary":"Keep this"}"#);
        app.select_summary(SummaryId::new("1")).await;

        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("taken");
        std::fs::write(&blocker, "x").unwrap();

        let note = apply(&mut app, Command::Download(blocker)).await;
        assert!(note.unwrap().contains("Failed to create"));
        assert_eq!(app.active().map(|a| a.text.as_str()), Some("Keep this"));

        let note = apply(&mut app, Command::Download(dir.path().to_path_buf())).await;
        assert!(note.unwrap().contains("saved"));
        assert!(dir.path().join("summary.txt").exists());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse("   "), Err(String::new()));
        assert!(parse("login alice").unwrap_err().starts_with("usage"));
        assert!(parse("open").unwrap_err().starts_with("usage"));
        assert!(parse("frobnicate").unwrap_err().starts_with("unknown command"));
    }
}
