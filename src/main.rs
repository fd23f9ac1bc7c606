mod api;
mod app;
mod config;
mod error;
mod history;
mod render;
mod session;
mod shell;
mod store;
mod upload;

#[cfg(test)]
mod testing;

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use api::{ApiClient, HttpTransport, SummaryId};
use app::{App, Destination};
use config::{ConfigFile, ResolvedConfig};
use render::Painter;
use session::Credentials;
use store::{FileStore, TokenStore};

#[derive(Parser, Debug)]
#[command(
    name = "notesum",
    about = "Upload PDF notes, get AI summaries, browse past summaries",
    long_about = None,
)]
struct Args {
    #[command(subcommand)]
    command: Option<Cmd>,

    /// Profile to use from config file
    #[arg(short, long, global = true, env = "NOTESUM_PROFILE")]
    profile: Option<String>,

    /// Override the API base URL
    #[arg(long, global = true, env = "NOTESUM_BASE_URL")]
    base_url: Option<String>,

    /// Log request dispatch and state transitions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write a default config file to ~/.config/notesum/config.toml and exit
    #[arg(long)]
    init: bool,

    /// List available profiles and exit
    #[arg(long)]
    profiles: bool,

    /// Generate shell completions and print to stdout (bash, zsh, fish, elvish)
    #[arg(long, value_name = "SHELL")]
    completions: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Sign in and store the session tokens
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short = 'P', long, env = "NOTESUM_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short = 'P', long, env = "NOTESUM_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show session and server details
    Status,
    /// Summarize a PDF
    Summarize {
        file: PathBuf,
        /// Also save the summary as summary.txt in this directory
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Summarize without adding the file to history
        #[arg(long)]
        no_save: bool,
        /// Declared content type (default: from the file extension)
        #[arg(long)]
        mime: Option<String>,
    },
    /// List past summaries
    History,
    /// Print a past summary
    Show {
        id: String,
        /// Also save the summary as summary.txt in this directory
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Interactive mode (default when no command is given)
    Shell,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    // ── --init ────────────────────────────────────────────────────────────────
    if args.init {
        let path = ConfigFile::write_default_if_missing()?;
        println!("Config written to: {}", path.display());
        println!("Edit it, then run: notesum login -u <username>");
        return Ok(());
    }

    // ── --completions ─────────────────────────────────────────────────────────
    if let Some(shell_name) = &args.completions {
        return generate_completions(shell_name);
    }

    let file = ConfigFile::load()?;

    // ── --profiles ────────────────────────────────────────────────────────────
    if args.profiles {
        print_profiles(&file);
        return Ok(());
    }

    let resolved = ResolvedConfig::resolve(&file, args.profile.as_deref(), args.base_url.as_deref());
    tracing::debug!(profile = %resolved.profile_name, base_url = %resolved.base_url, "config resolved");

    let api = ApiClient::new(HttpTransport::new(), resolved.base_url.clone());
    let store = TokenStore::new(FileStore::open(&resolved.credentials_path));
    let app = App::new(api, store, resolved.theme);

    run_command(app, args.command.unwrap_or(Cmd::Shell), &resolved).await
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("notesum=debug")
    } else {
        EnvFilter::try_from_env("NOTESUM_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// ── One-shot commands (plain stdout) ──────────────────────────────────────────

type CliApp = App<FileStore, HttpTransport>;

async fn run_command(mut app: CliApp, cmd: Cmd, resolved: &ResolvedConfig) -> Result<()> {
    let p = Painter::new(app.theme(), std::io::stdout().is_terminal());

    match cmd {
        Cmd::Shell => return shell::run(app).await,
        Cmd::Login { username, password } => {
            let creds = Credentials::new(&username, &password)?;
            app.login(&creds).await?;
            println!("  {}", p.ok(&format!("signed in as {}", creds.username())));
        }
        Cmd::Register { username, password } => {
            let creds = Credentials::new(&username, &password)?;
            app.register(&creds).await?;
            println!("  {}", p.ok(&format!("registered and signed in as {}", creds.username())));
        }
        Cmd::Logout => {
            app.logout().await;
            println!("  {}", p.ok("signed out"));
        }
        Cmd::Status => {
            for line in render::header(&app, &p) {
                println!("{line}");
            }
            println!("  {}", p.muted(&format!("profile      {}", resolved.profile_name)));
            println!(
                "  {}",
                p.muted(&format!("credentials  {}", resolved.credentials_path.display()))
            );
        }
        Cmd::Summarize { file, out, no_save, mime } => {
            require_session(&app)?;
            let part = upload::read_file(&file, mime.as_deref())?;
            app.select_file(part)?;
            let destination = if no_save { Destination::Preview } else { Destination::History };
            app.submit_to(destination).await;
            if let Some(e) = app.upload().error() {
                bail!(e);
            }
            print_summary(&app, &p, out)?;
        }
        Cmd::History => {
            require_session(&app)?;
            app.refresh_history().await;
            if let Some(e) = app.history().error() {
                bail!(e.to_string());
            }
            for line in render::history_section(&app, &p) {
                println!("{line}");
            }
        }
        Cmd::Show { id, out } => {
            require_session(&app)?;
            app.select_summary(SummaryId::new(id)).await;
            if let Some(e) = app.history().error() {
                bail!(e.to_string());
            }
            print_summary(&app, &p, out)?;
        }
    }
    Ok(())
}

fn require_session(app: &CliApp) -> Result<()> {
    if !app.session().is_authenticated() {
        bail!("not signed in; run `notesum login -u <username>` first");
    }
    Ok(())
}

fn print_summary(app: &CliApp, p: &Painter, out: Option<PathBuf>) -> Result<()> {
    for line in render::summary_section(app, p) {
        println!("{line}");
    }
    if let Some(dir) = out {
        if let Some(artifact) = app.download() {
            let path = artifact.write_to(&dir)?;
            println!("\n  {}", p.ok(&format!("saved {}", path.display())));
        }
    }
    Ok(())
}

// ── --profiles ────────────────────────────────────────────────────────────────

fn print_profiles(file: &ConfigFile) {
    let mut entries: Vec<(&String, &config::Profile)> = file.profiles.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    println!();
    println!("  Profiles");
    if entries.is_empty() {
        println!("  (none; run `notesum --init`)");
    }
    for (name, profile) in &entries {
        let marker = if **name == file.default_profile { " ←" } else { "" };
        println!("  {name}{marker}");
        println!("    base_url  {}", profile.base_url);
        println!("    theme     {:?}", profile.theme);
        println!();
    }
}

// ── Shell completions ─────────────────────────────────────────────────────────

fn generate_completions(shell_name: &str) -> Result<()> {
    use clap_complete::{Shell, generate};

    let shell: Shell = match shell_name.to_lowercase().as_str() {
        "bash"    => Shell::Bash,
        "zsh"     => Shell::Zsh,
        "fish"    => Shell::Fish,
        "elvish"  => Shell::Elvish,
        _ => {
            eprintln!("Unknown shell: {shell_name}");
            eprintln!("Supported: bash, zsh, fish, elvish");
            std::process::exit(1);
        }
    };

    let mut cmd = Args::command();
    generate(shell, &mut cmd, "notesum", &mut std::io::stdout());
    Ok(())
}
