//! CLI binary for edgequake-deckdrop.
//!
//! Batch mode walks the given paths, queues what the converter accepts and
//! submits once. Interactive mode runs a [`Session`] and reads commands from
//! stdin.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_deckdrop::config::{DEFAULT_ENDPOINT, DEFAULT_FILENAME};
use edgequake_deckdrop::{
    pick_paths, traverse_paths, CandidateFile, ClientConfig, EntryError, HttpUploader, LocalEntry,
    Orchestrator, Selection, Session, SessionObserver, Severity, Status, SubmitState,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

fn spinner(prefix: &str, message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS),
    );
    bar.set_prefix(prefix.to_string());
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── Terminal observer ────────────────────────────────────────────────────────

/// Prints status lines and keeps a copy of the selection for `ls`.
///
/// While a submission is in flight the status line lives in a spinner; the
/// terminal status (saved / failed) replaces it.
struct CliObserver {
    show_progress: bool,
    quiet: bool,
    spinner: Mutex<Option<ProgressBar>>,
    labels: Mutex<Vec<String>>,
    submit_enabled: AtomicBool,
}

impl CliObserver {
    fn new(show_progress: bool, quiet: bool) -> Arc<Self> {
        Arc::new(Self {
            show_progress,
            quiet,
            spinner: Mutex::new(None),
            labels: Mutex::new(Vec::new()),
            submit_enabled: AtomicBool::new(false),
        })
    }

    fn print_selection(&self) {
        let labels = lock(&self.labels);
        if labels.is_empty() {
            eprintln!("  {}", dim("(no files selected)"));
            return;
        }
        for (i, label) in labels.iter().enumerate() {
            eprintln!("  {:>3}. {}", i + 1, label);
        }
        if !self.submit_enabled.load(Ordering::SeqCst) {
            eprintln!("  {}", dim("(submission in progress)"));
        }
    }

    fn note_failure(&self, error: &EntryError) {
        if !self.quiet {
            eprintln!("  {} {}", red("✗"), dim(&error.to_string()));
        }
    }

    fn clear_spinner(&self) {
        if let Some(bar) = lock(&self.spinner).take() {
            bar.finish_and_clear();
        }
    }
}

impl SessionObserver for CliObserver {
    fn on_status(&self, status: &Status) {
        if status.severity == Severity::Info {
            if let Some(bar) = lock(&self.spinner).as_ref() {
                bar.set_message(status.message.clone());
                return;
            }
        }
        self.clear_spinner();

        match status.severity {
            Severity::Error => eprintln!("{} {}", red("✘"), status.message),
            _ if self.quiet => {}
            Severity::Success => eprintln!("{} {}", green("✔"), bold(&status.message)),
            Severity::Info => eprintln!("{} {}", cyan("◆"), status.message),
        }
    }

    fn on_selection_changed(&self, files: &[CandidateFile]) {
        *lock(&self.labels) = files.iter().map(CandidateFile::display_label).collect();
    }

    fn on_entry_failed(&self, error: &EntryError) {
        self.clear_spinner();
        self.note_failure(error);
    }

    fn on_submit_enabled(&self, enabled: bool) {
        self.submit_enabled.store(enabled, Ordering::SeqCst);
        if enabled {
            self.clear_spinner();
            return;
        }
        // Disabled with files queued: a submission just started.
        let submitting = !lock(&self.labels).is_empty();
        if submitting && self.show_progress {
            let mut slot = lock(&self.spinner);
            if slot.is_none() {
                *slot = Some(spinner("Uploading", "waiting for the server…"));
            }
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Walk a folder and submit everything the converter accepts
  deckdrop slides/

  # Mix folders and single files, save the result elsewhere
  deckdrop slides/ notes.pdf -o out/

  # Add files without walking folders
  deckdrop --pick cover.png summary.pdf

  # Show what would be sent, without sending
  deckdrop --dry-run ~/Documents/talk

  # Use another conversion server
  deckdrop --endpoint https://convert.example.com/upload talk/

  # Interactive session
  deckdrop -i

INTERACTIVE COMMANDS:
  add <path>...     walk files and folders and queue what is accepted
  pick <file>...    queue files without walking folders
  ls                list the queue
  rm <n>            remove entry n (as shown by ls)
  submit            send the queue
  quit              stop (also on end of input)

ACCEPTED FILES:
  image/png, image/jpeg, image/gif, image/bmp, image/tiff, application/pdf
  (by media type), or .png .jpg .jpeg .gif .bmp .tiff .pdf (by extension
  when no media type is known). Files already queued are skipped.

ENVIRONMENT VARIABLES:
  DECKDROP_ENDPOINT        Conversion endpoint URL
  DECKDROP_OUTPUT_DIR      Directory for the saved presentation
  DECKDROP_FILENAME        Name used when the server suggests none
  DECKDROP_TIMEOUT         Upload timeout in seconds
  DECKDROP_MAX_UPLOAD_MB   Refuse to send selections larger than this
  RUST_LOG                 Override log filter (e.g. edgequake_deckdrop=debug)
"#;

/// Send documents to a presentation conversion server.
#[derive(Parser, Debug)]
#[command(
    name = "deckdrop",
    version,
    about = "Send documents to a presentation conversion server",
    long_about = "Collect documents from files and folders (walked recursively), skip \
anything the converter cannot read and anything already queued, upload the rest as one \
multipart request and save the presentation the server returns.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Files or folders to add; folders are walked recursively.
    paths: Vec<PathBuf>,

    /// Files to add as-is, without walking folders.
    #[arg(long, value_name = "FILE", num_args = 1..)]
    pick: Vec<PathBuf>,

    /// Conversion endpoint (multipart POST).
    #[arg(long, env = "DECKDROP_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Directory the presentation is saved to.
    #[arg(short, long, env = "DECKDROP_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Filename used when the server does not suggest one.
    #[arg(long, env = "DECKDROP_FILENAME", default_value = DEFAULT_FILENAME)]
    default_filename: String,

    /// Upload timeout in seconds.
    #[arg(long, env = "DECKDROP_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Largest selection, in MiB, that will be sent.
    #[arg(long, env = "DECKDROP_MAX_UPLOAD_MB", default_value_t = 200,
          value_parser = clap::value_parser!(u64).range(1..))]
    max_upload_mb: u64,

    /// List the files that would be sent and exit.
    #[arg(long)]
    dry_run: bool,

    /// Read commands from stdin instead of submitting once.
    #[arg(short, long)]
    interactive: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "DECKDROP_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DECKDROP_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DECKDROP_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are suppressed while the spinner is active; the
    // status lines carry what matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let observer = CliObserver::new(show_progress, cli.quiet);

    if cli.interactive {
        run_interactive(&cli, config, observer).await
    } else {
        run_batch(&cli, config, observer).await
    }
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli) -> Result<ClientConfig> {
    ClientConfig::builder()
        .endpoint(cli.endpoint.clone())
        .output_dir(cli.output_dir.clone())
        .default_filename(cli.default_filename.clone())
        .request_timeout_secs(cli.timeout)
        .max_upload_bytes(cli.max_upload_mb.saturating_mul(1024 * 1024))
        .build()
        .context("Invalid configuration")
}

// ── Batch mode ───────────────────────────────────────────────────────────────

async fn run_batch(cli: &Cli, config: ClientConfig, observer: Arc<CliObserver>) -> Result<()> {
    let mut selection = Selection::new();

    if !cli.paths.is_empty() {
        let bar = observer
            .show_progress
            .then(|| spinner("Reading", "walking dropped items…"));
        let walked = traverse_paths(&cli.paths).await;
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
        let walked = walked.context("Error reading the folder structure.")?;
        for failure in &walked.failures {
            observer.note_failure(failure);
        }
        let summary = selection.add_batch(walked.candidates, &config.allow_list);
        observer.on_status(&summary.status());
    }

    if !cli.pick.is_empty() {
        let picked = pick_paths(&cli.pick).await;
        let summary = selection.add_batch(picked, &config.allow_list);
        observer.on_status(&summary.status());
    }

    observer.on_selection_changed(selection.files());
    if cli.dry_run || !cli.quiet {
        observer.print_selection();
    }
    if cli.dry_run {
        if !cli.quiet {
            eprintln!(
                "{} {} file(s), {} bytes would be sent to {}",
                dim("dry run:"),
                selection.len(),
                selection.total_bytes(),
                config.endpoint
            );
        }
        return Ok(());
    }

    let uploader = HttpUploader::new(&config).context("Failed to create HTTP client")?;
    let state = Orchestrator::new()
        .submit(&uploader, &mut selection, &config, observer.as_ref())
        .await;

    match state {
        SubmitState::Succeeded => Ok(()),
        SubmitState::Failed => anyhow::bail!("Submission failed"),
        SubmitState::Idle | SubmitState::Submitting => anyhow::bail!("Nothing was submitted"),
    }
}

// ── Interactive mode ─────────────────────────────────────────────────────────

async fn run_interactive(cli: &Cli, config: ClientConfig, observer: Arc<CliObserver>) -> Result<()> {
    let uploader = Arc::new(HttpUploader::new(&config).context("Failed to create HTTP client")?);
    let (session, handle) = Session::<LocalEntry>::new(config, uploader, observer.clone());
    let task = tokio::spawn(session.run());

    if !cli.paths.is_empty() {
        handle.drop_paths(cli.paths.clone()).await?;
    }
    if !cli.pick.is_empty() {
        handle.pick(pick_paths(&cli.pick).await).await?;
    }
    if !cli.quiet {
        eprintln!("{}", dim("Commands: add, pick, ls, rm <n>, submit, quit"));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let args: Vec<&str> = words.collect();

        match command {
            "add" | "drop" => {
                let paths = args.iter().copied().map(PathBuf::from).collect();
                handle.drop_paths(paths).await?
            }
            "pick" => handle.pick(pick_paths(&args).await).await?,
            "ls" | "list" => observer.print_selection(),
            "rm" | "remove" => match args.first().and_then(|a| a.parse::<usize>().ok()) {
                Some(n) if n >= 1 => handle.remove(n - 1).await?,
                _ => eprintln!("{} usage: rm <n>", red("✘")),
            },
            "submit" | "send" => handle.submit().await?,
            "quit" | "exit" | "q" => break,
            other => eprintln!("{} unknown command '{other}'", red("✘")),
        }
    }

    handle.shutdown().await?;
    let selection = task.await.context("Session task failed")?;
    if !selection.is_empty() && !cli.quiet {
        eprintln!("{}", dim(&format!("{} file(s) left unsent", selection.len())));
    }
    Ok(())
}
