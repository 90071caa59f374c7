//! paginate CLI - assemble paginated output documents and check their status

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pagination::{
    ClipboardTransferUnit, DocumentId, NameAllocator, PageRulesBackend, PaginationSession,
    SessionManifest, StatusState,
};

#[derive(Parser)]
#[command(name = "paginate")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Assemble paginated output documents and check their status", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the status of every document in a manifest
    Status {
        /// Session manifest (JSON)
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,

        /// Print statuses as JSON
        #[arg(long)]
        json: bool,

        /// How long to wait for status workers, in milliseconds
        #[arg(long, default_value = "30000", env = "PAGINATE_TIMEOUT_MS")]
        timeout: u64,

        /// Pause between validation stages, in milliseconds
        #[arg(long, default_value = "0")]
        stage_delay: u64,
    },

    /// Allocate unique output names
    Names {
        /// Candidate names, in allocation order
        #[arg(value_name = "CANDIDATE", required = true)]
        candidates: Vec<String>,

        /// Names that already exist
        #[arg(short, long, value_name = "NAME")]
        existing: Vec<String>,

        /// Treat names differing only in case as distinct
        #[arg(long)]
        case_sensitive: bool,
    },

    /// Copy documents from a manifest as clipboard text
    Copy {
        /// Session manifest (JSON)
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,

        /// Names of the documents to copy
        #[arg(value_name = "DOC", required = true)]
        documents: Vec<String>,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Paste clipboard text into a manifest's session
    Paste {
        /// Session manifest (JSON)
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,

        /// File holding clipboard text
        #[arg(value_name = "CLIPBOARD")]
        clipboard: PathBuf,

        /// Document to insert leading pages into
        #[arg(long, value_name = "DOC")]
        into: Option<String>,

        /// Insert position in the target document
        #[arg(long, default_value = "0")]
        at: usize,
    },

    /// Show version information
    Version,
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Status {
            manifest,
            json,
            timeout,
            stage_delay,
        }) => cmd_status(
            &manifest,
            json,
            Duration::from_millis(timeout),
            Duration::from_millis(stage_delay),
        ),
        Some(Commands::Names {
            candidates,
            existing,
            case_sensitive,
        }) => {
            cmd_names(&candidates, &existing, case_sensitive);
            Ok(())
        }
        Some(Commands::Copy {
            manifest,
            documents,
            output,
        }) => cmd_copy(&manifest, &documents, output.as_deref()),
        Some(Commands::Paste {
            manifest,
            clipboard,
            into,
            at,
        }) => cmd_paste(&manifest, &clipboard, into.as_deref(), at),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            println!("{}", "Usage: paginate <COMMAND>".yellow());
            println!("       paginate --help for more information");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn open_session(
    manifest: &Path,
    stage_delay: Duration,
) -> CliResult<(PaginationSession, Vec<DocumentId>)> {
    let manifest = SessionManifest::from_path(manifest)?;
    let backend = PageRulesBackend::new().with_stage_delay(stage_delay);
    Ok(manifest.build_session(Arc::new(backend))?)
}

fn find_document(session: &PaginationSession, name: &str) -> CliResult<DocumentId> {
    session
        .documents()
        .iter()
        .find(|doc| doc.name() == name)
        .map(|doc| doc.id())
        .ok_or_else(|| format!("No document named {:?}", name).into())
}

fn wait_with_spinner(session: &mut PaginationSession, timeout: Duration) -> bool {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let deadline = Instant::now() + timeout;
    let idle = loop {
        pb.set_message(format!(
            "Computing status for {} document(s)...",
            session.busy_documents()
        ));
        let remaining = deadline.saturating_duration_since(Instant::now());
        if session.wait_idle(remaining.min(Duration::from_millis(100))) {
            break true;
        }
        if remaining.is_zero() {
            break false;
        }
    };

    if idle {
        pb.finish_with_message("Done!");
    } else {
        pb.abandon_with_message("Timed out");
    }
    idle
}

fn cmd_status(
    manifest: &Path,
    json: bool,
    timeout: Duration,
    stage_delay: Duration,
) -> CliResult<()> {
    let (mut session, ids) = open_session(manifest, stage_delay)?;
    let idle = wait_with_spinner(&mut session, timeout);

    if json {
        let mut entries = Vec::with_capacity(ids.len());
        for id in &ids {
            let doc = session.document(*id)?;
            let status = match doc.status() {
                StatusState::Ready(status) => serde_json::to_value(status.as_ref())?,
                StatusState::Pending => serde_json::Value::String("pending".to_string()),
                StatusState::None => serde_json::Value::Null,
            };
            entries.push(serde_json::json!({
                "name": doc.name(),
                "pages": doc.page_count(),
                "status": status,
            }));
        }
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        println!("{}", "Document Status".cyan().bold());
        println!("{}", "─".repeat(40).dimmed());
        for id in &ids {
            let doc = session.document(*id)?;
            match doc.status() {
                StatusState::Ready(status) if status.data_error() => {
                    println!(
                        "{} {}: {}",
                        "✗".red(),
                        doc.name().bold(),
                        status.stringized_error().unwrap_or("error")
                    );
                }
                StatusState::Ready(status) => {
                    let mark = if status.data_warning() {
                        "!".yellow()
                    } else {
                        "✓".green()
                    };
                    println!("{} {}: {}", mark, doc.name().bold(), status.summary());
                    if status.prompt_for_duplicate_orders() {
                        println!("  {} multiple orders", "├─".dimmed());
                    }
                    if status.prompt_for_duplicate_encounters() {
                        println!("  {} multiple encounters", "├─".dimmed());
                    }
                }
                StatusState::Pending => {
                    println!("{} {}: {}", "…".yellow(), doc.name().bold(), "pending".dimmed())
                }
                StatusState::None => {
                    println!("{} {}: {}", "-".dimmed(), doc.name().bold(), "no pages".dimmed())
                }
            }
        }
    }

    if !session.shutdown() {
        log::warn!("status workers did not stop in time");
    }
    if !idle {
        return Err("Timed out waiting for status workers".into());
    }
    Ok(())
}

fn cmd_names(candidates: &[String], existing: &[String], case_sensitive: bool) {
    let mut names = NameAllocator::new().with_case_sensitive(case_sensitive);
    names.claim_existing(existing);
    for candidate in candidates {
        let name = names.allocate(candidate);
        if &name == candidate {
            println!("{}", name);
        } else {
            println!("{} {}", name, format!("(from {})", candidate).dimmed());
        }
    }
}

fn copy_text(manifest: &Path, documents: &[String]) -> CliResult<String> {
    let (mut session, _) = open_session(manifest, Duration::ZERO)?;
    let ids = documents
        .iter()
        .map(|name| find_document(&session, name))
        .collect::<CliResult<Vec<_>>>()?;
    let unit = session.copy(&ids)?;
    session.shutdown();
    Ok(unit.to_clipboard_text()?)
}

fn cmd_copy(manifest: &Path, documents: &[String], output: Option<&Path>) -> CliResult<()> {
    let text = copy_text(manifest, documents)?;
    if let Some(path) = output {
        fs::write(path, &text)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", text);
    }
    Ok(())
}

fn cmd_paste(manifest: &Path, clipboard: &Path, into: Option<&str>, at: usize) -> CliResult<()> {
    let (mut session, _) = open_session(manifest, Duration::ZERO)?;
    let unit = ClipboardTransferUnit::from_clipboard_text(&fs::read_to_string(clipboard)?)?;
    let target = match into {
        Some(name) => Some((find_document(&session, name)?, at)),
        None => None,
    };

    let result = session.paste(&unit, target)?;
    let skipped = unit.page_count() - result.pages;
    if skipped > 0 {
        println!(
            "{} {} page(s) no longer exist and were skipped",
            "Warning:".yellow().bold(),
            skipped
        );
    }
    if let Some(name) = into.filter(|_| result.inserted > 0) {
        println!("{} {} page(s) into {}", "Inserted".green(), result.inserted, name);
    }
    for id in &result.created {
        let doc = session.document(*id)?;
        println!(
            "{} {} ({} pages)",
            "Created".green(),
            doc.name().bold(),
            doc.page_count()
        );
    }
    session.shutdown();
    Ok(())
}

fn cmd_version() {
    println!("{} {}", "paginate".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Paginated output document tool");
    println!();
    println!("License: MIT");
}
