//! govlog — governance audit log CLI
//!
//! Usage:
//!   govlog log --event tool_call --field tool=grep --field ok=true
//!   govlog tail -n 20
//!   govlog count
//!   govlog consolidate
//!   govlog init
//!
//! Set `GOVLOG_AUDIT_FILE` (or pass `--file`) to read and write a single
//! legacy JSONL file instead of the sharded layout.

mod init;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use govlog_audit::GovernanceAuditLog;
use govlog_consolidate::Consolidator;
use govlog_contracts::{GovlogResult, LogEntry, ReadReport};
use govlog_core::{config::load_config, GitRootResolver, LogLayout, RootResolver};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Append-only governance audit log, sharded per agent session.
#[derive(Parser)]
#[command(
    name = "govlog",
    about = "Governance audit log: per-session shards merged into one history",
    version
)]
struct Cli {
    /// Use a single legacy JSONL file instead of the sharded layout.
    #[arg(long, global = true, env = "GOVLOG_AUDIT_FILE")]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge pending session shards into the history file.
    Consolidate {
        /// Report failures on stderr but exit 0 (for git hooks).
        #[arg(long)]
        hook: bool,
    },
    /// Print the most recent entries as JSON lines, oldest first.
    Tail {
        /// Number of entries; 0 prints everything.
        #[arg(short = 'n', long = "lines", default_value_t = 20)]
        n: usize,
    },
    /// Print the number of entries.
    Count,
    /// Append one entry.
    Log {
        /// Value of the entry's `event` field.
        #[arg(long)]
        event: String,
        /// Extra `key=value` field.  Values that parse as JSON are stored
        /// as JSON, anything else as a string.
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, Value)>,
    },
    /// Set up ignore rules, the active directory and the post-commit hook.
    Init,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Consolidate { hook } => {
            let result = run_consolidate();
            if hook {
                if let Err(e) = result {
                    eprintln!("govlog: consolidation skipped: {e}");
                }
                return;
            }
            result
        }
        Command::Tail { n } => open_log(cli.file).map(|log| run_tail(&log, n)),
        Command::Count => open_log(cli.file).map(|log| run_count(&log)),
        Command::Log { event, fields } => {
            open_log(cli.file).and_then(|log| run_log(&log, event, fields))
        }
        Command::Init => run_init(),
    };

    if let Err(e) = result {
        eprintln!("govlog: {e}");
        std::process::exit(1);
    }
}

fn open_log(file: Option<PathBuf>) -> GovlogResult<GovernanceAuditLog> {
    match file {
        Some(path) => Ok(GovernanceAuditLog::legacy(path)),
        None => GovernanceAuditLog::discover(),
    }
}

// ── Subcommands ───────────────────────────────────────────────────────────────

fn run_consolidate() -> GovlogResult<()> {
    let result = Consolidator::discover()?.consolidate()?;

    if result.is_noop() && result.shards_skipped == 0 {
        println!("Nothing to consolidate.");
        return Ok(());
    }

    println!(
        "Merged {} shard(s), {} new entr{} ({} in history) in {} ms.",
        result.shards_merged,
        result.entries_merged,
        if result.entries_merged == 1 { "y" } else { "ies" },
        result.history_entries,
        result.duration.as_millis()
    );
    if result.shards_retained > 0 {
        println!(
            "Kept {} shard(s) that grew during the run.",
            result.shards_retained
        );
    }
    if result.shards_skipped > 0 {
        println!(
            "Skipped {} unreadable shard(s); left in place.",
            result.shards_skipped
        );
    }
    if let Some(digest) = &result.history_digest {
        println!("History sha256: {digest}");
    }
    Ok(())
}

fn run_tail(log: &GovernanceAuditLog, n: usize) {
    let report = log.tail_report(n);
    warn_skipped(&report);
    for entry in &report.entries {
        if let Ok(line) = entry.to_line() {
            println!("{line}");
        }
    }
}

fn run_count(log: &GovernanceAuditLog) {
    let report = log.entries();
    warn_skipped(&report);
    println!("{}", report.entries.len());
}

fn run_log(
    log: &GovernanceAuditLog,
    event: String,
    fields: Vec<(String, Value)>,
) -> GovlogResult<()> {
    let entry = fields
        .into_iter()
        .fold(LogEntry::new().with("event", event), |entry, (k, v)| {
            entry.with(k, v)
        });
    let written = log.log(entry)?;
    println!("{}", written.to_line()?);
    Ok(())
}

fn run_init() -> GovlogResult<()> {
    let root = GitRootResolver::new().resolve()?;
    let config = load_config(&root)?;
    let layout = LogLayout::new(root, &config)?;

    let report = init::init(&layout)?;
    for path in &report.created {
        println!("created  {}", path.display());
    }
    for path in &report.updated {
        println!("updated  {}", path.display());
    }
    if report.is_unchanged() {
        println!("Already initialised.");
    }
    Ok(())
}

fn warn_skipped(report: &ReadReport) {
    for skipped in &report.skipped {
        eprintln!(
            "govlog: skipped {}: {}",
            skipped.path.display(),
            skipped.reason
        );
    }
}

/// Parse `key=value`.  The value is JSON if it parses as JSON, else a string.
fn parse_field(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
