//! # Refsync CLI - Checkout-to-store reconciliation
//!
//! Command-line front end for the refsync library.
//!
//! ## Features
//! - One-way sync of a Git checkout into a directory-backed store
//! - Dry-run preview with `+`/`~`/`-` decision lines
//! - Opt-in deletion of stale target entries
//! - Name-pattern allow-lists and `.syncignore` support
//! - NDJSON decision reports for auditing
//!
//! ## Usage
//! ```bash
//! # Preview what a sync would do
//! refsync sync ./checkout /var/lib/targets --scope project-a --dry-run
//!
//! # Apply, allowing deletions, and keep a report
//! refsync sync ./checkout /var/lib/targets --scope project-a \
//!     --delete --report ./project-a.ndjson
//!
//! # Inspect a previous report
//! refsync report ./project-a.ndjson
//! ```

use clap::{Parser, Subcommand};
use colored::*;
use refsync::{
    read_report, DiffSink, FileStore, InvalidEntryPolicy, LogicalKey, Result,
    ScopeSelector, SyncDecision, SyncError, SyncState, Syncer,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Refsync CLI - mirror a checkout into a hierarchical object store
#[derive(Parser)]
#[command(name = "refsync")]
#[command(version)]
#[command(about = "One-way sync from a Git checkout into a target store")]
#[command(long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a source tree into a target store scope
    #[command(alias = "run")]
    Sync {
        /// Source tree root (the checkout)
        source: PathBuf,

        /// Target store root directory
        target: PathBuf,

        /// Store scope to reconcile into
        #[arg(short, long)]
        scope: String,

        /// Classify and report without mutating the store
        #[arg(long)]
        dry_run: bool,

        /// Allow deletion of stale target entries
        #[arg(long)]
        delete: bool,

        /// Restrict the run to the top level of the scope
        #[arg(long)]
        no_sub_scopes: bool,

        /// Glob allow-list for unit names (repeatable)
        #[arg(short, long)]
        pattern: Vec<String>,

        /// Identity of the entity driving the run, as namespace.id;
        /// never deleted from the target
        #[arg(long)]
        self_key: Option<String>,

        /// Skip malformed structured definitions instead of failing
        #[arg(long)]
        skip_invalid: bool,

        /// Write an NDJSON decision report to this path
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Pretty-print a previously written NDJSON report
    Report {
        /// Report file path
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(if cli.verbose {
                "refsync=debug"
            } else {
                "refsync=warn"
            })
        }))
        .init();

    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    let verbose = cli.verbose;
    if let Err(e) = run(cli, verbose) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli, verbose: bool) -> Result<()> {
    match cli.command {
        Commands::Sync {
            source,
            target,
            scope,
            dry_run,
            delete,
            no_sub_scopes,
            pattern,
            self_key,
            skip_invalid,
            report,
        } => cmd_sync(
            source,
            target,
            scope,
            dry_run,
            delete,
            no_sub_scopes,
            pattern,
            self_key,
            skip_invalid,
            report,
            verbose,
        ),
        Commands::Report { path } => cmd_report(path),
    }
}

/// Sink that prints colored decision lines to stdout
struct ConsoleSink {
    show_unchanged: bool,
}

impl DiffSink for ConsoleSink {
    fn emit(&mut self, decision: &SyncDecision) {
        if decision.state == SyncState::Unchanged
            && decision.warning.is_none()
            && !self.show_unchanged
        {
            return;
        }
        println!("{}", render_line(decision));
        if let Some(warning) = &decision.warning {
            println!("  {} {}", "⚠".yellow().bold(), warning.yellow());
        }
    }
}

fn render_line(decision: &SyncDecision) -> ColoredString {
    let line = format!("{} {}", decision.state.prefix(), decision.unit_key());
    match decision.state {
        SyncState::Added => line.green(),
        SyncState::Updated | SyncState::Overwritten => line.yellow(),
        SyncState::Deleted => line.red(),
        SyncState::Unchanged => line.dimmed(),
    }
}

/// Run one reconciliation
#[allow(clippy::too_many_arguments)]
fn cmd_sync(
    source: PathBuf,
    target: PathBuf,
    scope: String,
    dry_run: bool,
    delete: bool,
    no_sub_scopes: bool,
    patterns: Vec<String>,
    self_key: Option<String>,
    skip_invalid: bool,
    report: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let mut builder = ScopeSelector::builder(&source, &scope)
        .dry_run(dry_run)
        .delete_enabled(delete)
        .include_sub_scopes(!no_sub_scopes)
        .name_patterns(patterns);
    if let Some(raw) = self_key {
        builder = builder.self_key(parse_logical_key(&raw)?);
    }
    if skip_invalid {
        builder = builder.on_invalid(InvalidEntryPolicy::Skip);
    }
    let selector = builder.build();

    if dry_run {
        println!(
            "{} {} {} {}",
            "Previewing".blue().bold(),
            source.display().to_string().cyan(),
            "→".dimmed(),
            format!("{}:{}", target.display(), scope).cyan()
        );
    } else {
        println!(
            "{} {} {} {}",
            "Syncing".blue().bold(),
            source.display().to_string().cyan(),
            "→".dimmed(),
            format!("{}:{}", target.display(), scope).cyan()
        );
    }

    let store = FileStore::open(&target)?;
    let mut syncer = Syncer::new(store).with_sink(ConsoleSink {
        show_unchanged: verbose,
    });
    if let Some(path) = &report {
        syncer = syncer.with_report_path(path);
    }

    let outcome = syncer.run(&selector)?;
    let summary = &outcome.summary;

    println!();
    if dry_run {
        println!("{} Dry run complete, nothing written", "✓".green().bold());
    } else {
        println!("{} Sync complete", "✓".green().bold());
    }
    println!("  Applied: {}", summary.applied.to_string().green());
    println!("  Unchanged: {}", summary.skipped.to_string().dimmed());
    if summary.deletions_suppressed > 0 {
        println!(
            "  Deletions suppressed: {} {}",
            summary.deletions_suppressed.to_string().yellow(),
            if delete { "".normal() } else { "(use --delete)".dimmed() }
        );
    }
    if summary.warnings > 0 {
        println!("  Warnings: {}", summary.warnings.to_string().yellow());
    }
    if let Some(path) = &outcome.report_path {
        println!("  Report: {}", path.display().to_string().cyan());
    }

    Ok(())
}

/// Pretty-print a stored report
fn cmd_report(path: PathBuf) -> Result<()> {
    let decisions = read_report(&path)?;

    println!(
        "{} {}",
        "Report".blue().bold(),
        path.display().to_string().cyan()
    );
    println!();

    let mut counts = [0usize; 5];
    for decision in &decisions {
        println!("{}", render_line(decision));
        if let Some(warning) = &decision.warning {
            println!("  {} {}", "⚠".yellow().bold(), warning.yellow());
        }
        let slot = match decision.state {
            SyncState::Added => 0,
            SyncState::Updated => 1,
            SyncState::Overwritten => 2,
            SyncState::Unchanged => 3,
            SyncState::Deleted => 4,
        };
        counts[slot] += 1;
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  Added: {}", counts[0].to_string().green());
    println!("  Updated: {}", counts[1].to_string().yellow());
    println!("  Overwritten: {}", counts[2].to_string().yellow());
    println!("  Unchanged: {}", counts[3].to_string().dimmed());
    println!("  Deleted: {}", counts[4].to_string().red());

    Ok(())
}

/// Parse `namespace.id` into a logical key; the id is the final segment
fn parse_logical_key(raw: &str) -> Result<LogicalKey> {
    match raw.rsplit_once('.') {
        Some((namespace, id)) if !namespace.is_empty() && !id.is_empty() => {
            Ok(LogicalKey::new(namespace, id))
        }
        _ => Err(SyncError::internal(format!(
            "invalid self key '{raw}': expected namespace.id"
        ))),
    }
}
