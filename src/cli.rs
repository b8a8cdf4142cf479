//! CLI interface for registry-log.
//!
//! Each subcommand runs one pipeline stage over files: arguments in, files
//! out, a short human-readable digest on stderr. Stage outputs are written
//! atomically, so a failed command never leaves a half-written log behind.
//!
//! Settings not given as flags fall back to `REGISTRY_LOG_*` environment
//! variables, then the config file, then defaults.

mod format;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::eventlog;
use crate::goodbye;
use crate::pipeline;
use crate::source::SourceSpec;
use crate::stats::Summary;
use crate::trim::{self, TrimOptions, TrimPaths};

use format::{format_pipeline_report, format_summary};

/// registry-log: assemble and analyze package-registry activity logs.
#[derive(Debug, Parser)]
#[command(name = "registry-log", after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Config file. Defaults to `~/.registry-log/config.toml` when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r"Workflow: from registry feeds to statistics
  1. registry-log merge --source uploads.jsonl --source csv:downloads.csv --out merged.jsonl
  2. registry-log goodbye --input merged.jsonl --out final.jsonl
  3. registry-log stats --input final.jsonl --out summary.json

Or all at once:
  registry-log pipeline --source uploads.jsonl --source csv:downloads.csv --out final.jsonl

Sources:
  events:<path>     canonical JSONL log (the default; .zst is decompressed)
  csv:<path>        user,package,timestamp download rows
  csv-anon:<path>   same, hashing the user column

On equal timestamps, events from earlier --source flags come first.
List publish feeds before download feeds so uploads win ties.";

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Merge time-ordered sources into one time-ordered log.
    Merge {
        /// Input source, `<kind>:<path>`. Repeat for each source, in priority order.
        #[arg(long = "source", required = true)]
        sources: Vec<SourceSpec>,

        /// Where to write the merged log.
        #[arg(long)]
        out: PathBuf,

        /// Skip checking that each source is in timestamp order.
        #[arg(long)]
        no_verify_order: bool,
    },

    /// Add a Goodbye event after each user's last download.
    ///
    /// Reads the input backward in fixed-size blocks, so logs larger than
    /// memory are fine. Needs free disk space for one staged copy.
    Goodbye {
        /// A merged, time-ordered log.
        #[arg(long)]
        input: PathBuf,

        /// Where to write the final log.
        #[arg(long)]
        out: PathBuf,

        /// Directory for the staging copy.
        #[arg(long)]
        staging_dir: Option<PathBuf>,

        /// Bytes per reverse read.
        #[arg(long)]
        block_size: Option<usize>,
    },

    /// Count downloads and sessions in a finalized log.
    ///
    /// The summary JSON is written to `--out` (if given) or stdout.
    /// A human-readable digest is printed to stderr.
    Stats {
        /// A finalized log.
        #[arg(long)]
        input: PathBuf,

        /// Write the summary JSON to this file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Maximum distance from a session's first download.
        #[arg(long)]
        session_threshold_secs: Option<i64>,
    },

    /// Cut a snapshot and event log down to the most popular packages.
    Trim {
        /// Initial snapshot (publish events) used to rank packages.
        #[arg(long)]
        input_initial: PathBuf,

        /// Event log to filter.
        #[arg(long)]
        input_events: PathBuf,

        #[arg(long)]
        output_initial: PathBuf,

        #[arg(long)]
        output_events: PathBuf,

        /// How many distinct packages to keep.
        #[arg(long)]
        num_packages: Option<usize>,

        /// How many events to keep from the event log.
        #[arg(long)]
        num_entries: Option<usize>,
    },

    /// Merge, add goodbyes, and compute statistics in one run.
    Pipeline {
        /// Input source, `<kind>:<path>`. Repeat for each source, in priority order.
        #[arg(long = "source", required = true)]
        sources: Vec<SourceSpec>,

        /// Where to write the final log.
        #[arg(long)]
        out: PathBuf,

        /// Write the summary JSON to this file instead of stdout.
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Directory for intermediate files.
        #[arg(long)]
        staging_dir: Option<PathBuf>,

        /// Maximum distance from a session's first download.
        #[arg(long)]
        session_threshold_secs: Option<i64>,
    },
}

/// Run the CLI, returning an error message on failure.
pub fn run() -> Result<(), String> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).map_err(|e| e.to_string())?;

    match cli.command {
        Command::Merge {
            sources,
            out,
            no_verify_order,
        } => {
            if no_verify_order {
                config.verify_source_order = false;
            }
            cmd_merge(&config, &sources, &out)
        }
        Command::Goodbye {
            input,
            out,
            staging_dir,
            block_size,
        } => {
            config.staging_dir = staging_dir.or(config.staging_dir);
            config.block_size = block_size.unwrap_or(config.block_size);
            cmd_goodbye(&config, &input, &out)
        }
        Command::Stats {
            input,
            out,
            session_threshold_secs,
        } => {
            config.session_threshold_secs =
                session_threshold_secs.unwrap_or(config.session_threshold_secs);
            cmd_stats(&config, &input, out)
        }
        Command::Trim {
            input_initial,
            input_events,
            output_initial,
            output_events,
            num_packages,
            num_entries,
        } => cmd_trim(
            TrimPaths {
                input_initial: &input_initial,
                input_events: &input_events,
                output_initial: &output_initial,
                output_events: &output_events,
            },
            TrimOptions {
                num_packages,
                num_entries,
            },
        ),
        Command::Pipeline {
            sources,
            out,
            summary,
            staging_dir,
            session_threshold_secs,
        } => {
            config.staging_dir = staging_dir.or(config.staging_dir);
            config.session_threshold_secs =
                session_threshold_secs.unwrap_or(config.session_threshold_secs);
            cmd_pipeline(&config, &sources, &out, summary)
        }
    }
}

fn cmd_merge(config: &Config, sources: &[SourceSpec], out: &Path) -> Result<(), String> {
    let written = pipeline::merge_to_file(sources, out, config.verify_source_order)
        .map_err(|e| format!("merge failed: {e}"))?;
    eprintln!(
        "Merged {} source(s) → {} ({written} events)",
        sources.len(),
        out.display()
    );
    Ok(())
}

fn cmd_goodbye(config: &Config, input: &Path, out: &Path) -> Result<(), String> {
    config.validate().map_err(|e| e.to_string())?;
    let report = goodbye::synthesize(input, out, &config.goodbye_options())
        .map_err(|e| format!("goodbye synthesis failed: {e}"))?;
    eprintln!(
        "Added {} goodbye(s) to {} events → {}",
        report.goodbyes,
        report.events,
        out.display()
    );
    Ok(())
}

fn cmd_stats(config: &Config, input: &Path, out: Option<PathBuf>) -> Result<(), String> {
    config.validate().map_err(|e| e.to_string())?;
    let summary = pipeline::stats_from_file(input, config.session_threshold())
        .map_err(|e| format!("stats failed: {e}"))?;
    emit_summary(&summary, out)
}

fn cmd_trim(paths: TrimPaths<'_>, options: TrimOptions) -> Result<(), String> {
    let report = trim::trim(paths, options).map_err(|e| format!("trim failed: {e}"))?;
    eprintln!(
        "Kept {} package(s): {} snapshot event(s) → {}, {} event(s) → {}",
        report.packages_kept,
        report.initial_written,
        paths.output_initial.display(),
        report.events_written,
        paths.output_events.display()
    );
    Ok(())
}

fn cmd_pipeline(
    config: &Config,
    sources: &[SourceSpec],
    out: &Path,
    summary_out: Option<PathBuf>,
) -> Result<(), String> {
    config.validate().map_err(|e| e.to_string())?;
    let report =
        pipeline::run(sources, out, config).map_err(|e| format!("pipeline failed: {e}"))?;
    eprintln!("{}", format_pipeline_report(&report, out));
    emit_summary(&report.summary, summary_out)
}

/// Write the summary JSON to `out` or stdout, with a digest on stderr.
fn emit_summary(summary: &Summary, out: Option<PathBuf>) -> Result<(), String> {
    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| format!("failed to serialize summary: {e}"))?;

    eprintln!("{}", format_summary(summary));
    match out {
        Some(path) => {
            eventlog::write_atomic(&path, json.as_bytes())
                .map_err(|e| format!("failed to write {}: {e}", path.display()))?;
            eprintln!("Summary → {}", path.display());
        }
        None => {
            println!("{json}");
        }
    }
    Ok(())
}
