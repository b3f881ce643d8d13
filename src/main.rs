//! romsync CLI
//!
//! Copy files matching a known-good SHA-256 catalog out of a collection.

mod logging;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use romsync::catalog::load_catalog;
use romsync::config::{RunConfig, DEFAULT_CATALOG, DEFAULT_DESTINATION, DEFAULT_REPORT};
use romsync::reconcile::{reconcile, reconcile_with_progress, RunContext};
use romsync::report::{format_catalog, format_report, write_problem_report};
use romsync::types::OutputFormat;
use romsync::Error;

/// Exit status for a run that finished but left entries unresolved.
const EXIT_INCOMPLETE: u8 = 2;

#[derive(Parser)]
#[command(name = "romsync")]
#[command(about = "Collect files matching a known-good SHA-256 catalog")]
#[command(version)]
struct Cli {
    /// Output verbose debugging info
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy catalogued files from a collection into the destination
    Sync {
        /// Collection to search (searched recursively)
        #[arg(short, long)]
        source: PathBuf,

        /// Destination folder
        #[arg(short, long, default_value = DEFAULT_DESTINATION)]
        destination: PathBuf,

        /// Known-good checksum list
        #[arg(short, long, default_value = DEFAULT_CATALOG)]
        catalog: PathBuf,

        /// Overwrite destination files whose content is wrong
        #[arg(short, long)]
        force: bool,

        /// Write missing and mismatched entries to the report file
        #[arg(short, long)]
        missing: bool,

        /// Report file used with --missing
        #[arg(long, default_value = DEFAULT_REPORT)]
        report_path: PathBuf,

        /// Decide everything but write nothing to the destination
        #[arg(long)]
        dry_run: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormatArg,
    },

    /// List the entries of a checksum catalog
    Catalog {
        /// Known-good checksum list
        #[arg(short, long, default_value = DEFAULT_CATALOG)]
        catalog: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormatArg,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormatArg {
    Human,
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Sync {
            source,
            destination,
            catalog,
            force,
            missing,
            report_path,
            dry_run,
            format,
        } => {
            let config = RunConfig {
                source_root: source,
                destination_root: destination,
                catalog_path: catalog,
                report_path,
                generate_missing_report: missing,
                force_overwrite: force,
                dry_run,
            };
            cmd_sync(config, format.into())
        }
        Commands::Catalog { catalog, format } => cmd_catalog(catalog, format.into()),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// PROGRESS HELPERS
// ============================================================================

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .expect("static spinner template"),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn progress_bar(total: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("static progress template")
            .progress_chars("█▓░"),
    );
    pb.set_message(msg.to_string());
    pb
}

// ============================================================================
// COMMAND HANDLERS
// ============================================================================

fn cmd_sync(config: RunConfig, format: OutputFormat) -> Result<ExitCode, Error> {
    let show_progress = format == OutputFormat::Human;

    // Phase 1: catalog, destination, source index
    let ctx = if show_progress {
        let sp = spinner("Indexing source files...");
        let result = RunContext::prepare_with_progress(config, |scanned| {
            sp.set_message(format!("Scanned {} files...", scanned));
        });
        match result {
            Ok(ctx) => {
                sp.finish_with_message(format!(
                    "Scanned {} files, {} of {} catalogued names found",
                    ctx.index.scanned,
                    ctx.index.len(),
                    ctx.catalog.len()
                ));
                ctx
            }
            Err(e) => {
                sp.finish_and_clear();
                return Err(e);
            }
        }
    } else {
        RunContext::prepare(config)?
    };

    // Phase 2: per-entry reconciliation
    let report = if show_progress {
        let pb = progress_bar(ctx.catalog.len() as u64, "Checking...");
        let report = reconcile_with_progress(&ctx, |_, entry| {
            pb.set_message(entry.name.clone());
            pb.inc(1);
        });
        pb.finish_with_message("Done");
        report
    } else {
        reconcile(&ctx)
    };

    let output = format_report(&report, format);
    print!("{}", output);
    if !output.ends_with('\n') {
        println!();
    }

    if ctx.config.generate_missing_report {
        write_problem_report(&report, &ctx.config.report_path)?;
        info!(path = %ctx.config.report_path.display(), "Wrote problem report");
    }

    if report.summary().is_complete() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_INCOMPLETE))
    }
}

fn cmd_catalog(path: PathBuf, format: OutputFormat) -> Result<ExitCode, Error> {
    let catalog = load_catalog(&path)?;

    let output = format_catalog(&catalog, format);
    print!("{}", output);
    if !output.ends_with('\n') {
        println!();
    }

    Ok(ExitCode::SUCCESS)
}
