//! Main entry point for the `dedup` CLI application.
//!
//! # Responsibilities
//! - Parses CLI arguments via [`clap`] and merges them over the TOML config
//! - Installs the logger and a Ctrl-C handler that cancels hashing
//! - Dispatches to [`dedup::run`] and renders the result
//!
//! Exits non-zero when a run cannot complete, e.g. the directory cannot be
//! listed.

use anyhow::{Context, Result};
use clap::Parser;
use dedup::cli::{Args, Command, IndexArgs, StateArgs};
use dedup::config::Config;
use dedup::metrics::{print_profile_summary, save_stats_json};
use dedup::output::{self, terminal};
use dedup::progress::{BarSink, LogSink, ProgressSink};
use dedup::run::{IndexOptions, run_dryrun, run_index, run_status};
use log::{info, warn};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn load_config(args: &Args) -> Config {
    let loaded = match &args.config {
        Some(path) => Config::load(path),
        None => Config::load_default(),
    };
    loaded.unwrap_or_else(|e| {
        eprintln!("Warning: {}; using defaults", e);
        Config::default()
    })
}

/// First Ctrl-C cancels the run, the second one exits immediately.
fn install_cancel_handler() -> Result<Arc<AtomicBool>> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            eprintln!("\nForce shutdown requested. Exiting immediately...");
            std::process::exit(130);
        }
        eprintln!("\nCancelling: finishing files in progress... (Ctrl-C again to force quit)");
    })
    .context("Failed to set Ctrl-C handler")?;
    Ok(cancel)
}

fn index(args: &IndexArgs, config: &Config) -> Result<()> {
    let cancel = install_cancel_handler()?;

    let mut opts = IndexOptions::new(&args.path);
    opts.encoding = args.encoding.unwrap_or(config.scan.encoding);
    opts.workers = args.workers.unwrap_or(config.scan.workers);
    opts.report_interval = args
        .interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.scan.report_interval());

    let sink: Arc<dyn ProgressSink> = if args.no_progress_bar {
        Arc::new(LogSink)
    } else {
        Arc::new(BarSink::new())
    };

    let report = run_index(&opts, cancel, sink)
        .with_context(|| format!("Failed to index {}", args.path.display()))?;

    terminal::render(&report, args.all_groups, io::stdout().lock())?;

    if let Some(path) = &args.output {
        let format = args.format.unwrap_or(config.output.format);
        let include_singletons = args.all_groups || config.output.include_singletons;
        output::export(&report.groups, format, include_singletons, Some(path))?;
    }

    if args.profile {
        print_profile_summary(&report.profile);
        if let Some(path) = &args.output {
            let stats = save_stats_json(path, &report.profile)?;
            println!("Performance stats saved to: {}", stats.display());
        }
    }

    if report.cancelled {
        warn!("index of {} is incomplete", report.path.display());
    }
    Ok(())
}

fn dryrun(args: &StateArgs, config: &Config) -> Result<()> {
    let encoding = args.encoding.unwrap_or(config.scan.encoding);
    let report = run_dryrun(&args.path, encoding)
        .with_context(|| format!("Failed to record scan state of {}", args.path.display()))?;
    terminal::render_dryrun(&report, io::stdout().lock())
}

fn status(args: &StateArgs, config: &Config) -> Result<()> {
    let encoding = args.encoding.unwrap_or(config.scan.encoding);
    match run_status(&args.path, encoding) {
        Ok(snapshot) => terminal::render_status(&snapshot, io::stdout().lock()),
        Err(e) if e.is_not_found() => {
            println!("{} has never been scanned", args.path.display());
            Ok(())
        }
        Err(e) => Err(e)
            .with_context(|| format!("Failed to read scan state of {}", args.path.display())),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args);
    dedup::logging::init(&config.logging, args.log_level.as_deref())?;
    info!("dedup v{}", env!("CARGO_PKG_VERSION"));

    match &args.command {
        Command::Index(index_args) => index(index_args, &config),
        Command::Dryrun(state_args) => dryrun(state_args, &config),
        Command::Status(state_args) => status(state_args, &config),
    }
}
