mod cancel;
mod cli;
mod config;
mod cuesheet;
mod naming;
mod processor;
mod reconcile;
mod report;
mod scanner;
mod sizes;
mod tools;
mod transcode;

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use env_logger::Builder;
use log::LevelFilter;

use crate::cancel::CancellationToken;
use crate::processor::DirectoryProcessor;
use crate::reconcile::{AlbumNameResolver, LoftyTagStore, PromptResolver, Reconciler, SkipAmbiguous};
use crate::scanner::{Scanner, WalkOutcome};
use crate::tools::TargetFormat;

fn main() {
    match run() {
        Ok(outcome) => std::process::exit(outcome.exit_code()),
        Err(error) => {
            eprintln!("{error:?}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<WalkOutcome> {
    let cli_args = cli::CliArgs::parse();

    let config = config::Config::from_args(cli_args)?;
    init_logging(config.quiet);

    let cancel = CancellationToken::new();
    install_interrupt_handler(&cancel)?;

    let processor = DirectoryProcessor::new(&config.tools, TargetFormat::CD, &cancel);
    let scanner = Scanner::new(
        &config.root,
        config.excluded_dirs.clone(),
        config.follow_symlinks,
    );
    let mut report = report::Report::default();

    log::info!(
        "Starting traversal from base directory '{}'",
        config.root.display()
    );
    let mut outcome = scanner.run(&processor, &cancel, config.failure_policy, &mut report);

    match outcome {
        WalkOutcome::Completed if config.reconcile => {
            outcome = reconcile(&config, &cancel, &mut report);
        }
        WalkOutcome::Completed => log::info!("Skipping multi-disc reconciliation as requested."),
        WalkOutcome::Interrupted => log::warn!("Traversal interrupted; skipping reconciliation."),
        WalkOutcome::Aborted => log::error!("Traversal stopped after an error; skipping reconciliation."),
    }

    report.emit_summary();

    if let Some(summary_path) = &config.summary_json {
        write_summary(summary_path, &report)?;
    }

    if outcome == WalkOutcome::Completed {
        log::info!("Completed traversal and processing.");
    }
    Ok(outcome)
}

fn reconcile(
    config: &config::Config,
    cancel: &CancellationToken,
    report: &mut report::Report,
) -> WalkOutcome {
    let store = LoftyTagStore;
    let mut skip = SkipAmbiguous;
    let mut prompt = PromptResolver::new(io::stdin().lock(), io::stderr());
    let resolver: &mut dyn AlbumNameResolver = if config.interactive {
        &mut prompt
    } else {
        &mut skip
    };

    log::info!("Reconciling multi-disc releases under '{}'", config.root.display());
    Reconciler::new(&store, resolver, cancel, config.follow_symlinks).run(&config.root, report)
}

fn install_interrupt_handler(cancel: &CancellationToken) -> Result<()> {
    let cancel = cancel.clone();
    ctrlc::set_handler(move || {
        if cancel.cancel() {
            log::warn!("Interrupt received; stopping after the current step.");
        }
    })
    .context("failed to install interrupt handler")
}

fn init_logging(quiet: bool) {
    let default_level = if quiet { "error" } else { "info" };

    let mut builder =
        Builder::from_env(env_logger::Env::default().default_filter_or(default_level));
    if quiet {
        builder.filter_level(LevelFilter::Error);
    }
    let _ = builder.try_init();
}

fn write_summary(path: &Path, report: &report::Report) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create directories for summary '{}'",
                parent.display()
            )
        })?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create summary file '{}'", path.display()))?;
    let writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &report.summary())
        .with_context(|| format!("failed to write JSON summary to '{}'", path.display()))?;
    Ok(())
}
