//! imagedex - Perceptual Image Catalogue Builder and Matcher
//!
//! Fingerprints every image under a root directory with three perceptual
//! hashes (average, DCT and gradient based), persists them as a resumable
//! JSON catalogue, and matches query images against the catalogue by
//! majority vote across the hash kinds.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use yansi::Paint;

pub mod catalogue;
pub mod cli;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod matcher;
pub mod output;
pub mod progress;
pub mod signal;

pub use fingerprint::Fingerprint;

use crate::catalogue::{BuildConfig, Catalogue, CatalogueBuilder};
use crate::cli::{BuildArgs, Cli, Commands, MatchArgs};
use crate::error::ExitCode;
use crate::fingerprint::PerceptualService;
use crate::matcher::Matcher;
use crate::output::{HtmlReport, JsonReport};
use crate::progress::{BuildProgress, Progress};
use crate::signal::ShutdownHandler;

/// Run the application with parsed CLI arguments.
///
/// Returns the exit code for successful runs; errors bubble up for the
/// binary entry point to map onto exit codes and report.
///
/// # Errors
///
/// Any build or match failure, including interrupts and root mismatches.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    if cli.no_color {
        yansi::disable();
    }

    let handler = signal::install_handler();

    match cli.command {
        Commands::Build(args) => run_build(args, &handler, cli.quiet),
        Commands::Match(args) => run_match(args, cli.quiet),
    }
}

fn run_build(args: BuildArgs, handler: &ShutdownHandler, quiet: bool) -> anyhow::Result<ExitCode> {
    let progress: Arc<dyn BuildProgress> = Arc::new(Progress::new(quiet || args.no_progress));

    let config = BuildConfig::default()
        .with_workers(args.threads)
        .with_checkpoint_interval(Duration::from_secs(args.checkpoint_secs))
        .with_patterns(args.patterns)
        .with_case_insensitive(args.case_insensitive)
        .with_resume(!args.fresh)
        .with_shutdown_flag(handler.get_flag())
        .with_progress(progress);

    let builder = CatalogueBuilder::new(
        args.root,
        args.catalogue,
        Arc::new(PerceptualService::new()),
        config,
    );

    let report = builder.build()?;

    if !quiet {
        println!(
            "Catalogued {} images in {} ({} computed, {} reused, {} pruned, {} checkpoints)",
            report.discovered,
            format_duration(report.duration),
            report.computed,
            report.reused,
            report.pruned,
            report.checkpoints_written
        );
    }

    Ok(ExitCode::Success)
}

fn run_match(args: MatchArgs, quiet: bool) -> anyhow::Result<ExitCode> {
    let catalogue = Catalogue::load(&args.catalogue)
        .with_context(|| format!("Could not load catalogue {}", args.catalogue.display()))?;
    let matcher = Matcher::new(&catalogue)?;
    log::info!(
        "Matching {} queries against {} records",
        args.queries.len(),
        matcher.candidate_count()
    );

    let service = PerceptualService::new();
    let mut results = Vec::new();
    let mut failures: Vec<(PathBuf, String)> = Vec::new();

    for query in &args.queries {
        match matcher.match_image(&service, query) {
            Ok(result) => results.push(result),
            Err(e) => {
                log::warn!("No match for {}: {}", query.display(), e);
                failures.push((query.clone(), e.to_string()));
            }
        }
    }

    // Highest-confidence matches first; the sort is stable, so equal vote
    // counts keep their query order.
    results.sort_by(|a, b| b.votes.cmp(&a.votes));

    if !quiet {
        for result in &results {
            let full = catalogue.root_path.join(&result.matched);
            let votes = format!("{}/3", result.votes);
            let votes = match result.votes {
                3 => format!("{}", votes.green()),
                2 => format!("{}", votes.yellow()),
                _ => format!("{}", votes.red()),
            };
            println!("{} -> {} [{}]", result.query.display(), full.display(), votes);
        }
        for (query, error) in &failures {
            println!("{} -> no match ({})", query.display(), error);
        }
    }

    if let Some(ref path) = args.json {
        let mut file = File::create(path)
            .with_context(|| format!("Could not create {}", path.display()))?;
        JsonReport::new(&catalogue.root_path, &results, &failures).write_to(&mut file, true)?;
        log::info!("Wrote JSON report to {}", path.display());
    }
    if let Some(ref path) = args.html {
        let mut file = File::create(path)
            .with_context(|| format!("Could not create {}", path.display()))?;
        HtmlReport::new(&catalogue.root_path, &results, &failures).write_to(&mut file)?;
        log::info!("Wrote HTML report to {}", path.display());
    }

    if results.is_empty() {
        anyhow::bail!(
            "none of the {} queries produced a match",
            args.queries.len()
        );
    }
    if failures.is_empty() {
        Ok(ExitCode::Success)
    } else {
        // Some queries matched, some failed: the reports carry both, and the
        // process signals the failure.
        Ok(ExitCode::GeneralError)
    }
}

/// Format a duration as a human-readable string.
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}.{:03}s", secs, duration.subsec_millis())
    } else {
        format!("{}ms", duration.subsec_millis())
    }
}
