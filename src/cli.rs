//! Command-line interface definitions.
//!
//! All arguments, subcommands, and options live here, using the clap derive
//! API. Global options (verbosity, color, error format) apply to every
//! subcommand.
//!
//! # Example
//!
//! ```bash
//! # Build or refresh the fingerprint catalogue for a photo tree
//! imagedex build ~/photos --catalogue photos.json
//!
//! # Resume after an interrupt; only new or changed files are decoded
//! imagedex build ~/photos --catalogue photos.json
//!
//! # Find the catalogued original for downscaled copies
//! imagedex match --catalogue photos.json thumb1.jpg thumb2.jpg
//!
//! # Verbose mode for debugging
//! imagedex -v build ~/photos --catalogue photos.json
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Perceptual image catalogue builder and matcher.
///
/// imagedex fingerprints every image under a root directory with three
/// perceptual hashes, persists them as a resumable catalogue, and matches
/// query images against the catalogue by majority vote across the hashes.
#[derive(Debug, Parser)]
#[command(name = "imagedex")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Emit errors as JSON on stderr, for scripting
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build or refresh the catalogue for a directory tree
    Build(BuildArgs),
    /// Match query images against an existing catalogue
    Match(MatchArgs),
}

/// Arguments for the build subcommand.
#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Root directory whose images are catalogued
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Catalogue file to create or resume
    #[arg(short, long, value_name = "FILE")]
    pub catalogue: PathBuf,

    /// Number of fingerprint worker threads
    ///
    /// Lower values reduce disk thrashing on HDDs.
    #[arg(long, value_name = "N", default_value = "4")]
    pub threads: usize,

    /// Seconds between checkpoint saves of the catalogue (0 disables)
    #[arg(long, value_name = "SECS", default_value = "600")]
    pub checkpoint_secs: u64,

    /// File-name glob patterns to catalogue, comma separated
    #[arg(
        long,
        value_name = "GLOB[,GLOB...]",
        value_delimiter = ',',
        default_value = "*.jpg,*.JPG,*.png,*.PNG"
    )]
    pub patterns: Vec<String>,

    /// Match patterns case-insensitively
    #[arg(long)]
    pub case_insensitive: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Ignore any existing catalogue and rebuild from scratch
    #[arg(long)]
    pub fresh: bool,
}

/// Arguments for the match subcommand.
#[derive(Debug, Args)]
pub struct MatchArgs {
    /// Catalogue file to match against
    #[arg(short, long, value_name = "FILE")]
    pub catalogue: PathBuf,

    /// Query images to look up
    #[arg(value_name = "QUERY", required = true)]
    pub queries: Vec<PathBuf>,

    /// Write the results as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Write the results as an HTML report to this file
    #[arg(long, value_name = "FILE")]
    pub html: Option<PathBuf>,
}
