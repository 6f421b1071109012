//! HTML output formatter for match results.
//!
//! Renders a self-contained report using the `askama` template engine: all
//! CSS is embedded, image paths are escaped, and dark mode follows the system
//! media query. Query and matched images are referenced by path, so the
//! report shows thumbnails when opened next to the files it describes.
//!
//! # Usage
//!
//! ```rust,ignore
//! use imagedex::output::html::HtmlReport;
//!
//! let report = HtmlReport::new(&root, &results, &failures);
//! let html = report.to_html().unwrap();
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use askama::Template;
use chrono::Local;

use crate::matcher::MatchResult;

/// Complete HTML report structure for the Askama template.
#[derive(Template)]
#[template(path = "report.html")]
pub struct HtmlReport {
    /// Formatted generation timestamp
    pub timestamp: String,
    /// Application version
    pub version: String,
    /// The catalogue's root directory
    pub root: String,
    /// One card per successful match
    pub rows: Vec<HtmlMatchRow>,
    /// Queries that produced no match
    pub failures: Vec<HtmlFailureRow>,
}

/// A successful match formatted for HTML presentation.
pub struct HtmlMatchRow {
    /// Query path as given, used as caption text
    pub query: String,
    /// Query path used as the image source
    pub query_src: String,
    /// Matched record path relative to the root
    pub matched: String,
    /// Matched record path joined onto the root, used as the image source
    pub matched_src: String,
    /// Vote count for the winner
    pub votes: usize,
    /// Whether all three kinds agreed
    pub unanimous: bool,
    /// Per-kind nominations
    pub winners: Vec<HtmlKindRow>,
}

/// One fingerprint kind's nomination.
pub struct HtmlKindRow {
    /// Kind display name (aHash, pHash, dHash)
    pub kind: String,
    /// Nominated record path
    pub path: String,
    /// Hamming distance to the query
    pub distance: u32,
}

/// A failed query formatted for HTML presentation.
pub struct HtmlFailureRow {
    /// Query path as given
    pub query: String,
    /// Why it failed
    pub error: String,
}

impl HtmlReport {
    /// Create a new HTML report.
    ///
    /// # Arguments
    ///
    /// * `root` - The catalogue root, used to absolutize matched paths
    /// * `results` - Successful matches, already sorted by the caller
    /// * `failures` - Failed queries with their error messages
    #[must_use]
    pub fn new(root: &Path, results: &[MatchResult], failures: &[(PathBuf, String)]) -> Self {
        let rows = results
            .iter()
            .map(|result| {
                let matched_src = root.join(&result.matched).display().to_string();
                HtmlMatchRow {
                    query: result.query.display().to_string(),
                    query_src: result.query.display().to_string(),
                    matched: result.matched.clone(),
                    matched_src,
                    votes: result.votes,
                    unanimous: result.votes == crate::fingerprint::HashKind::ALL.len(),
                    winners: result
                        .candidates
                        .iter()
                        .map(|w| HtmlKindRow {
                            kind: w.kind.to_string(),
                            path: w.path.clone(),
                            distance: w.distance,
                        })
                        .collect(),
                }
            })
            .collect();

        Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            root: root.display().to_string(),
            rows,
            failures: failures
                .iter()
                .map(|(query, error)| HtmlFailureRow {
                    query: query.display().to_string(),
                    error: error.clone(),
                })
                .collect(),
        }
    }

    /// Generate the HTML string using the embedded template.
    ///
    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub fn to_html(&self) -> Result<String, askama::Error> {
        self.render()
    }

    /// Write the report to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), HtmlOutputError> {
        let html = self.to_html()?;
        writer.write_all(html.as_bytes())?;
        Ok(())
    }
}

/// Errors that can occur during HTML report generation.
#[derive(thiserror::Error, Debug)]
pub enum HtmlOutputError {
    /// Template rendering error
    #[error("HTML template error: {0}")]
    Template(#[from] askama::Error),

    /// I/O error during writing
    #[error("I/O error during HTML generation: {0}")]
    Io(#[from] std::io::Error),
}
