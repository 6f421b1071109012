//! JSON output formatter for match results.
//!
//! Provides machine-readable output for scripting and automation.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "root": "/data/photos",
//!   "results": [
//!     {
//!       "query": "thumb.jpg",
//!       "matched": "2019/beach.jpg",
//!       "matched_path": "/data/photos/2019/beach.jpg",
//!       "votes": 3,
//!       "candidates": [
//!         {"kind": "aHash", "path": "2019/beach.jpg", "distance": 2}
//!       ]
//!     }
//!   ],
//!   "failures": [
//!     {"query": "missing.jpg", "error": "Failed to load image missing.jpg: ..."}
//!   ]
//! }
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::matcher::{KindWinner, MatchResult};

/// One successful query in JSON form.
#[derive(Debug, Clone, Serialize)]
pub struct JsonQueryResult {
    /// The query image path as given on the command line.
    pub query: String,
    /// Winning record path, relative to the catalogue root.
    pub matched: String,
    /// Winning record path joined onto the root.
    pub matched_path: String,
    /// Number of fingerprint kinds that voted for the winner.
    pub votes: usize,
    /// Per-kind nominations, in tally order.
    pub candidates: Vec<KindWinner>,
}

impl JsonQueryResult {
    /// Build the JSON view of one match result.
    #[must_use]
    pub fn from_match(root: &Path, result: &MatchResult) -> Self {
        Self {
            query: result.query.display().to_string(),
            matched: result.matched.clone(),
            matched_path: root.join(&result.matched).display().to_string(),
            votes: result.votes,
            candidates: result.candidates.clone(),
        }
    }
}

/// One failed query in JSON form.
#[derive(Debug, Clone, Serialize)]
pub struct JsonFailure {
    /// The query image path as given on the command line.
    pub query: String,
    /// Human-readable reason the query produced no match.
    pub error: String,
}

/// Complete JSON report structure.
///
/// Results are emitted in the order given; the caller decides the sort.
#[derive(Debug, Clone, Serialize)]
pub struct JsonReport {
    /// The catalogue's root directory.
    pub root: String,
    /// Successful matches.
    pub results: Vec<JsonQueryResult>,
    /// Queries that produced no match.
    pub failures: Vec<JsonFailure>,
}

impl JsonReport {
    /// Create a new JSON report.
    ///
    /// # Arguments
    ///
    /// * `root` - The catalogue root, used to absolutize matched paths
    /// * `results` - Successful matches, already sorted by the caller
    /// * `failures` - Failed queries with their error messages
    #[must_use]
    pub fn new(root: &Path, results: &[MatchResult], failures: &[(PathBuf, String)]) -> Self {
        Self {
            root: root.display().to_string(),
            results: results
                .iter()
                .map(|r| JsonQueryResult::from_match(root, r))
                .collect(),
            failures: failures
                .iter()
                .map(|(query, error)| JsonFailure {
                    query: query.display().to_string(),
                    error: error.clone(),
                })
                .collect(),
        }
    }

    /// Serialize to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON to a writer, followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
