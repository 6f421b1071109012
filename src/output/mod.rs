//! Output formatters for match results.
//!
//! - JSON for automation and scripting
//! - HTML for visual review of query/match pairs
//!
//! # Example
//!
//! ```no_run
//! use imagedex::catalogue::Catalogue;
//! use imagedex::matcher::Matcher;
//! use imagedex::output::JsonReport;
//! use std::path::Path;
//!
//! let catalogue = Catalogue::load(Path::new("photos.json")).unwrap();
//! let matcher = Matcher::new(&catalogue).unwrap();
//! # let results = Vec::new();
//! let report = JsonReport::new(&catalogue.root_path, &results, &[]);
//! println!("{}", report.to_json_pretty().unwrap());
//! ```

pub mod html;
pub mod json;

// Re-export main types
pub use html::HtmlReport;
pub use json::JsonReport;
