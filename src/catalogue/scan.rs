//! Image discovery: recursive walk filtered by file-name glob patterns.

use ignore::overrides::OverrideBuilder;
use std::path::Path;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use walkdir::WalkDir;

/// Patterns every build uses unless the caller supplies its own.
///
/// Matching is literal per pattern; pass `case_insensitive` to collapse the
/// upper/lower variants instead.
pub const DEFAULT_PATTERNS: [&str; 4] = ["*.jpg", "*.JPG", "*.png", "*.PNG"];

/// Errors building the glob matcher.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid file pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: ignore::Error,
    },

    #[error("failed to build file patterns: {0}")]
    Build(#[source] ignore::Error),
}

/// Recursively enumerate files under `root` whose names match `patterns`.
///
/// Returns root-relative keys: forward-slash separated and NFC-normalized,
/// so the same file maps to the same record key across platforms. Traversal
/// order is not guaranteed stable across runs. Unreadable entries are
/// logged and skipped.
pub fn find_images(
    root: &Path,
    patterns: &[String],
    case_insensitive: bool,
) -> Result<Vec<String>, ScanError> {
    let mut builder = OverrideBuilder::new(root);
    builder
        .case_insensitive(case_insensitive)
        .map_err(ScanError::Build)?;
    for pattern in patterns {
        builder.add(pattern).map_err(|e| ScanError::Pattern {
            pattern: pattern.clone(),
            source: e,
        })?;
    }
    let matcher = builder.build().map_err(ScanError::Build)?;

    let mut found = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if !matcher.matched(entry.path(), false).is_whitelist() {
            continue;
        }
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        found.push(relative_key(rel));
    }
    Ok(found)
}

/// Stable record key for a root-relative path.
fn relative_key(rel: &Path) -> String {
    let joined = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    joined.nfc().collect()
}
