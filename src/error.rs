//! Exit codes and terminal error reporting.

use crate::catalogue::BuildError;
use serde::Serialize;

/// Process exit codes reported by the CLI.
///
/// - 0: Success
/// - 1: General error (unexpected failure)
/// - 2: Root mismatch (catalogue belongs to a different root directory)
/// - 3: Partial (pass aborted mid-way; partial catalogue was persisted)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// The requested operation completed.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// The catalogue was built for a different root directory.
    RootMismatch = 2,
    /// The pass aborted after persisting partial results.
    Partial = 3,
    /// Interrupted by user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Numeric value passed to `std::process::exit`.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Machine-readable code prefix (e.g. `ID002`).
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "ID000",
            Self::GeneralError => "ID001",
            Self::RootMismatch => "ID002",
            Self::Partial => "ID003",
            Self::Interrupted => "ID130",
        }
    }

    /// Maps a top-level failure to the exit code the process reports.
    ///
    /// Build failures carry their own classification; anything else is a
    /// general error.
    #[must_use]
    pub fn classify(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<BuildError>() {
            Some(BuildError::Interrupted) => Self::Interrupted,
            Some(BuildError::RootMismatch { .. }) => Self::RootMismatch,
            Some(BuildError::Compute { .. }) => Self::Partial,
            Some(_) | None => Self::GeneralError,
        }
    }
}

/// Payload printed for `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// Machine-readable code (e.g. `ID001`).
    pub code: String,
    /// Numeric exit code the process terminates with.
    pub exit_code: i32,
    /// Top-level error message.
    pub message: String,
    /// Underlying causes, outermost first.
    pub causes: Vec<String>,
    /// Whether the failure was a Ctrl+C interrupt.
    pub interrupted: bool,
}

impl StructuredError {
    /// Capture an error chain for JSON output.
    #[must_use]
    pub fn from_error(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: err.to_string(),
            causes: err.chain().skip(1).map(|c| c.to_string()).collect(),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}

/// Print a failure to stderr and return the exit code to terminate with.
///
/// With `json_errors` the whole report is one JSON object so wrapping tools
/// can parse it; otherwise a `[ID###]`-prefixed line carrying the full
/// cause chain.
pub fn report_failure(err: &anyhow::Error, json_errors: bool) -> ExitCode {
    let exit_code = ExitCode::classify(err);
    if json_errors {
        match serde_json::to_string_pretty(&StructuredError::from_error(err, exit_code)) {
            Ok(json) => eprintln!("{json}"),
            Err(_) => eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err),
        }
    } else {
        eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err);
    }
    exit_code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_maps_build_failures() {
        let interrupted = anyhow::Error::new(BuildError::Interrupted);
        assert_eq!(ExitCode::classify(&interrupted), ExitCode::Interrupted);

        let mismatch = anyhow::Error::new(BuildError::RootMismatch {
            recorded: "/photos/old".into(),
            requested: "/photos/new".into(),
        });
        assert_eq!(ExitCode::classify(&mismatch), ExitCode::RootMismatch);
    }

    #[test]
    fn test_classify_defaults_to_general_error() {
        let err = anyhow::anyhow!("catalogue drive unplugged");
        assert_eq!(ExitCode::classify(&err), ExitCode::GeneralError);

        let not_found = anyhow::Error::new(BuildError::PathNotFound("/gone".into()));
        assert_eq!(ExitCode::classify(&not_found), ExitCode::GeneralError);
    }

    #[test]
    fn test_code_prefix_tracks_numeric_value() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::Success.code_prefix(), "ID000");
        assert_eq!(ExitCode::Partial.as_i32(), 3);
        assert_eq!(ExitCode::Partial.code_prefix(), "ID003");
        assert_eq!(ExitCode::Interrupted.as_i32(), 130);
        assert_eq!(ExitCode::Interrupted.code_prefix(), "ID130");
    }

    #[test]
    fn test_structured_error_captures_cause_chain() {
        use anyhow::Context;

        let err = Err::<(), _>(anyhow::anyhow!("permission denied"))
            .context("saving catalogue")
            .unwrap_err();
        let structured = StructuredError::from_error(&err, ExitCode::GeneralError);

        assert_eq!(structured.code, "ID001");
        assert_eq!(structured.exit_code, 1);
        assert_eq!(structured.message, "saving catalogue");
        assert_eq!(structured.causes, vec!["permission denied".to_string()]);
        assert!(!structured.interrupted);
    }

    #[test]
    fn test_structured_error_flags_interrupts() {
        let err = anyhow::Error::new(BuildError::Interrupted);
        let structured = StructuredError::from_error(&err, ExitCode::classify(&err));

        assert!(structured.interrupted);
        assert_eq!(structured.exit_code, 130);
        assert!(structured.causes.is_empty());
    }
}
