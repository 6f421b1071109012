//! Logging setup on the `log` facade with an `env_logger` backend.
//!
//! The effective level comes from, in priority order:
//!
//! 1. `RUST_LOG`, when set
//! 2. CLI flags: `--quiet` (errors only) or `-v`/`-vv`
//! 3. Default: info
//!
//! Debug builds log timestamps and, at `-v` and above, module paths.
//! Release builds keep each line down to level and message.

use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Initialize logging from the CLI verbosity flags.
///
/// Call before anything logs. Output goes to stderr, alongside the progress
/// bar, so stdout stays reserved for reports. Only the first call per
/// process installs a logger; later calls are no-ops, so tests can drive
/// the application entry point repeatedly.
///
/// # Example
///
/// ```rust,no_run
/// use imagedex::logging::init_logging;
///
/// init_logging(1, false);
/// log::debug!("visible at -v");
/// ```
pub fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = Builder::new();

    if env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    } else {
        builder.filter_level(level_from_flags(verbose, quiet));
    }

    let with_modules = cfg!(debug_assertions) && verbose >= 1;
    builder.format(move |buf, record| {
        let style = buf.default_level_style(record.level());
        if cfg!(debug_assertions) {
            write!(buf, "{} ", buf.timestamp_seconds())?;
        }
        write!(buf, "{style}{:<5}{style:#} ", record.level())?;
        if with_modules {
            write!(buf, "[{}] ", record.module_path().unwrap_or("unknown"))?;
        }
        writeln!(buf, "{}", record.args())
    });

    let _ = builder.try_init();
}

/// Map the CLI flags to a level. `quiet` wins over any `-v` count.
fn level_from_flags(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}
