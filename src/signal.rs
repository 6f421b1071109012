//! Signal handling for graceful shutdown.
//!
//! One Ctrl+C handler is installed for the whole process; it flips a shared
//! `AtomicBool` that the build collection loop polls between results. Nothing
//! is torn down from the signal context itself, so an interrupted build pass
//! still persists its partial catalogue before exiting.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared shutdown flag for coordinated termination.
///
/// Clones share one underlying flag, so a handler can live in `main` while
/// its flag travels into worker configuration.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with the flag initially unset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if shutdown has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Manually request a shutdown, as the signal handler would.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clone of the underlying flag, for handing to worker configuration.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use imagedex::catalogue::BuildConfig;
    /// use imagedex::signal::ShutdownHandler;
    ///
    /// let handler = ShutdownHandler::new();
    /// let config = BuildConfig::default().with_shutdown_flag(handler.get_flag());
    /// ```
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Reset the flag to `false`.
    ///
    /// Used when the process-wide handler is handed out again for a new run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C handler, once, and hand out its flag.
///
/// Later calls reuse the installed handler with its flag reset, so parallel
/// tests can all drive the application entry point without fighting over
/// signal registration. When registration fails because other code already
/// claimed the signal, the returned handler has no hook but still responds
/// to [`ShutdownHandler::request_shutdown`].
pub fn install_handler() -> ShutdownHandler {
    let handler = GLOBAL_HANDLER.get_or_init(|| {
        let handler = ShutdownHandler::new();
        let flag = handler.get_flag();
        let hooked = ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);

            let _ = writeln!(std::io::stderr(), "\nInterrupted. Finishing up...");
            let _ = std::io::stderr().flush();

            log::info!("Shutdown signal received");
        });
        if let Err(err) = hooked {
            log::debug!("Ctrl+C handler unavailable ({err}), shutdown is manual only");
        }
        handler
    });
    handler.reset();
    handler.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_starts_unset() {
        let handler = ShutdownHandler::new();
        assert!(!handler.is_shutdown_requested());
    }

    #[test]
    fn test_request_then_reset_round_trips() {
        let handler = ShutdownHandler::new();
        handler.request_shutdown();
        assert!(handler.is_shutdown_requested());

        handler.reset();
        assert!(!handler.is_shutdown_requested());
    }

    #[test]
    fn test_flag_and_clones_share_state() {
        let handler = ShutdownHandler::new();
        let flag = handler.get_flag();
        let cloned = handler.clone();

        flag.store(true, Ordering::SeqCst);
        assert!(handler.is_shutdown_requested());
        assert!(cloned.is_shutdown_requested());
    }

    #[test]
    fn test_install_handler_reuses_process_global() {
        let first = install_handler();
        first.request_shutdown();

        // A later install hands back the same flag, reset for the new run.
        let second = install_handler();
        assert!(!second.is_shutdown_requested());

        second.request_shutdown();
        assert!(first.is_shutdown_requested());
    }

    #[test]
    fn test_shutdown_handler_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ShutdownHandler>();
    }
}
