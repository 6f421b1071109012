//! Progress reporting utilities using indicatif.
//!
//! The bar draws to stderr so report output on stdout stays clean. The ETA
//! shown is the builder's reuse-aware estimate, not indicatif's built-in
//! `{eta}`, which would average reused records into the per-item cost.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// One progress tick from the collection loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Results collected so far (1-based).
    pub done: usize,
    /// Total files discovered this pass.
    pub total: usize,
    /// Results that required a fresh decode.
    pub computed_done: usize,
    /// Results reused from the prior catalogue.
    pub reused_done: usize,
    /// Estimated time to completion; `None` until a computed item finishes.
    pub eta: Option<Duration>,
    /// Path of the item just finished, relative to the root.
    pub path: String,
}

/// Receives build progress from the collection loop.
///
/// Implement this trait to observe a build pass without coupling to a
/// terminal.
pub trait BuildProgress: Send + Sync {
    /// Called once discovery and planning are done, before any work runs.
    ///
    /// # Arguments
    ///
    /// * `total` - Number of files discovered this pass
    /// * `to_compute` - How many of them need a fresh decode
    fn on_compute_start(&self, total: usize, to_compute: usize);

    /// Called after each collected result.
    fn on_item(&self, update: &ProgressUpdate);

    /// Called when the compute phase ends, normally or not.
    fn on_compute_end(&self);
}

/// Progress reporter using indicatif.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, no progress bar will be displayed.
    ///
    /// # Examples
    ///
    /// ```
    /// use imagedex::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
        }
    }

    fn bar_style(&self) -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {prefix} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }
}

impl BuildProgress for Progress {
    fn on_compute_start(&self, total: usize, to_compute: usize) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
        pb.set_style(self.bar_style());
        pb.set_prefix(format!("(0 computed, 0 reused, {} pending)", to_compute));
        let mut bar = self.bar.lock().unwrap();
        *bar = Some(pb);
    }

    fn on_item(&self, update: &ProgressUpdate) {
        if self.quiet {
            return;
        }

        if let Some(ref pb) = *self.bar.lock().unwrap() {
            pb.set_position(update.done as u64);
            pb.set_prefix(format!(
                "({} computed, {} reused, ETA {})",
                update.computed_done,
                update.reused_done,
                format_eta(update.eta)
            ));
            pb.set_message(truncate_path(&update.path, 30));
        }
    }

    fn on_compute_end(&self) {
        if self.quiet {
            return;
        }

        if let Some(pb) = self.bar.lock().unwrap().take() {
            pb.finish_and_clear();
        }
    }
}

/// Format an optional ETA as h:mm:ss, or a placeholder before the first
/// computed item provides an estimate.
fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        Some(d) => {
            let total = d.as_secs();
            format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
        }
        None => "-:--:--".to_string(),
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.len() <= max_len {
        return path.to_string();
    }

    let path_buf = std::path::Path::new(path);
    let file_name = path_buf
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    if file_name.len() >= max_len {
        // Count chars rather than bytes so multibyte names cannot split.
        let keep = max_len.saturating_sub(3);
        let skip = file_name.chars().count().saturating_sub(keep);
        let tail: String = file_name.chars().skip(skip).collect();
        return format!("...{}", tail);
    }

    format!(".../{}", file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_eta_placeholder_until_known() {
        assert_eq!(format_eta(None), "-:--:--");
        assert_eq!(format_eta(Some(Duration::from_secs(3725))), "1:02:05");
    }

    #[test]
    fn test_truncate_path_keeps_short_paths() {
        assert_eq!(truncate_path("a/b.jpg", 30), "a/b.jpg");
        assert_eq!(
            truncate_path("deeply/nested/directory/tree/image.jpg", 30),
            ".../image.jpg"
        );
    }

    #[test]
    fn test_truncate_path_handles_multibyte_names() {
        let long = "альбом/фотография-из-отпуска-две-тысячи.jpg";
        let shown = truncate_path(long, 30);
        assert!(shown.starts_with("..."));
        assert!(shown.chars().count() <= 30);
    }
}
