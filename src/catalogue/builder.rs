//! The catalogue builder: resume, prune, discover, compute, checkpoint.
//!
//! # Overview
//!
//! A build pass runs these stages in order:
//! 1. **Resume** - load the prior catalogue, verify its root, prune records
//!    whose files are gone
//! 2. **Discover** - enumerate image files under the root by glob pattern
//! 3. **Plan** - decide per file whether the prior record can be reused,
//!    repaired, or must be recomputed
//! 4. **Compute** - run the per-file work on a bounded worker pool; a single
//!    collection loop consumes results, mutates the record map, and persists
//!    checkpoints
//!
//! Workers never touch the shared record map: each returns an immutable
//! outcome (index, path, reused flag, record) over a channel, and the
//! collection loop is the only writer and the only caller of `save`. Every
//! termination path - completion, interrupt, per-item failure - ends with a
//! final persist, so no pass loses previously computed records.
//!
//! One failing file aborts the whole pass (partials are persisted). Per-item
//! isolation would preserve more progress on transient errors and is a
//! candidate improvement, but callers currently rely on a failed pass being
//! re-run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use crossbeam_channel::RecvTimeoutError;
use rayon::prelude::*;
use thiserror::Error;

use super::record::{self, FileTimes, ImageRecord, RefreshPlan};
use super::scan::{self, ScanError};
use super::store::StoreError;
use super::{Catalogue, RunTiming};
use crate::fingerprint::{FingerprintService, MeasureError};
use crate::progress::{BuildProgress, ProgressUpdate};

/// Configuration for a build pass.
#[derive(Clone)]
pub struct BuildConfig {
    /// Worker pool width for fingerprint computation.
    /// Default is 4 to keep disk and decoder pressure bounded.
    pub workers: usize,
    /// Interval between checkpoint persists of the full catalogue.
    /// Zero disables intermediate checkpoints; the final persist still runs.
    pub checkpoint_interval: Duration,
    /// File-name glob patterns selecting which files are catalogued.
    pub patterns: Vec<String>,
    /// Match patterns case-insensitively instead of literally.
    pub case_insensitive: bool,
    /// Resume from an existing catalogue at the store location.
    pub resume: bool,
    /// Optional shutdown flag observed between collected results.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress sink.
    pub progress: Option<Arc<dyn BuildProgress>>,
}

impl std::fmt::Debug for BuildConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildConfig")
            .field("workers", &self.workers)
            .field("checkpoint_interval", &self.checkpoint_interval)
            .field("patterns", &self.patterns)
            .field("case_insensitive", &self.case_insensitive)
            .field("resume", &self.resume)
            .field("shutdown_flag", &self.shutdown_flag)
            .field("progress", &self.progress.as_ref().map(|_| "<progress>"))
            .finish()
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            checkpoint_interval: Duration::from_secs(600),
            patterns: scan::DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect(),
            case_insensitive: false,
            resume: true,
            shutdown_flag: None,
            progress: None,
        }
    }
}

impl BuildConfig {
    /// Set the worker pool width.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the checkpoint interval.
    #[must_use]
    pub fn with_checkpoint_interval(mut self, interval: Duration) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    /// Set the discovery glob patterns.
    #[must_use]
    pub fn with_patterns(mut self, patterns: Vec<String>) -> Self {
        self.patterns = patterns;
        self
    }

    /// Match discovery patterns case-insensitively.
    #[must_use]
    pub fn with_case_insensitive(mut self, yes: bool) -> Self {
        self.case_insensitive = yes;
        self
    }

    /// Ignore any existing catalogue and build from empty.
    #[must_use]
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn BuildProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Errors that can end a build pass.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Resuming against a catalogue recorded for a different root.
    /// Fatal before any work: nothing is scanned and nothing is written.
    #[error("catalogue root mismatch: recorded {recorded:?}, requested {requested:?}")]
    RootMismatch {
        recorded: PathBuf,
        requested: PathBuf,
    },

    /// The requested root does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// The requested root is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The pass was cancelled by an external interrupt.
    /// Partial results were persisted before returning.
    #[error("Build interrupted by user")]
    Interrupted,

    /// One file failed to measure. The whole pass aborts; partial results
    /// were persisted before returning.
    #[error("failed to compute fingerprints for {path}: {source}")]
    Compute {
        path: String,
        #[source]
        source: MeasureError,
    },

    /// Discovery pattern construction failed.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Persisting the catalogue failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Counters from one build pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Records carried over from the loaded catalogue (before pruning).
    pub resumed_records: usize,
    /// Records removed because their file no longer exists.
    pub pruned: usize,
    /// Files discovered on disk this pass.
    pub discovered: usize,
    /// Files that had no usable prior record and were computed fresh
    /// (includes repairs, which also decode).
    pub computed: usize,
    /// Files whose prior record was fully reused.
    pub reused: usize,
    /// Intermediate checkpoint persists written during the pass.
    pub checkpoints_written: usize,
    /// Wall-clock duration of the pass.
    pub duration: Duration,
}

/// How the collection loop ended.
#[derive(Debug)]
enum RunEnd {
    Completed,
    Interrupted,
    Failed(BuildError),
}

/// The work for one discovered file, decided before dispatch so workers
/// need no access to the shared record map.
#[derive(Debug)]
enum JobKind {
    /// Copy the prior record forward without touching the file.
    Reuse(ImageRecord),
    /// Compute every field fresh.
    Recompute,
    /// Decode once and fill only the prior record's missing fields.
    Repair(ImageRecord),
}

#[derive(Debug)]
struct ComputeJob {
    index: usize,
    path: String,
    absolute: PathBuf,
    kind: JobKind,
}

impl ComputeJob {
    fn requires_decode(&self) -> bool {
        !matches!(self.kind, JobKind::Reuse(_))
    }
}

/// What a worker sends back to the collection loop.
#[derive(Debug)]
struct JobOutcome {
    index: usize,
    path: String,
    /// True when the prior record was fully reused (no decode happened).
    reused_prior: bool,
    result: Result<ImageRecord, MeasureError>,
}

/// Builds or refreshes the catalogue for one root directory.
///
/// # Example
///
/// ```no_run
/// use imagedex::catalogue::{BuildConfig, CatalogueBuilder};
/// use imagedex::fingerprint::PerceptualService;
/// use std::path::PathBuf;
/// use std::sync::Arc;
///
/// let builder = CatalogueBuilder::new(
///     PathBuf::from("/data/photos"),
///     PathBuf::from("/data/photos.json"),
///     Arc::new(PerceptualService::new()),
///     BuildConfig::default(),
/// );
/// let report = builder.build().unwrap();
/// println!("{} computed, {} reused", report.computed, report.reused);
/// ```
pub struct CatalogueBuilder<S> {
    root: PathBuf,
    location: PathBuf,
    service: Arc<S>,
    config: BuildConfig,
}

impl<S: FingerprintService> CatalogueBuilder<S> {
    /// Create a builder for `root`, persisting to `location`.
    #[must_use]
    pub fn new(root: PathBuf, location: PathBuf, service: Arc<S>, config: BuildConfig) -> Self {
        Self {
            root,
            location,
            service,
            config,
        }
    }

    /// Run one build pass.
    ///
    /// # Errors
    ///
    /// `RootMismatch`, `PathNotFound` and `NotADirectory` fail before any
    /// work. `Interrupted` and `Compute` abort mid-pass after persisting
    /// partial results. `Store` means a persist itself failed.
    pub fn build(&self) -> Result<BuildReport, BuildError> {
        let run_started = Instant::now();
        let wall_started = Local::now();

        if !self.root.exists() {
            return Err(BuildError::PathNotFound(self.root.clone()));
        }
        if !self.root.is_dir() {
            return Err(BuildError::NotADirectory(self.root.clone()));
        }

        let mut report = BuildReport::default();
        let mut catalogue = self.load_or_create(&mut report)?;

        // A resumed catalogue may carry the previous pass's flags; this pass
        // is unfinished until proven otherwise.
        catalogue.finished = false;
        catalogue.successful = false;

        log::info!("Starting scan of {}", self.root.display());
        let discovered =
            scan::find_images(&self.root, &self.config.patterns, self.config.case_insensitive)?;
        report.discovered = discovered.len();
        log::info!("Found {} images", discovered.len());

        let jobs = self.plan_jobs(&catalogue, discovered);
        let to_compute = jobs.iter().filter(|j| j.requires_decode()).count();

        if let Some(ref progress) = self.config.progress {
            progress.on_compute_start(jobs.len(), to_compute);
        }

        let end = self.collect(&mut catalogue, jobs, to_compute, run_started, &mut report);

        if let Some(ref progress) = self.config.progress {
            progress.on_compute_end();
        }

        catalogue.finished = matches!(end, RunEnd::Completed);
        catalogue.successful = matches!(end, RunEnd::Completed);
        report.duration = run_started.elapsed();
        catalogue.timing = Some(RunTiming {
            scan_start: timing_string(wall_started),
            scan_end: timing_string(Local::now()),
            scan_duration: format_hms(report.duration),
        });

        log::info!(
            "Scan finished, took {}",
            format_hms(report.duration)
        );
        log::info!("Writing catalogue to {}", self.location.display());
        let persisted = catalogue.save(&self.location);

        match end {
            RunEnd::Completed => {
                persisted?;
                Ok(report)
            }
            RunEnd::Interrupted => {
                if let Err(e) = persisted {
                    log::error!("Failed to persist partial catalogue: {}", e);
                }
                Err(BuildError::Interrupted)
            }
            RunEnd::Failed(error) => {
                if let Err(e) = persisted {
                    log::error!("Failed to persist partial catalogue: {}", e);
                }
                Err(error)
            }
        }
    }

    /// Load the prior catalogue, verify its root, and prune dead records.
    ///
    /// Missing or unreadable catalogues fall back to an empty one; a root
    /// mismatch is fatal. The two are never conflated: only a catalogue that
    /// parsed cleanly can report a mismatch. Roots are compared literally,
    /// without canonicalization.
    fn load_or_create(&self, report: &mut BuildReport) -> Result<Catalogue, BuildError> {
        if !self.config.resume {
            log::info!("Resume disabled; building from an empty catalogue");
            return Ok(Catalogue::new(self.root.clone()));
        }

        match Catalogue::load(&self.location) {
            Ok(mut catalogue) => {
                if catalogue.root_path != self.root {
                    return Err(BuildError::RootMismatch {
                        recorded: catalogue.root_path,
                        requested: self.root.clone(),
                    });
                }
                report.resumed_records = catalogue.records.len();
                report.pruned = catalogue.prune_missing();
                log::info!(
                    "Loaded {} records from prior catalogue ({} pruned)",
                    report.resumed_records,
                    report.pruned
                );
                Ok(catalogue)
            }
            Err(StoreError::NotFound(_)) => {
                log::info!(
                    "No catalogue at {}; starting fresh",
                    self.location.display()
                );
                Ok(Catalogue::new(self.root.clone()))
            }
            Err(e) => {
                log::warn!("Could not load prior catalogue ({}); starting from scratch", e);
                Ok(Catalogue::new(self.root.clone()))
            }
        }
    }

    /// Decide the refresh plan for every discovered path.
    ///
    /// Runs on the collecting thread so workers get a cloned prior record
    /// instead of access to the shared map.
    fn plan_jobs(&self, catalogue: &Catalogue, discovered: Vec<String>) -> Vec<ComputeJob> {
        discovered
            .into_iter()
            .enumerate()
            .map(|(index, path)| {
                let absolute = self.root.join(&path);
                let prior = catalogue.records.get(&path);
                let plan = match record::file_times(&absolute) {
                    Ok(times) => RefreshPlan::decide(prior, times.modified),
                    // Let the worker surface the real error.
                    Err(_) => RefreshPlan::Recompute,
                };
                let kind = match (plan, prior) {
                    (RefreshPlan::Reuse, Some(prior)) => JobKind::Reuse(prior.clone()),
                    (RefreshPlan::Repair, Some(prior)) => JobKind::Repair(prior.clone()),
                    _ => JobKind::Recompute,
                };
                ComputeJob {
                    index,
                    path,
                    absolute,
                    kind,
                }
            })
            .collect()
    }

    /// Dispatch jobs to the worker pool and consume outcomes as they
    /// complete.
    ///
    /// This loop is the only writer to `catalogue` and the only caller of
    /// `save` while the pool runs. Interrupts are observed here, between
    /// results; in-flight workers finish but their outcomes are discarded
    /// once the run is aborted.
    fn collect(
        &self,
        catalogue: &mut Catalogue,
        jobs: Vec<ComputeJob>,
        to_compute: usize,
        run_started: Instant,
        report: &mut BuildReport,
    ) -> RunEnd {
        let total = jobs.len();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers.max(1))
            .build()
            .unwrap_or_else(|_| {
                log::warn!(
                    "Failed to create custom thread pool, using global pool with {} threads",
                    rayon::current_num_threads()
                );
                rayon::ThreadPoolBuilder::new().build().unwrap()
            });

        let (tx, rx) = crossbeam_channel::bounded::<JobOutcome>(self.config.workers.max(1) * 2);
        let abort = Arc::new(AtomicBool::new(false));
        let service = Arc::clone(&self.service);
        let worker_abort = Arc::clone(&abort);

        let mut checkpoints = CheckpointClock::new(self.config.checkpoint_interval);
        let mut end = RunEnd::Completed;
        let mut consumed = 0usize;

        std::thread::scope(|scope| {
            scope.spawn(move || {
                pool.install(|| {
                    jobs.into_par_iter().for_each_with(tx, |tx, job| {
                        if worker_abort.load(Ordering::SeqCst) {
                            return;
                        }
                        let outcome = run_job(service.as_ref(), job);
                        // The receiver disappears once the run aborts.
                        let _ = tx.send(outcome);
                    });
                });
            });

            loop {
                if self.config.is_shutdown_requested() {
                    log::info!("Interrupt observed; aborting after {} of {} results", consumed, total);
                    abort.store(true, Ordering::SeqCst);
                    end = RunEnd::Interrupted;
                    break;
                }

                match rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(outcome) => {
                        log::trace!("Collected #{} {}", outcome.index, outcome.path);
                        consumed += 1;

                        let record = match outcome.result {
                            Ok(record) => record,
                            Err(e) => {
                                log::error!(
                                    "Fingerprint computation failed for {}: {}",
                                    outcome.path,
                                    e
                                );
                                abort.store(true, Ordering::SeqCst);
                                end = RunEnd::Failed(BuildError::Compute {
                                    path: outcome.path,
                                    source: e,
                                });
                                break;
                            }
                        };

                        catalogue.records.insert(outcome.path.clone(), record);
                        if outcome.reused_prior {
                            report.reused += 1;
                        } else {
                            report.computed += 1;
                        }

                        if let Some(ref progress) = self.config.progress {
                            progress.on_item(&ProgressUpdate {
                                done: consumed,
                                total,
                                computed_done: report.computed,
                                reused_done: report.reused,
                                eta: reuse_aware_eta(
                                    run_started.elapsed(),
                                    report.computed,
                                    to_compute.saturating_sub(report.computed),
                                ),
                                path: outcome.path,
                            });
                        }

                        let elapsed = run_started.elapsed();
                        if checkpoints.due(elapsed) {
                            if let Err(e) = catalogue.save(&self.location) {
                                abort.store(true, Ordering::SeqCst);
                                end = RunEnd::Failed(BuildError::Store(e));
                                break;
                            }
                            checkpoints.mark_saved(elapsed);
                            report.checkpoints_written += 1;
                            log::debug!(
                                "Checkpoint {} written after {} results",
                                report.checkpoints_written,
                                consumed
                            );
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }

            // Unblock any worker parked on a full channel so the scope can
            // join.
            drop(rx);
        });

        end
    }
}

/// Execute one job. Runs on a pool worker; pure apart from reading the file.
fn run_job<S: FingerprintService>(service: &S, job: ComputeJob) -> JobOutcome {
    let reused_prior = !job.requires_decode();
    let ComputeJob {
        index,
        path,
        absolute,
        kind,
    } = job;

    let result = match kind {
        JobKind::Reuse(record) => Ok(record),
        JobKind::Recompute => compute_fresh(service, &absolute),
        JobKind::Repair(prior) => repair(service, &absolute, prior),
    };

    JobOutcome {
        index,
        path,
        reused_prior,
        result,
    }
}

fn compute_fresh<S: FingerprintService>(
    service: &S,
    path: &Path,
) -> Result<ImageRecord, MeasureError> {
    let times = read_times(path)?;
    let measurement = service.measure(path)?;
    Ok(ImageRecord::from_measurement(measurement, times))
}

fn repair<S: FingerprintService>(
    service: &S,
    path: &Path,
    mut prior: ImageRecord,
) -> Result<ImageRecord, MeasureError> {
    let times = read_times(path)?;
    let measurement = service.measure(path)?;
    prior.fill_missing(&measurement, times);
    Ok(prior)
}

fn read_times(path: &Path) -> Result<FileTimes, MeasureError> {
    record::file_times(path).map_err(|e| MeasureError::Io(path.display().to_string(), e))
}

/// Completion estimate that ignores reused items.
///
/// Reused records finish in microseconds; folding them into the average item
/// cost would drag the estimate toward zero, so only freshly computed items
/// inform it and only outstanding compute work counts as remaining.
fn reuse_aware_eta(
    elapsed: Duration,
    computed_done: usize,
    outstanding_compute: usize,
) -> Option<Duration> {
    if computed_done == 0 {
        return None;
    }
    Some(elapsed.mul_f64(outstanding_compute as f64 / computed_done as f64))
}

/// Run-scoped checkpoint cadence: at most one save per elapsed interval
/// boundary, reset for every pass.
#[derive(Debug)]
struct CheckpointClock {
    interval: Duration,
    saved_boundary: u64,
}

impl CheckpointClock {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            saved_boundary: 0,
        }
    }

    /// True when `elapsed` has crossed a boundary no save has covered yet.
    fn due(&self, elapsed: Duration) -> bool {
        !self.interval.is_zero() && self.boundary(elapsed) > self.saved_boundary
    }

    /// Record a save at `elapsed`, covering every boundary crossed so far.
    fn mark_saved(&mut self, elapsed: Duration) {
        self.saved_boundary = self.boundary(elapsed);
    }

    fn boundary(&self, elapsed: Duration) -> u64 {
        (elapsed.as_millis() / self.interval.as_millis().max(1)) as u64
    }
}

fn timing_string(at: DateTime<Local>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Hours:minutes:seconds, the duration format the catalogue document uses.
fn format_hms(duration: Duration) -> String {
    let total = duration.as_secs();
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
