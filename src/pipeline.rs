//! Bounded-concurrency conversion of a whole frame sequence into a single-layer cache.
//!
//! A [`Pipeline`] runs at most one conversion at a time. Each run:
//! 1. resolves the sequence from one sample frame and enumerates its members,
//! 2. builds a rayon pool of half the available cores (at least one),
//! 3. submits one unit per member file in ascending frame order,
//! 4. waits for every unit and folds the results into a [`RunOutcome`].
//!
//! Failures are fail-together-at-the-end, not fail-fast: one frame failing does not stop units
//! that are already dispatched. Cancellation is cooperative; units that have not started yet
//! return immediately and in-flight transcodes are aborted by the [`FrameTranscoder`].

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use crate::cache::{CacheLocator, frame_file_name};
use crate::foundation::cancel::CancelToken;
use crate::foundation::error::{SeqCacheError, SeqResult};
use crate::progress::ProgressSnapshot;
use crate::sequence::{FrameNumber, SequenceDescriptor, resolve};
use crate::transcode::{FrameJob, FrameStatus, FrameTranscoder};

/// Worker-pool controls.
#[derive(Clone, Debug, Default)]
pub struct PipelineOpts {
    /// Explicit worker count. Defaults to half the available parallelism, minimum 1.
    pub workers: Option<usize>,
}

impl PipelineOpts {
    pub fn validate(&self) -> SeqResult<()> {
        if let Some(n) = self.workers
            && n == 0
        {
            return Err(SeqCacheError::config(
                "pipeline workers must be >= 1 when set",
            ));
        }
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                / 2
        })
        .max(1)
    }
}

/// Counters of a finished run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Distinct frame numbers in the sequence.
    pub total_frames: u64,
    /// Frames written to the destination.
    pub completed_frames: u64,
    /// Member files skipped because their frame number was already dispatched.
    pub skipped_duplicates: u64,
    pub elapsed: Duration,
}

/// Terminal state of [`Pipeline::run`].
#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunSummary),
    /// At least one frame failed; `error` is the first failure recorded.
    Failed {
        summary: RunSummary,
        error: SeqCacheError,
    },
    Cancelled(RunSummary),
    /// Another run was already active; nothing was started.
    Rejected,
}

impl RunOutcome {
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            Self::Completed(s) | Self::Cancelled(s) | Self::Failed { summary: s, .. } => Some(s),
            Self::Rejected => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Conversion driver. Share one instance so its run guard covers every caller.
pub struct Pipeline {
    transcoder: Arc<dyn FrameTranscoder>,
    opts: PipelineOpts,
    active: Mutex<bool>,
}

struct ActiveGuard<'a>(&'a Mutex<bool>);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }
}

/// Mutable state of one run. Created fresh for every call to [`Pipeline::run`].
struct Session<'a> {
    total: u64,
    start: Instant,
    dispatched: Mutex<HashSet<u64>>,
    completed: AtomicU64,
    skipped: AtomicU64,
    publish: Mutex<()>,
    first_error: OnceLock<SeqCacheError>,
    on_progress: &'a (dyn Fn(ProgressSnapshot) + Sync),
}

impl Session<'_> {
    /// Test-and-insert in one critical section; `false` means the frame was already taken.
    fn claim(&self, frame: u64) -> bool {
        self.dispatched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(frame)
    }

    fn complete_frame(&self) {
        // Increment and publish under one lock so observers see a non-decreasing count.
        let _publish = self.publish.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        (self.on_progress)(ProgressSnapshot::new(current, self.total, self.start));
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            total_frames: self.total,
            completed_frames: self.completed.load(Ordering::SeqCst),
            skipped_duplicates: self.skipped.load(Ordering::SeqCst),
            elapsed: self.start.elapsed(),
        }
    }
}

struct Target<'a> {
    seq: &'a SequenceDescriptor,
    layer: &'a str,
    dest_dir: &'a Path,
    cancel: &'a CancelToken,
}

impl Pipeline {
    pub fn new(transcoder: Arc<dyn FrameTranscoder>, opts: PipelineOpts) -> SeqResult<Self> {
        opts.validate()?;
        Ok(Self {
            transcoder,
            opts,
            active: Mutex::new(false),
        })
    }

    pub fn is_running(&self) -> bool {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_begin(&self) -> Option<ActiveGuard<'_>> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if *active {
            return None;
        }
        *active = true;
        Some(ActiveGuard(&self.active))
    }

    /// Convert every frame of the sequence containing `sample` into `dest_dir`.
    ///
    /// Discovery problems (unrecognizable name, no members on disk, unusable destination) are
    /// returned as `Err` before any frame is converted. Everything after that ends in a
    /// [`RunOutcome`]. Frames already written stay in place whatever the outcome.
    #[tracing::instrument(skip(self, on_progress, cancel))]
    pub fn run(
        &self,
        sample: &Path,
        layer: &str,
        dest_dir: &Path,
        on_progress: &(dyn Fn(ProgressSnapshot) + Sync),
        cancel: &CancelToken,
    ) -> SeqResult<RunOutcome> {
        let Some(guard) = self.try_begin() else {
            tracing::info!("conversion already in progress, ignoring start request");
            return Ok(RunOutcome::Rejected);
        };
        self.run_active(&guard, sample, layer, dest_dir, on_progress, cancel)
    }

    /// [`Pipeline::run`] into the cache directory `locator` assigns to `(stem, layer)`.
    ///
    /// The cache directory is only created once the run guard is held, so a rejected start comes
    /// back with an empty path and leaves the cache untouched.
    #[tracing::instrument(skip(self, locator, on_progress, cancel))]
    pub fn run_to_cache(
        &self,
        locator: &CacheLocator,
        sample: &Path,
        layer: &str,
        on_progress: &(dyn Fn(ProgressSnapshot) + Sync),
        cancel: &CancelToken,
    ) -> SeqResult<(PathBuf, RunOutcome)> {
        let Some(guard) = self.try_begin() else {
            tracing::info!("conversion already in progress, ignoring start request");
            return Ok((PathBuf::new(), RunOutcome::Rejected));
        };
        let seq = resolve(sample)?;
        let dest = locator.target_dir(seq.stem(), layer)?;
        let outcome = self.run_active(&guard, sample, layer, &dest, on_progress, cancel)?;
        Ok((dest, outcome))
    }

    fn run_active(
        &self,
        _guard: &ActiveGuard<'_>,
        sample: &Path,
        layer: &str,
        dest_dir: &Path,
        on_progress: &(dyn Fn(ProgressSnapshot) + Sync),
        cancel: &CancelToken,
    ) -> SeqResult<RunOutcome> {
        let seq = resolve(sample)?;
        let members = seq.enumerate()?;
        if members.is_empty() {
            return Err(SeqCacheError::format(format!(
                "no files matching '{}' in '{}'",
                seq.glob_pattern(),
                seq.directory.display()
            )));
        }
        std::fs::create_dir_all(dest_dir)
            .map_err(|e| SeqCacheError::file_access(dest_dir, e.to_string()))?;

        let total = members
            .iter()
            .map(|(n, _)| n.value)
            .collect::<BTreeSet<_>>()
            .len() as u64;
        let workers = self.opts.worker_count();
        let pool = build_thread_pool(workers)?;
        tracing::info!(
            files = members.len(),
            frames = total,
            workers,
            pattern = %seq.glob_pattern(),
            "starting conversion"
        );

        let session = Session {
            total,
            start: Instant::now(),
            dispatched: Mutex::new(HashSet::new()),
            completed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            publish: Mutex::new(()),
            first_error: OnceLock::new(),
            on_progress,
        };
        let target = Target {
            seq: &seq,
            layer,
            dest_dir,
            cancel,
        };

        pool.scope_fifo(|s| {
            for (frame, source) in &members {
                let (session, target) = (&session, &target);
                s.spawn_fifo(move |_| self.run_unit(session, target, *frame, source));
            }
        });

        let summary = session.summary();
        let outcome = match session.first_error.into_inner() {
            _ if cancel.is_cancelled() => RunOutcome::Cancelled(summary),
            Some(error) => RunOutcome::Failed { summary, error },
            None => RunOutcome::Completed(summary),
        };
        tracing::info!(
            completed = summary.completed_frames,
            total = summary.total_frames,
            skipped = summary.skipped_duplicates,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "conversion {}",
            outcome_label(&outcome)
        );
        Ok(outcome)
    }

    fn run_unit(
        &self,
        session: &Session<'_>,
        target: &Target<'_>,
        frame: FrameNumber,
        source: &Path,
    ) {
        if target.cancel.is_cancelled() {
            return;
        }
        if !session.claim(frame.value) {
            session.skipped.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(
                frame = frame.value,
                source = %source.display(),
                "duplicate frame skipped"
            );
            return;
        }

        let dest = target.dest_dir.join(frame_file_name(
            target.seq.stem(),
            FrameNumber::new(frame.value, target.seq.padding),
            target.seq.cache_extension(),
        ));
        let job = FrameJob {
            frame: frame.value,
            source,
            dest: &dest,
            layer: target.layer,
        };

        match self.transcoder.transcode(&job, target.cancel) {
            Ok(FrameStatus::Written) => {
                tracing::debug!(frame = frame.value, dest = %dest.display(), "frame written");
                session.complete_frame();
            }
            Ok(FrameStatus::Aborted) => {
                tracing::debug!(frame = frame.value, "frame aborted");
            }
            Err(e) => {
                tracing::warn!(frame = frame.value, "frame failed: {e}");
                let _ = session.first_error.set(e);
            }
        }
    }
}

fn outcome_label(outcome: &RunOutcome) -> &'static str {
    match outcome {
        RunOutcome::Completed(_) => "completed",
        RunOutcome::Failed { .. } => "failed",
        RunOutcome::Cancelled(_) => "cancelled",
        RunOutcome::Rejected => "rejected",
    }
}

fn build_thread_pool(threads: usize) -> SeqResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("seqcache-worker-{i}"))
        .build()
        .map_err(|e| SeqCacheError::Other(anyhow::anyhow!("failed to build rayon thread pool: {e}")))
}
