//! Progress reporting and cancellation support.
//!
//! This module provides [`ProgressCallback`] for monitoring a sheet run,
//! [`CancellationToken`] for coarse cancellation, and [`ProgressInfo`] for
//! progress snapshots. A cancelled run discards everything it has decoded and
//! writes no output.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use thumbsheet::{LayoutSpec, ProgressCallback, ProgressInfo, RunOptions, SheetError};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("shot {}/{} ({:.0}%)", info.current, info.total, info.percentage);
//!     }
//! }
//!
//! let options = RunOptions::new().with_progress(Arc::new(PrintProgress));
//! let summary = thumbsheet::generate_with_options("input.mp4", &LayoutSpec::default(), &options)?;
//! # Ok::<(), SheetError>(())
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// A snapshot of run progress, delivered after each sample is resolved.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Number of samples resolved so far (accepted or skipped).
    pub current: u64,
    /// Total number of samples in the schedule.
    pub total: u64,
    /// Completion percentage (0.0 – 100.0).
    pub percentage: f32,
    /// Wall-clock time elapsed since sampling started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// Timestamp of the frame that was accepted, in seconds.
    /// `None` when the sample was skipped.
    pub accepted_timestamp: Option<f64>,
}

/// Trait for receiving progress updates.
///
/// Implementations must be [`Send`] and [`Sync`] so batch runs can share one
/// callback across worker threads. Callbacks observe but cannot halt a run;
/// use [`CancellationToken`] for that.
pub trait ProgressCallback: Send + Sync {
    /// Called after every resolved sample.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Default callback that discards all notifications.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads; call
/// [`cancel`](CancellationToken::cancel) from any thread to abort the
/// associated run before its next sample.
///
/// # Example
///
/// ```
/// use thumbsheet::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks timing for a run and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    total: u64,
    current: u64,
    start_time: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Arc<dyn ProgressCallback>, total: u64) -> Self {
        Self {
            callback,
            total,
            current: 0,
            start_time: Instant::now(),
        }
    }

    /// Record one resolved sample and notify the callback.
    pub(crate) fn advance(&mut self, accepted_timestamp: Option<f64>) {
        self.current += 1;
        let elapsed = self.start_time.elapsed();

        let percentage = if self.total > 0 {
            (self.current as f32 / self.total as f32) * 100.0
        } else {
            100.0
        };

        let remaining = self.total.saturating_sub(self.current);
        let estimated_remaining = (self.current > 0)
            .then(|| elapsed.mul_f64(remaining as f64 / self.current as f64));

        let info = ProgressInfo {
            current: self.current,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            accepted_timestamp,
        };

        self.callback.on_progress(&info);
    }
}
