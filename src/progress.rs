//! Stage hooks for correction runs.
//!
//! The pipeline calls the observer before entering each stage and after
//! finishing it. Returning [`StageControl::Cancel`] from `before_stage`
//! stops the run with `CorrectionError::Cancelled`. Observers may be shared
//! across threads by `correct_batch`, so they must be `Send + Sync`.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

/// Pipeline stages, ordered by execution sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorrectionStage {
    /// Union of all input lines
    Merge,
    /// Angle scan of the merged vertices
    Detect,
    /// Buffering and union of spike vertices
    Buffer,
    /// Multipart to single-part split
    Explode,
    /// Per-fragment subtraction of the exclusion zone
    Difference,
    /// Filtering and counters
    Assemble,
}

impl CorrectionStage {
    pub const ALL: [CorrectionStage; 6] = [
        CorrectionStage::Merge,
        CorrectionStage::Detect,
        CorrectionStage::Buffer,
        CorrectionStage::Explode,
        CorrectionStage::Difference,
        CorrectionStage::Assemble,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionStage::Merge => "merge",
            CorrectionStage::Detect => "detect",
            CorrectionStage::Buffer => "buffer",
            CorrectionStage::Explode => "explode",
            CorrectionStage::Difference => "difference",
            CorrectionStage::Assemble => "assemble",
        }
    }
}

impl fmt::Display for CorrectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision returned before each stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageControl {
    Continue,
    Cancel,
}

/// Trait for receiving stage transitions during a correction run.
pub trait CorrectionObserver: Send + Sync {
    /// Called before entering `stage`.
    fn before_stage(&self, stage: CorrectionStage) -> StageControl;
    /// Called after `stage` completes; `count` is the stage's output size.
    fn after_stage(&self, stage: CorrectionStage, count: usize);
}

/// Observer that never cancels and ignores updates.
pub struct NoopObserver;

impl CorrectionObserver for NoopObserver {
    fn before_stage(&self, _stage: CorrectionStage) -> StageControl {
        StageControl::Continue
    }
    fn after_stage(&self, _stage: CorrectionStage, _count: usize) {}
}

/// Atomic tracker that can be polled, and cancelled, from another thread.
pub struct AtomicProgressTracker {
    pub stage: Mutex<String>,
    pub completed_stages: AtomicU32,
    pub last_count: AtomicU32,
    cancelled: AtomicBool,
}

impl Default for AtomicProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomicProgressTracker {
    pub fn new() -> Self {
        Self {
            stage: Mutex::new(String::new()),
            completed_stages: AtomicU32::new(0),
            last_count: AtomicU32::new(0),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Request cancellation; takes effect at the next stage boundary.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl CorrectionObserver for AtomicProgressTracker {
    fn before_stage(&self, stage: CorrectionStage) -> StageControl {
        if self.is_cancelled() {
            return StageControl::Cancel;
        }
        if let Ok(mut current) = self.stage.lock() {
            *current = stage.as_str().to_string();
        }
        StageControl::Continue
    }

    fn after_stage(&self, _stage: CorrectionStage, count: usize) {
        self.completed_stages.fetch_add(1, Ordering::SeqCst);
        self.last_count
            .store(u32::try_from(count).unwrap_or(u32::MAX), Ordering::SeqCst);
    }
}
