//! Error types for the correction pipeline and its collaborators.

use thiserror::Error;

use crate::progress::CorrectionStage;

/// Errors raised by correction runs and the I/O collaborators.
#[derive(Debug, Error)]
pub enum CorrectionError {
    /// The input line set was empty, or merging produced no line geometry.
    #[error("no input geometry: nothing to merge")]
    NoInputGeometry,

    /// A vertex sits next to a zero-length edge or has a non-finite
    /// coordinate, and the policy is to fail.
    #[error("degenerate geometry at part {part}, vertex {index}")]
    DegenerateGeometry { part: usize, index: usize },

    /// The exclusion zone consumed every fragment.
    #[error("no surviving geometry: all {fragment_count} fragments were removed")]
    NoSurvivingGeometry { fragment_count: usize },

    #[error("angle threshold must be in (0, 180] degrees, got {0}")]
    InvalidThreshold(f64),

    #[error("buffer radius must be a positive number, got {0}")]
    InvalidBufferRadius(f64),

    /// An observer asked the pipeline to stop.
    #[error("correction cancelled before stage {stage}")]
    Cancelled { stage: CorrectionStage },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GPX error: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
}

/// Result type for correction operations.
pub type Result<T> = std::result::Result<T, CorrectionError>;

/// Extension for turning absent geometry into pipeline errors.
pub trait OptionExt<T> {
    /// Map `None` to [`CorrectionError::NoInputGeometry`].
    fn ok_or_no_input(self) -> Result<T>;

    /// Map `None` to [`CorrectionError::InvalidInput`] with the given message.
    fn ok_or_invalid(self, message: impl Into<String>) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_no_input(self) -> Result<T> {
        self.ok_or(CorrectionError::NoInputGeometry)
    }

    fn ok_or_invalid(self, message: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| CorrectionError::InvalidInput(message.into()))
    }
}
