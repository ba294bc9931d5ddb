//! Analysis module - consumer side of the pipeline
//!
//! Everything here runs on the tick thread only:
//! - Bounded history of time slices
//! - Real-input spectral transform
//! - RMS envelope follower
//! - Multi-rate EWMA smoothing of magnitudes
//! - The per-tick orchestrator tying them together

mod analyzer;
mod envelope;
mod history;
mod smoother;
mod spectrum;

use thiserror::Error;

pub use analyzer::{Analyzer, AnalyzerState, Features, TickCounters, TickOutcome};
pub use envelope::{rms, RmsEnvelope};
pub use history::{History, TimeSlice, TimeSliceMut};
pub use smoother::{Ewma, MultiRateSmoother, SmoothingRate};
pub use spectrum::{Complex32, MagnitudeScale, SpectralTransform, Window};

/// Errors raised on the analysis side
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// Nothing has been analyzed yet; poll again later
    #[error("History is empty, no frame observed yet")]
    EmptyHistory,

    /// An array had the wrong length for the configured shape
    #[error("Dimension mismatch: expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A tick was issued after shutdown
    #[error("Analyzer has been shut down")]
    Stopped,
}

/// `a` weighted by `1 - t`, `b` weighted by `t`
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
