//! Windowed overlap-FFT matched filter
//!
//! Each job is cut into overlapping windows of `buffer_size` samples spaced
//! `buffer_step` apart. Every window is Welch-tapered, transformed, multiplied
//! by the reference kernel spectrum and transformed back; the zero-lag output
//! energy becomes one value of the job's result row.
//!
//! **Module Organization**:
//! - `window` - Welch taper
//! - `convolve` - Owned buffers and transform plans, per-job algorithm
//! - `worker` - Background thread consuming a [`JobQueue`](crate::JobQueue)

mod convolve;
pub mod window;
pub mod worker;

pub use convolve::{MatchedFilter, RowOutcome};
pub use window::{welch, welch_window};
pub use worker::{ConvolutionWorker, RowSink, WorkerHandle, WorkerReport, WorkerState};

use snafu::Snafu;

/// Lower bound applied to the zero-lag energy before taking `log10`.
///
/// Any finite energy below it (including zero, from an all-zero window or
/// kernel) reports `log10(ENERGY_FLOOR)`, so that value is the raster minimum.
/// Non-finite energies report it as well.
pub const ENERGY_FLOOR: f64 = 1e-20;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FilterError {
    #[snafu(display("buffer size must be non-zero"))]
    ZeroBufferSize,

    #[snafu(display("reference kernel has {actual} bins, expected {expected}"))]
    KernelLength { expected: usize, actual: usize },

    #[snafu(display("job has no samples"))]
    EmptyJob,

    #[snafu(display("job of {len} samples is shorter than the {buffer_size}-sample window"))]
    JobTooShort { len: usize, buffer_size: usize },

    #[snafu(display("worker was started before a reference kernel was supplied"))]
    NotInitialized,

    #[snafu(display("failed to spawn worker thread"))]
    SpawnWorker { source: std::io::Error },

    #[snafu(display("worker thread panicked"))]
    WorkerPanicked,
}

/// Number of windows that fit in `len` samples:
/// `floor((len - buffer_size) / buffer_step) + 1`.
///
/// Returns `None` when the job is shorter than one window or the geometry is
/// degenerate (zero size or step).
pub fn steps(len: usize, buffer_size: usize, buffer_step: usize) -> Option<usize> {
    if buffer_size == 0 || buffer_step == 0 || len < buffer_size {
        return None;
    }
    Some((len - buffer_size) / buffer_step + 1)
}

/// One row of log-energy values produced from a single job.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterResult {
    values: Vec<f64>,
    frequency: f64,
}

impl FilterResult {
    pub fn new(values: Vec<f64>, frequency: f64) -> Self {
        Self { values, frequency }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Frequency tag of the originating job
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Largest value in the row, ignoring NaN; `None` for an empty row
    pub fn max(&self) -> Option<f64> {
        self.values.iter().copied().filter(|v| !v.is_nan()).reduce(f64::max)
    }
}
