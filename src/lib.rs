//! Streaming matched-filter raster.
//!
//! Sample blocks ("jobs") are queued by an acquisition front end, filtered by
//! a background worker against a fixed reference kernel, and accumulated as
//! rows of log-energy values in a raster that a renderer can read.

pub mod config;
pub mod dump;
pub mod filter;
pub mod job;
pub mod kernel;
pub mod raster;
pub mod tracing_init;

pub use config::{BandPlan, FilterConfig};
pub use filter::{
    steps, welch, ConvolutionWorker, FilterError, FilterResult, MatchedFilter, RowOutcome,
    RowSink, WorkerHandle, WorkerReport, WorkerState, ENERGY_FLOOR,
};
pub use job::{Job, JobQueue, JobQueueGuard};
pub use kernel::{KernelError, ReferenceKernel};
pub use raster::{RasterBuffer, RasterError, RasterSnapshot, Z_TOP_EMPTY};

pub use rustfft::num_complex::Complex64;
