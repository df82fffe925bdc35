//! Filter configuration
//!
//! Window geometry and worker timing, supplied once when a worker is built.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Configuration for a convolution worker
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Transform length in samples (window size)
    pub buffer_size: usize,
    /// Stride between consecutive analysis windows
    pub buffer_step: usize,
    /// Upper bound on how long the worker waits before re-checking the queue
    /// and its exit flag
    pub poll_interval: Duration,
    /// Directory for diagnostic dumps (only used with the `dump-raw` / `dump-fft` features)
    pub dump_dir: PathBuf,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            buffer_step: 256,
            poll_interval: Duration::from_millis(10),
            dump_dir: PathBuf::from("."),
        }
    }
}

impl FilterConfig {
    pub fn new(buffer_size: usize, buffer_step: usize) -> Self {
        Self {
            buffer_size,
            buffer_step,
            ..Self::default()
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_dump_dir(mut self, dump_dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = dump_dir.into();
        self
    }

    /// Step actually used by the worker.
    ///
    /// A step that is not smaller than the window would skip samples between
    /// windows; it is replaced by 1 and a warning is logged.
    pub fn effective_step(&self) -> usize {
        if self.buffer_step >= self.buffer_size || self.buffer_step == 0 {
            warn!(
                buffer_size = self.buffer_size,
                buffer_step = self.buffer_step,
                "Step is not smaller than buffer size; setting step to 1"
            );
            1
        } else {
            self.buffer_step
        }
    }
}

/// Window size derived from the acquisition band and the expected signal rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandPlan {
    /// Power-of-two transform length
    pub buffer_size: usize,
    /// Band actually covered by `buffer_size`, in Hz
    pub actual_band_hz: f64,
}

impl BandPlan {
    /// Smallest window accepted by [`BandPlan::compute`]
    pub const MIN_BUFFER_SIZE: usize = 4;

    /// Truncate `band_hz * actual_band_hz / signal_speed` to whole samples,
    /// round that up to a power of two
    /// (at least [`BandPlan::MIN_BUFFER_SIZE`]) and report the band that
    /// window really spans.
    ///
    /// # Arguments
    /// * `band_hz` - Full acquisition bandwidth
    /// * `actual_band_hz` - Requested analysis band
    /// * `signal_speed` - Expected signal rate (symbols per second)
    pub fn compute(band_hz: f64, actual_band_hz: f64, signal_speed: f64) -> Self {
        let window = (band_hz * actual_band_hz / signal_speed).floor();

        let mut size = Self::MIN_BUFFER_SIZE;
        if window.is_finite() && window > 0.0 {
            while (size as f64) < window && size < (1 << 30) {
                size *= 2;
            }
        }

        let actual_band_hz = if band_hz > 0.0 {
            size as f64 * signal_speed / band_hz
        } else {
            0.0
        };

        Self {
            buffer_size: size,
            actual_band_hz,
        }
    }

    /// A [`FilterConfig`] with this window and the given step
    pub fn config(&self, buffer_step: usize) -> FilterConfig {
        FilterConfig::new(self.buffer_size, buffer_step)
    }
}
