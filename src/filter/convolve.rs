//! Per-job matched filtering
//!
//! [`MatchedFilter`] owns the sample and spectrum buffers plus the forward and
//! inverse plans. They are allocated once and reused for every window of every
//! job; dropping the filter releases them.

use std::sync::Arc;

use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use tracing::{debug, instrument, trace};

use super::{steps, window, FilterError, FilterResult, ENERGY_FLOOR};
use crate::config::FilterConfig;
use crate::job::Job;
use crate::kernel::ReferenceKernel;

/// A finished row plus how many of its values hit the log10 guard
#[derive(Debug, Clone, PartialEq)]
pub struct RowOutcome {
    pub row: FilterResult,
    pub guarded: usize,
}

/// Windowed overlap-FFT matched filter.
///
/// The inverse transform is normalised by `1 / buffer_size`, so every row
/// value sits `2 * log10(buffer_size)` below an unnormalised inverse
/// (about 6.02 lower at 1024 samples).
pub struct MatchedFilter {
    buffer_size: usize,
    buffer_step: usize,
    /// Welch weights, one per window sample
    window: Vec<f64>,
    sample_buffer: Vec<Complex64>,
    spectrum_buffer: Vec<Complex64>,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    forward_scratch: Vec<Complex64>,
    inverse_scratch: Vec<Complex64>,
    kernel: ReferenceKernel,
}

impl MatchedFilter {
    /// Allocate buffers and plan both transforms for `config.buffer_size`.
    ///
    /// The step is clamped per [`FilterConfig::effective_step`].
    pub fn new(config: &FilterConfig, kernel: ReferenceKernel) -> Result<Self, FilterError> {
        let buffer_size = config.buffer_size;
        if buffer_size == 0 {
            return Err(FilterError::ZeroBufferSize);
        }
        if kernel.len() != buffer_size {
            return Err(FilterError::KernelLength {
                expected: buffer_size,
                actual: kernel.len(),
            });
        }

        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(buffer_size);
        let inverse = planner.plan_fft_inverse(buffer_size);

        let zero = Complex64::new(0.0, 0.0);
        Ok(Self {
            buffer_size,
            buffer_step: config.effective_step(),
            window: window::welch_window(buffer_size),
            sample_buffer: vec![zero; buffer_size],
            spectrum_buffer: vec![zero; buffer_size],
            forward_scratch: vec![zero; forward.get_outofplace_scratch_len()],
            inverse_scratch: vec![zero; inverse.get_outofplace_scratch_len()],
            forward,
            inverse,
            kernel,
        })
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Step in effect after clamping
    pub fn buffer_step(&self) -> usize {
        self.buffer_step
    }

    pub fn kernel(&self) -> &ReferenceKernel {
        &self.kernel
    }

    /// Number of windows a job of `len` samples yields
    pub fn steps(&self, len: usize) -> Option<usize> {
        steps(len, self.buffer_size, self.buffer_step)
    }

    /// Run the filter over every window of `job`.
    ///
    /// Empty jobs and jobs shorter than one window are rejected without
    /// touching the buffers.
    #[instrument(skip(self, job), fields(len = job.len(), frequency = job.frequency()))]
    pub fn process(&mut self, job: &Job) -> Result<RowOutcome, FilterError> {
        if job.is_empty() {
            return Err(FilterError::EmptyJob);
        }
        let steps = self.steps(job.len()).ok_or(FilterError::JobTooShort {
            len: job.len(),
            buffer_size: self.buffer_size,
        })?;

        let mut values = Vec::with_capacity(steps);
        let mut guarded = 0;

        for i in 0..steps {
            self.load_window(job.samples(), i);
            self.correlate();

            let energy = self.zero_lag_energy();
            if !energy.is_finite() || energy < ENERGY_FLOOR {
                trace!(window = i, energy, "zero-lag energy floored");
                guarded += 1;
            }
            let value = if energy.is_finite() {
                energy.max(ENERGY_FLOOR).log10()
            } else {
                ENERGY_FLOOR.log10()
            };
            values.push(value);
        }

        if guarded > 0 {
            debug!(guarded, steps, "log10 guard engaged");
        }

        Ok(RowOutcome {
            row: FilterResult::new(values, job.frequency()),
            guarded,
        })
    }

    /// Copy window `index` of `samples` into the sample buffer, Welch-tapered.
    pub(crate) fn load_window(&mut self, samples: &[Complex64], index: usize) {
        let offset = index * self.buffer_step;
        let source = &samples[offset..offset + self.buffer_size];

        for ((slot, sample), weight) in self
            .sample_buffer
            .iter_mut()
            .zip(source)
            .zip(&self.window)
        {
            *slot = Complex64::new(sample.re * weight, sample.im * weight);
        }
    }

    /// Forward transform, multiply by the kernel spectrum, inverse transform.
    ///
    /// Leaves the correlation output in the sample buffer, scaled by
    /// `1 / buffer_size` so an all-ones kernel reproduces the input.
    pub(crate) fn correlate(&mut self) {
        self.forward.process_outofplace_with_scratch(
            &mut self.sample_buffer,
            &mut self.spectrum_buffer,
            &mut self.forward_scratch,
        );

        for (bin, k) in self.spectrum_buffer.iter_mut().zip(self.kernel.spectrum()) {
            let re = bin.re * k.re - bin.im * k.im;
            let im = bin.im * k.re + bin.re * k.im;
            *bin = Complex64::new(re, im);
        }

        self.inverse.process_outofplace_with_scratch(
            &mut self.spectrum_buffer,
            &mut self.sample_buffer,
            &mut self.inverse_scratch,
        );

        let scale = 1.0 / self.buffer_size as f64;
        for s in self.sample_buffer.iter_mut() {
            *s *= scale;
        }
    }

    /// `(re² + im²) / buffer_size` of the zero-lag output sample
    pub(crate) fn zero_lag_energy(&self) -> f64 {
        let first = self.sample_buffer[0];
        (first.re * first.re + first.im * first.im) / self.buffer_size as f64
    }

    #[cfg(test)]
    pub(crate) fn sample_buffer(&self) -> &[Complex64] {
        &self.sample_buffer
    }
}
