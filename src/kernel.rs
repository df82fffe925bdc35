//! Reference kernel spectrum
//!
//! The frequency-domain kernel every window is multiplied by. It is built
//! once, shared read-only between all jobs (and workers), and never owned by
//! the worker that uses it.

use std::sync::Arc;

use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;
use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum KernelError {
    #[snafu(display("kernel template is empty"))]
    EmptyTemplate,

    #[snafu(display("kernel template of {len} samples does not fit a {buffer_size}-sample window"))]
    TemplateTooLong { len: usize, buffer_size: usize },
}

/// Shared, immutable kernel spectrum of length `buffer_size`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceKernel {
    spectrum: Arc<[Complex64]>,
}

impl ReferenceKernel {
    /// Wrap an already transformed kernel
    pub fn from_spectrum(spectrum: Vec<Complex64>) -> Self {
        Self {
            spectrum: spectrum.into(),
        }
    }

    /// All-ones spectrum: filtering with it returns the windowed input unchanged.
    pub fn identity(buffer_size: usize) -> Self {
        Self::from_spectrum(vec![Complex64::new(1.0, 0.0); buffer_size])
    }

    /// Matched filter for a time-domain template.
    ///
    /// The template is zero-padded to `buffer_size`, transformed, and
    /// conjugated, so the zero-lag output of a window is its inner product
    /// with the template.
    pub fn matched(template: &[Complex64], buffer_size: usize) -> Result<Self, KernelError> {
        if template.is_empty() {
            return Err(KernelError::EmptyTemplate);
        }
        if template.len() > buffer_size {
            return Err(KernelError::TemplateTooLong {
                len: template.len(),
                buffer_size,
            });
        }

        let mut spectrum = vec![Complex64::new(0.0, 0.0); buffer_size];
        spectrum[..template.len()].copy_from_slice(template);

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(buffer_size);
        fft.process(&mut spectrum);

        for bin in spectrum.iter_mut() {
            *bin = bin.conj();
        }

        Ok(Self::from_spectrum(spectrum))
    }

    pub fn spectrum(&self) -> &[Complex64] {
        &self.spectrum
    }

    pub fn len(&self) -> usize {
        self.spectrum.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectrum.is_empty()
    }
}
