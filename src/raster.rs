//! Result raster
//!
//! Accumulates filter rows in processing order and exposes them as a 2-D grid
//! (`x` = window index within a row, `y` = row index) together with the
//! running maximum used for display scaling.
//!
//! The worker appends while renderers read. Single calls lock internally;
//! a renderer that needs `columns()`, `rows()` and many `value()` calls to
//! agree takes a [`RasterSnapshot`] with [`RasterBuffer::lock`] and reads
//! through it.

use std::sync::{Mutex, MutexGuard, PoisonError};

use snafu::Snafu;
use tracing::trace;

use crate::filter::FilterResult;

/// `z_top` of a raster that has never received a value
pub const Z_TOP_EMPTY: f64 = f64::NEG_INFINITY;

#[derive(Debug, Snafu, PartialEq)]
pub enum RasterError {
    #[snafu(display("cell ({x}, {y}) is outside the {columns}x{rows} raster"))]
    OutOfRange {
        x: usize,
        y: usize,
        columns: usize,
        rows: usize,
    },
}

#[derive(Debug)]
struct Raster {
    rows: Vec<FilterResult>,
    z_top: f64,
}

impl Default for Raster {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            z_top: Z_TOP_EMPTY,
        }
    }
}

impl Raster {
    fn push(&mut self, row: FilterResult) {
        if let Some(max) = row.max() {
            self.z_top = self.z_top.max(max);
        }
        self.rows.push(row);
    }

    fn clear(&mut self) {
        self.rows.clear();
        self.z_top = Z_TOP_EMPTY;
    }

    fn columns(&self) -> usize {
        self.rows.last().map_or(0, FilterResult::len)
    }

    fn rows(&self) -> usize {
        self.rows.len()
    }

    fn value(&self, x: usize, y: usize) -> Result<f64, RasterError> {
        self.rows
            .get(y)
            .and_then(|row| row.values().get(x))
            .copied()
            .ok_or(RasterError::OutOfRange {
                x,
                y,
                columns: self.columns(),
                rows: self.rows(),
            })
    }

    fn value_clamped(&self, x: usize, y: usize) -> Option<f64> {
        let row = self.rows.get(y.min(self.rows.len().checked_sub(1)?))?;
        let values = row.values();
        values.get(x.min(values.len().checked_sub(1)?)).copied()
    }

    fn frequency(&self, y: usize) -> Option<f64> {
        self.rows.get(y).map(FilterResult::frequency)
    }
}

/// Append-only raster of filter rows with a running maximum.
#[derive(Debug, Default)]
pub struct RasterBuffer {
    inner: Mutex<Raster>,
}

impl RasterBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row and raise `z_top` to the row's maximum if larger.
    pub fn set_data(&self, row: FilterResult) {
        let mut raster = self.raster();
        trace!(columns = row.len(), frequency = row.frequency(), "raster row appended");
        raster.push(row);
    }

    /// Drop all rows and reset `z_top` to [`Z_TOP_EMPTY`].
    pub fn clear(&self) {
        self.raster().clear();
    }

    /// Lock the raster for a consistent multi-call read.
    ///
    /// Appends from the worker block until the snapshot is dropped, so keep
    /// it short-lived.
    pub fn lock(&self) -> RasterSnapshot<'_> {
        RasterSnapshot {
            raster: self.raster(),
        }
    }

    /// Column count of the most recently appended row
    pub fn columns(&self) -> usize {
        self.raster().columns()
    }

    pub fn rows(&self) -> usize {
        self.raster().rows()
    }

    /// Value at window `x` of row `y`
    pub fn value(&self, x: usize, y: usize) -> Result<f64, RasterError> {
        self.raster().value(x, y)
    }

    /// Value at the cell nearest to `(x, y)`; `None` only for an empty raster
    pub fn value_clamped(&self, x: usize, y: usize) -> Option<f64> {
        self.raster().value_clamped(x, y)
    }

    /// Largest value ever appended since the last [`clear`](Self::clear)
    pub fn z_top(&self) -> f64 {
        self.raster().z_top
    }

    /// Frequency tag of row `y`
    pub fn frequency(&self, y: usize) -> Option<f64> {
        self.raster().frequency(y)
    }

    fn raster(&self) -> MutexGuard<'_, Raster> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Locked view of a [`RasterBuffer`]. The shape cannot change while it lives.
pub struct RasterSnapshot<'a> {
    raster: MutexGuard<'a, Raster>,
}

impl RasterSnapshot<'_> {
    pub fn columns(&self) -> usize {
        self.raster.columns()
    }

    pub fn rows(&self) -> usize {
        self.raster.rows()
    }

    pub fn value(&self, x: usize, y: usize) -> Result<f64, RasterError> {
        self.raster.value(x, y)
    }

    pub fn value_clamped(&self, x: usize, y: usize) -> Option<f64> {
        self.raster.value_clamped(x, y)
    }

    pub fn z_top(&self) -> f64 {
        self.raster.z_top
    }

    pub fn frequency(&self, y: usize) -> Option<f64> {
        self.raster.frequency(y)
    }

    /// Row `y` as a slice
    pub fn row(&self, y: usize) -> Option<&[f64]> {
        self.raster.rows.get(y).map(FilterResult::values)
    }
}
