//! Convolution worker
//!
//! Background thread that drains a [`JobQueue`], runs each job through a
//! [`MatchedFilter`] and hands the rows to a [`RowSink`].
//!
//! **Lifecycle**: `Idle` → `Processing` → `Idle` … → `Terminated`.
//! The worker waits on the queue for at most `poll_interval` at a time, so a
//! new job or an exit request is noticed within that bound. Exit is
//! cooperative: after [`WorkerHandle::set_safe_exit`] the worker keeps going
//! until it finds the queue empty, so every job enqueued before the request is
//! still processed. The filter (buffers and plans) lives on the worker thread
//! and is dropped only after the loop has returned.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use snafu::ResultExt;
use tracing::{debug, warn};

use super::{FilterError, FilterResult, MatchedFilter, SpawnWorkerSnafu};
use crate::config::FilterConfig;
use crate::job::{Job, JobQueue};
use crate::kernel::ReferenceKernel;
use crate::raster::RasterBuffer;

/// Destination for finished rows
pub trait RowSink: Send + 'static {
    fn accept(&mut self, row: FilterResult);
}

impl RowSink for Arc<RasterBuffer> {
    fn accept(&mut self, row: FilterResult) {
        self.set_data(row);
    }
}

impl RowSink for mpsc::Sender<FilterResult> {
    fn accept(&mut self, row: FilterResult) {
        if self.send(row).is_err() {
            debug!("row receiver dropped; discarding row");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting for a job or a data source
    Idle,
    /// Filtering a dequeued job
    Processing,
    /// Loop has exited; no further rows will be emitted
    Terminated,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Processing,
            _ => WorkerState::Terminated,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            WorkerState::Idle => 0,
            WorkerState::Processing => 1,
            WorkerState::Terminated => 2,
        }
    }
}

/// Counters returned once, when the worker is joined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    /// Jobs that produced a row
    pub jobs_processed: usize,
    /// Empty or too-short jobs dropped without a row
    pub jobs_skipped: usize,
    /// Row values whose energy was floored before `log10`
    pub guarded_samples: usize,
}

/// State shared between the worker thread and its handle
struct Control {
    safe_exit: AtomicBool,
    state: AtomicU8,
    source: Mutex<Option<Arc<JobQueue>>>,
}

impl Control {
    fn new(source: Option<Arc<JobQueue>>) -> Self {
        Self {
            safe_exit: AtomicBool::new(false),
            state: AtomicU8::new(WorkerState::Idle.as_u8()),
            source: Mutex::new(source),
        }
    }

    fn source(&self) -> Option<Arc<JobQueue>> {
        self.source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_source(&self, queue: Arc<JobQueue>) {
        *self.source.lock().unwrap_or_else(PoisonError::into_inner) = Some(queue);
    }

    fn exit_requested(&self) -> bool {
        self.safe_exit.load(Ordering::Acquire)
    }

    fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }
}

/// A worker that has not been started yet.
pub struct ConvolutionWorker {
    config: FilterConfig,
    filter: Option<MatchedFilter>,
    source: Option<Arc<JobQueue>>,
}

impl ConvolutionWorker {
    /// Build a worker for `config`, clamping an oversized step to 1.
    pub fn new(mut config: FilterConfig) -> Self {
        config.buffer_step = config.effective_step();
        Self {
            config,
            filter: None,
            source: None,
        }
    }

    /// Allocate buffers and plans and attach the shared kernel spectrum.
    pub fn init(&mut self, kernel: ReferenceKernel) -> Result<(), FilterError> {
        self.filter = Some(MatchedFilter::new(&self.config, kernel)?);
        Ok(())
    }

    pub fn set_data_source(&mut self, queue: Arc<JobQueue>) {
        self.source = Some(queue);
    }

    /// Configuration in effect (step already clamped)
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Start the worker thread. Rows go to `sink` in dequeue order.
    pub fn spawn<S: RowSink>(self, sink: S) -> Result<WorkerHandle, FilterError> {
        let filter = self.filter.ok_or(FilterError::NotInitialized)?;
        let control = Arc::new(Control::new(self.source));

        let worker = WorkerLoop {
            filter,
            config: self.config,
            control: Arc::clone(&control),
            sink,
            report: WorkerReport::default(),
        };

        let thread = thread::Builder::new()
            .name("fft".to_string())
            .spawn(move || worker.run())
            .context(SpawnWorkerSnafu)?;

        Ok(WorkerHandle {
            control,
            thread: Some(thread),
        })
    }
}

/// Owner-side handle of a running worker.
///
/// Dropping the handle requests a safe exit and waits for the thread.
pub struct WorkerHandle {
    control: Arc<Control>,
    thread: Option<JoinHandle<WorkerReport>>,
}

impl WorkerHandle {
    /// Attach (or replace) the queue the worker drains.
    pub fn set_data_source(&self, queue: Arc<JobQueue>) {
        self.control.set_source(queue);
    }

    /// Ask the worker to stop once the queue is empty.
    pub fn set_safe_exit(&self) {
        self.control.safe_exit.store(true, Ordering::Release);
        if let Some(queue) = self.control.source() {
            queue.wake();
        }
    }

    pub fn state(&self) -> WorkerState {
        self.control.state()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the worker to terminate.
    ///
    /// Blocks until someone calls [`set_safe_exit`](Self::set_safe_exit);
    /// use [`shutdown`](Self::shutdown) to do both.
    pub fn join(mut self) -> Result<WorkerReport, FilterError> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| FilterError::WorkerPanicked),
            None => Err(FilterError::WorkerPanicked),
        }
    }

    /// Request a safe exit, drain the queue and join.
    pub fn shutdown(self) -> Result<WorkerReport, FilterError> {
        self.set_safe_exit();
        self.join()
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.set_safe_exit();
            if thread.join().is_err() {
                warn!("worker thread panicked");
            }
        }
    }
}

struct WorkerLoop<S> {
    filter: MatchedFilter,
    config: FilterConfig,
    control: Arc<Control>,
    sink: S,
    report: WorkerReport,
}

impl<S: RowSink> WorkerLoop<S> {
    fn run(mut self) -> WorkerReport {
        debug!(
            buffer_size = self.filter.buffer_size(),
            buffer_step = self.filter.buffer_step(),
            "FFT worker started"
        );

        loop {
            let Some(queue) = self.control.source() else {
                if self.control.exit_requested() {
                    break;
                }
                thread::sleep(self.config.poll_interval);
                continue;
            };

            let job = {
                let mut pending = queue.lock();
                if pending.any() {
                    pending.dequeue()
                } else if self.control.exit_requested() {
                    break;
                } else {
                    drop(pending.wait_timeout(self.config.poll_interval));
                    continue;
                }
            };

            if let Some(job) = job {
                self.control.set_state(WorkerState::Processing);
                self.handle_job(job);
                self.control.set_state(WorkerState::Idle);
            }
        }

        self.control.set_state(WorkerState::Terminated);
        debug!(
            processed = self.report.jobs_processed,
            skipped = self.report.jobs_skipped,
            guarded = self.report.guarded_samples,
            "FFT worker finished"
        );
        self.report
    }

    fn handle_job(&mut self, job: Job) {
        #[cfg(feature = "dump-raw")]
        if let Err(e) = crate::dump::write_raw(&self.config.dump_dir, &job, 0) {
            debug!(error = %e, "unable to dump raw samples");
        }

        match self.filter.process(&job) {
            Ok(outcome) => {
                self.report.jobs_processed += 1;
                self.report.guarded_samples += outcome.guarded;

                #[cfg(feature = "dump-fft")]
                if let Err(e) = crate::dump::write_row(&self.config.dump_dir, &outcome.row) {
                    debug!(error = %e, "unable to dump fft");
                }

                self.sink.accept(outcome.row);
            }
            Err(e) => {
                self.report.jobs_skipped += 1;
                warn!(error = %e, frequency = job.frequency(), "skipping job");
            }
        }
    }
}
