//! Job queue
//!
//! FIFO of pending sample blocks shared between an acquisition thread and the
//! convolution worker. A single mutex guards the queue; [`JobQueue::lock`]
//! hands out a guard so a consumer can check-then-dequeue atomically.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rustfft::num_complex::Complex64;

/// One raw complex sample block submitted for matched filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    samples: Vec<Complex64>,
    frequency: f64,
}

impl Job {
    /// Create a job from its samples and the centre frequency (Hz) they were taken at.
    pub fn new(samples: Vec<Complex64>, frequency: f64) -> Self {
        Self { samples, frequency }
    }

    pub fn samples(&self) -> &[Complex64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Centre frequency tag in Hz
    pub fn frequency(&self) -> f64 {
        self.frequency
    }
}

/// Thread-safe FIFO of jobs.
#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: Mutex<VecDeque<Job>>,
    available: Condvar,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job to the tail and wake a waiting consumer.
    pub fn enqueue(&self, job: Job) {
        self.lock().push(job);
        self.available.notify_one();
    }

    /// Reports whether any job is pending.
    ///
    /// The answer may be stale by the time the caller acts on it; use
    /// [`JobQueue::lock`] to pair the check with a dequeue.
    pub fn any(&self) -> bool {
        self.lock().any()
    }

    /// Remove and return the head job, or `None` if the queue is empty.
    pub fn dequeue(&self) -> Option<Job> {
        self.lock().dequeue()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        !self.any()
    }

    /// Acquire the queue lock for a multi-step operation.
    pub fn lock(&self) -> JobQueueGuard<'_> {
        JobQueueGuard {
            jobs: self.jobs.lock().unwrap_or_else(PoisonError::into_inner),
            available: &self.available,
        }
    }

    /// Wake every waiting consumer without enqueuing anything.
    ///
    /// Takes the lock first so a consumer that has just checked its exit flag
    /// under the lock cannot miss the notification.
    pub fn wake(&self) {
        let _jobs = self.lock();
        self.available.notify_all();
    }
}

/// Scoped lock over a [`JobQueue`]. Dropping it unlocks the queue.
pub struct JobQueueGuard<'a> {
    jobs: MutexGuard<'a, VecDeque<Job>>,
    available: &'a Condvar,
}

impl<'a> JobQueueGuard<'a> {
    pub fn any(&self) -> bool {
        !self.jobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn dequeue(&mut self) -> Option<Job> {
        self.jobs.pop_front()
    }

    pub fn push(&mut self, job: Job) {
        self.jobs.push_back(job);
    }

    /// Release the lock and wait up to `timeout` for a notification, then
    /// re-acquire it. Spurious wakeups are possible; re-check [`any`](Self::any).
    pub fn wait_timeout(self, timeout: Duration) -> Self {
        let available = self.available;
        let (jobs, _) = available
            .wait_timeout(self.jobs, timeout)
            .unwrap_or_else(PoisonError::into_inner);
        Self { jobs, available }
    }
}
