use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Semaphore;

use crate::scheduler::job::Job;

/// Bounded FIFO admission queue with non-blocking semantics on both ends.
///
/// No caller ever suspends waiting for space or data: a full queue rejects the
/// produce and accounts it as overflow, an empty queue returns `None`. Slot
/// accounting uses two counting semaphores (free slots and filled slots)
/// acquired with try-acquire only, plus a mutex on the buffer itself, so the
/// length can never exceed the capacity and no two consumers receive the same
/// job.
#[derive(Debug)]
pub struct JobQueue {
    buf: Mutex<VecDeque<Job>>,
    free_slots: Semaphore,
    filled_slots: Semaphore,
    capacity: usize,
    overflow: AtomicU64,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Mutex::new(VecDeque::with_capacity(capacity)),
            free_slots: Semaphore::new(capacity),
            filled_slots: Semaphore::new(0),
            capacity,
            overflow: AtomicU64::new(0),
        }
    }

    fn buffer(&self) -> MutexGuard<'_, VecDeque<Job>> {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Offer a job for admission. Returns false and bumps the overflow
    /// counter when the queue is at capacity; the rejected job is dropped.
    pub fn produce(&self, job: Job) -> bool {
        let Ok(permit) = self.free_slots.try_acquire() else {
            let overflow = self.overflow.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(job_id = %job.id, overflow, "queue full, job rejected");
            return false;
        };
        permit.forget();

        {
            let mut buf = self.buffer();
            buf.push_back(job);
            tracing::debug!(depth = buf.len(), "job enqueued");
        }
        self.filled_slots.add_permits(1);
        true
    }

    /// Remove and return the head of the queue, or `None` immediately when
    /// nothing is ready.
    pub fn try_consume(&self) -> Option<Job> {
        let permit = self.filled_slots.try_acquire().ok()?;
        permit.forget();

        let job = {
            let mut buf = self.buffer();
            let job = buf.pop_front();
            tracing::debug!(depth = buf.len(), "job dequeued");
            job
        };
        self.free_slots.add_permits(1);
        job
    }

    pub fn len(&self) -> usize {
        self.buffer().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.free_slots.available_permits() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Point-in-time copy of the queued jobs in FIFO order, for display.
    pub fn snapshot(&self) -> Vec<Job> {
        self.buffer().iter().cloned().collect()
    }

    /// Rejected produce calls since construction or the last reset.
    pub fn overflow_count(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }

    pub fn reset_overflow_count(&self) {
        self.overflow.store(0, Ordering::Relaxed);
    }
}
