use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::SchedConfig;
use crate::error::{Result, SchedError};
use crate::scheduler::grid::{Grid, GridPos};
use crate::scheduler::job::{Job, JobId, JobState};
use crate::scheduler::queue::JobQueue;

/// Grid and registry live behind one mutex: placement, removal, line
/// detection, clear application, and timer advancement are all totally
/// ordered against each other.
#[derive(Debug)]
struct SchedState {
    grid: Grid,
    jobs: HashMap<JobId, Job>,
}

/// Read-only counters exposed to the display layer.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Stats {
    /// Jobs retired by natural completion, line-clear, or eviction
    pub jobs_cleared: u64,
    /// Waiting jobs that crossed the starvation threshold (counted once each)
    pub jobs_starved: u64,
    /// Rejected produce calls since the last reset
    pub queue_overflow: u64,
    /// Jobs currently sitting in the admission queue
    pub queue_depth: usize,
    /// Jobs currently known to the scheduler (waiting, placed, or finished)
    pub active_jobs: usize,
}

/// Result of one line-clear pass.
#[derive(Debug, Default)]
pub struct LineClear {
    /// Cells belonging to the completed rows and columns
    pub cells: usize,
    /// Jobs removed by the clear
    pub jobs: Vec<JobId>,
}

/// Owns the occupancy grid, the active-job registry, and the admission queue.
///
/// The grid/registry mutex and the queue's internal synchronization are
/// separate lock domains and are never held together; operations that touch
/// both (admission) run as two independently-atomic steps.
#[derive(Debug)]
pub struct Scheduler {
    state: Mutex<SchedState>,
    queue: JobQueue,
    max_wait_time: Duration,
    cleared: AtomicU64,
    starved: AtomicU64,
}

impl Scheduler {
    pub fn new(config: SchedConfig) -> Self {
        Self {
            state: Mutex::new(SchedState {
                grid: Grid::new(config.grid_width, config.grid_height),
                jobs: HashMap::new(),
            }),
            queue: JobQueue::new(config.queue_capacity),
            max_wait_time: config.max_wait_time,
            cleared: AtomicU64::new(0),
            starved: AtomicU64::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, SchedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    /// Offer a freshly spawned job for admission. Delegates to the queue's
    /// own synchronization domain; a rejection is accounted there.
    pub fn offer(&self, job: Job) -> bool {
        self.queue.produce(job)
    }

    /// Move the queue head into the registry as a waiting job. Queue drain
    /// and registry insert are two separately-atomic steps so the queue lock
    /// and the state lock are never held together.
    pub fn admit_next(&self) -> Option<JobId> {
        let job = self.queue.try_consume()?;
        let id = job.id;
        self.state().jobs.insert(id, job);
        tracing::debug!(job_id = %id, "job admitted to waiting set");
        Some(id)
    }

    pub fn can_place(&self, id: JobId, x: i32, y: i32) -> bool {
        let st = self.state();
        match st.jobs.get(&id) {
            Some(job) if job.state() == JobState::Waiting => st.grid.can_place(job.shape(), x, y),
            _ => false,
        }
    }

    /// Validate and commit a placement. Returns false without side effects on
    /// an unknown id, a non-waiting job, an out-of-bounds target, or a
    /// collision.
    pub fn place(&self, id: JobId, x: i32, y: i32) -> bool {
        let now = Instant::now();
        let mut st = self.state();
        let SchedState { grid, jobs } = &mut *st;
        let Some(job) = jobs.get_mut(&id) else {
            return false;
        };
        if job.state() != JobState::Waiting || !grid.can_place(job.shape(), x, y) {
            return false;
        }
        grid.occupy(job.shape(), x, y, id);
        job.place_at(GridPos { x, y }, now);
        tracing::debug!(job_id = %id, x, y, "job placed");
        true
    }

    /// Lift a placed job back to waiting: release its cells, bank the run
    /// time. No-op (false) when the job is not currently placed.
    pub fn remove(&self, id: JobId) -> bool {
        let now = Instant::now();
        let mut st = self.state();
        let SchedState { grid, jobs } = &mut *st;
        let Some(job) = jobs.get_mut(&id) else {
            return false;
        };
        if job.state() != JobState::Placed {
            return false;
        }
        grid.vacate(id);
        job.lift(now);
        tracing::debug!(job_id = %id, elapsed_ms = job.elapsed().as_millis() as u64, "job lifted");
        true
    }

    /// Delete a job outright, releasing any cells it holds. Counts toward the
    /// cleared total. Not a Finished transition.
    pub fn evict(&self, id: JobId) -> bool {
        let mut st = self.state();
        if st.jobs.remove(&id).is_none() {
            return false;
        }
        st.grid.vacate(id);
        self.cleared.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(job_id = %id, "job evicted");
        true
    }

    /// Advance the timers of all placed jobs as of `now` and retire those
    /// that reach their limit: cells released, dropped from the registry,
    /// counted as cleared. Returns the retired ids.
    pub fn advance_timers(&self, now: Instant) -> Vec<JobId> {
        let mut st = self.state();
        let finished: Vec<JobId> = st
            .jobs
            .values_mut()
            .filter_map(|job| job.advance(now).then_some(job.id))
            .collect();
        for &id in &finished {
            st.grid.vacate(id);
            st.jobs.remove(&id);
            tracing::debug!(job_id = %id, "job finished, retired");
        }
        self.cleared.fetch_add(finished.len() as u64, Ordering::Relaxed);
        finished
    }

    /// Detect completed rows and columns and apply the clear as one atomic
    /// batch. Every job referenced by the completed cells is removed
    /// wholesale, even when only part of its shape lies on a cleared line;
    /// partially-cleared jobs are not reshaped. Known limitation.
    ///
    /// Fails without mutating anything when a completed cell references a job
    /// missing from the registry, which would mean the occupancy map and the
    /// registry have diverged.
    pub fn clear_completed_lines(&self) -> Result<LineClear> {
        let mut st = self.state();
        let cells = st.grid.completed_cells();
        if cells.is_empty() {
            return Ok(LineClear::default());
        }

        let mut ids: Vec<JobId> = Vec::new();
        for &pos in &cells {
            if let Some(id) = st.grid.get(pos) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        for &id in &ids {
            if !st.jobs.contains_key(&id) {
                return Err(SchedError::JobNotFound(id));
            }
        }

        for &id in &ids {
            st.grid.vacate(id);
            st.jobs.remove(&id);
        }
        self.cleared.fetch_add(ids.len() as u64, Ordering::Relaxed);
        tracing::info!(cells = cells.len(), jobs = ids.len(), "completed lines cleared");
        Ok(LineClear {
            cells: cells.len(),
            jobs: ids,
        })
    }

    /// Flag waiting jobs that have crossed the starvation threshold, each at
    /// most once. Returns how many were newly flagged.
    pub fn sweep_starving(&self, now: Instant) -> usize {
        let max_wait = self.max_wait_time;
        let mut st = self.state();
        let newly = st
            .jobs
            .values_mut()
            .map(|job| job.flag_starving(now, max_wait))
            .filter(|&flagged| flagged)
            .count();
        if newly > 0 {
            self.starved.fetch_add(newly as u64, Ordering::Relaxed);
            tracing::warn!(count = newly, "waiting jobs starving");
        }
        newly
    }

    /// Deep copy of the occupancy matrix, safe for concurrent readers.
    pub fn grid_snapshot(&self) -> Vec<Vec<Option<JobId>>> {
        self.state().grid.snapshot()
    }

    /// Clone of one registered job, if known.
    pub fn job(&self, id: JobId) -> Option<Job> {
        self.state().jobs.get(&id).cloned()
    }

    /// Clones of all registered jobs, ordered by id for stable display.
    pub fn jobs(&self) -> Vec<Job> {
        let st = self.state();
        let mut jobs: Vec<Job> = st.jobs.values().cloned().collect();
        jobs.sort_by_key(|job| job.id);
        jobs
    }

    pub fn waiting_count(&self) -> usize {
        self.state()
            .jobs
            .values()
            .filter(|job| job.state() == JobState::Waiting)
            .count()
    }

    pub fn stats(&self) -> Stats {
        // State lock and queue lock are taken one after the other, never
        // nested.
        let active_jobs = self.state().jobs.len();
        Stats {
            jobs_cleared: self.cleared.load(Ordering::Relaxed),
            jobs_starved: self.starved.load(Ordering::Relaxed),
            queue_overflow: self.queue.overflow_count(),
            queue_depth: self.queue.len(),
            active_jobs,
        }
    }
}
