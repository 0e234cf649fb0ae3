use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SchedError};
use crate::scheduler::{JobId, Scheduler};

/// What one tick accomplished.
#[derive(Debug, Default)]
pub struct TickSummary {
    pub retired: Vec<JobId>,
    pub line_cells: usize,
    pub line_jobs: Vec<JobId>,
    pub newly_starved: usize,
}

impl TickSummary {
    fn is_quiet(&self) -> bool {
        self.retired.is_empty() && self.line_cells == 0 && self.newly_starved == 0
    }
}

/// Periodic background task that advances job timers, retires finished jobs,
/// and clears completed lines.
///
/// Each scheduler operation inside a tick runs under the scheduler's state
/// lock; cancellation is only observed between ticks, so stopping never
/// leaves partial tick effects behind.
#[derive(Debug)]
pub struct ReclaimWorker {
    scheduler: Arc<Scheduler>,
    interval: Duration,
    stop_timeout: Duration,
    paused: Arc<AtomicBool>,
    shutdown: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ReclaimWorker {
    pub fn new(scheduler: Arc<Scheduler>, interval: Duration, stop_timeout: Duration) -> Self {
        Self {
            scheduler,
            interval,
            stop_timeout,
            paused: Arc::new(AtomicBool::new(false)),
            shutdown: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the reclaim loop. Starting an already-running worker logs a
    /// warning and does nothing. Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut slot = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            tracing::warn!("reclaim worker already running");
            return;
        }
        self.paused.store(false, Ordering::Relaxed);

        let scheduler = self.scheduler.clone();
        let paused = self.paused.clone();
        let token = self.shutdown.clone();
        let interval = self.interval;
        *slot = Some(tokio::spawn(async move {
            Self::run_loop(scheduler, interval, paused, token).await;
        }));
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "reclaim worker started");
    }

    async fn run_loop(
        scheduler: Arc<Scheduler>,
        interval: Duration,
        paused: Arc<AtomicBool>,
        token: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    if paused.load(Ordering::Relaxed) {
                        continue;
                    }
                    match Self::run_tick(&scheduler) {
                        Ok(summary) if !summary.is_quiet() => {
                            tracing::debug!(
                                retired = summary.retired.len(),
                                line_cells = summary.line_cells,
                                line_jobs = summary.line_jobs.len(),
                                newly_starved = summary.newly_starved,
                                "reclaim tick"
                            );
                        }
                        Ok(_) => {}
                        // One bad tick must not kill the loop
                        Err(e) => tracing::error!(error = %e, "reclaim tick failed"),
                    }
                }
            }
        }
        tracing::info!("reclaim worker stopped");
    }

    fn run_tick(scheduler: &Scheduler) -> Result<TickSummary> {
        let now = Instant::now();
        let retired = scheduler.advance_timers(now);
        let lines = scheduler.clear_completed_lines()?;
        let newly_starved = scheduler.sweep_starving(now);
        Ok(TickSummary {
            retired,
            line_cells: lines.cells,
            line_jobs: lines.jobs,
            newly_starved,
        })
    }

    /// Skip tick bodies while keeping the task polling.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
        tracing::debug!("reclaim worker paused");
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
        tracing::debug!("reclaim worker resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Cancel the loop and wait for the task to exit, bounded by the stop
    /// timeout. Idempotent; a second stop returns immediately.
    pub async fn stop(&self) -> Result<()> {
        self.shutdown.cancel();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return Ok(());
        };
        match tokio::time::timeout(self.stop_timeout, handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                // A panicked tick task still counts as observably exited
                tracing::error!(error = %e, "reclaim worker task ended abnormally");
                Ok(())
            }
            Err(_) => Err(SchedError::StopTimeout(self.stop_timeout)),
        }
    }
}
