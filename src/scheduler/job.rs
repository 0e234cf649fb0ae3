use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use rand::Rng;

use crate::scheduler::grid::GridPos;

/// Unique job identifier. Issued sequentially by an [`IdAllocator`], never
/// reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Waiting,
    Placed,
    Finished,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Waiting => write!(f, "waiting"),
            JobState::Placed => write!(f, "placed"),
            JobState::Finished => write!(f, "finished"),
        }
    }
}

/// Display tag carried by a job. Irrelevant to scheduling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Cyan,
    Yellow,
    Magenta,
    Orange,
    Green,
}

/// Rectangular boolean occupancy mask. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl Shape {
    /// Build a shape from row-major rows of 0/1 flags. All rows must have the
    /// same length and at least one cell must be set.
    pub fn from_rows(rows: &[&[u8]]) -> Self {
        assert!(!rows.is_empty(), "shape must have at least one row");
        let width = rows[0].len();
        assert!(width > 0, "shape rows must not be empty");
        let mut cells = Vec::with_capacity(rows.len() * width);
        for row in rows {
            assert_eq!(row.len(), width, "shape rows must be rectangular");
            cells.extend(row.iter().map(|&c| c != 0));
        }
        assert!(cells.iter().any(|&c| c), "shape must cover at least one cell");
        Self {
            width,
            height: rows.len(),
            cells,
        }
    }

    /// Horizontal 4x1 bar
    pub fn bar() -> Self {
        Self::from_rows(&[&[1, 1, 1, 1]])
    }

    /// 2x2 square
    pub fn square() -> Self {
        Self::from_rows(&[&[1, 1], &[1, 1]])
    }

    /// T piece
    pub fn tee() -> Self {
        Self::from_rows(&[&[1, 1, 1], &[0, 1, 0]])
    }

    /// L piece
    pub fn ell() -> Self {
        Self::from_rows(&[&[1, 0], &[1, 0], &[1, 1]])
    }

    /// S piece
    pub fn ess() -> Self {
        Self::from_rows(&[&[0, 1, 1], &[1, 1, 0]])
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn covers(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.cells[y * self.width + x]
    }

    /// Iterate the (x, y) offsets of every set cell, row by row.
    pub fn offsets(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.height)
            .flat_map(move |y| (0..self.width).map(move |x| (x, y)))
            .filter(move |&(x, y)| self.covers(x, y))
    }

    pub fn cell_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }
}

/// A schedulable unit: a shaped block of work with a fixed run-time budget and
/// a three-state lifecycle (waiting, placed, finished).
///
/// Timer bookkeeping is driven externally: the scheduler calls
/// [`place_at`](Job::place_at) / [`lift`](Job::lift) on placement changes and
/// the reclaim worker calls [`advance`](Job::advance) each tick. `elapsed`
/// accumulates only while placed and survives lift/replace cycles.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub color: Color,
    shape: Shape,
    position: Option<GridPos>,
    time_limit: Duration,
    elapsed: Duration,
    running_since: Option<Instant>,
    created_at: Instant,
    state: JobState,
    starved: bool,
}

impl Job {
    pub fn new(id: JobId, shape: Shape, color: Color, time_limit: Duration, now: Instant) -> Self {
        Self {
            id,
            color,
            shape,
            position: None,
            time_limit,
            elapsed: Duration::ZERO,
            running_since: None,
            created_at: now,
            state: JobState::Waiting,
            starved: false,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn position(&self) -> Option<GridPos> {
        self.position
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    /// Run time accumulated during previous placements. Does not include the
    /// currently running span; see [`running_time`](Job::running_time).
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Total run time as of `now`, including the live span when placed.
    pub fn running_time(&self, now: Instant) -> Duration {
        match self.running_since {
            Some(since) => self.elapsed + now.saturating_duration_since(since),
            None => self.elapsed,
        }
    }

    /// Fraction of the time limit consumed, clamped to 1.0.
    pub fn progress(&self, now: Instant) -> f64 {
        if self.time_limit.is_zero() {
            return 1.0;
        }
        (self.running_time(now).as_secs_f64() / self.time_limit.as_secs_f64()).min(1.0)
    }

    /// A waiting job is starving once it has waited longer than `max_wait`.
    /// Derived predicate only; never changes the lifecycle state.
    pub fn is_starving(&self, now: Instant, max_wait: Duration) -> bool {
        self.state == JobState::Waiting
            && now.saturating_duration_since(self.created_at) > max_wait
    }

    /// Flag this job as having starved, once. Returns true the first time the
    /// predicate holds so callers can count each job exactly once.
    pub(crate) fn flag_starving(&mut self, now: Instant, max_wait: Duration) -> bool {
        if self.starved || !self.is_starving(now, max_wait) {
            return false;
        }
        self.starved = true;
        true
    }

    pub fn starved(&self) -> bool {
        self.starved
    }

    /// Waiting -> Placed: record the position and start the run timer.
    pub(crate) fn place_at(&mut self, pos: GridPos, now: Instant) {
        self.position = Some(pos);
        self.state = JobState::Placed;
        if self.running_since.is_none() {
            self.running_since = Some(now);
        }
    }

    /// Placed -> Waiting: bank the running span and pause the timer.
    pub(crate) fn lift(&mut self, now: Instant) {
        if let Some(since) = self.running_since.take() {
            let span = now.saturating_duration_since(since);
            self.elapsed = (self.elapsed + span).min(self.time_limit);
        }
        self.position = None;
        self.state = JobState::Waiting;
    }

    /// Advance the timer as of `now`. Returns true on the tick where the job
    /// first reaches its time limit (Placed -> Finished); the elapsed time is
    /// capped at the limit and the timer stops.
    pub(crate) fn advance(&mut self, now: Instant) -> bool {
        if self.state != JobState::Placed {
            return false;
        }
        let Some(since) = self.running_since else {
            return false;
        };
        let run = self.elapsed + now.saturating_duration_since(since);
        if run < self.time_limit {
            return false;
        }
        self.elapsed = self.time_limit;
        self.running_since = None;
        self.state = JobState::Finished;
        true
    }
}

/// Sequential id source. Owned by whichever component constructs jobs.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self) -> JobId {
        JobId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Builds randomized jobs: one of five shape variants with a per-variant
/// color and a uniformly drawn run-time budget.
#[derive(Debug)]
pub struct JobFactory {
    ids: IdAllocator,
    min_run: Duration,
    max_run: Duration,
}

impl JobFactory {
    pub fn new(min_run: Duration, max_run: Duration) -> Self {
        Self {
            ids: IdAllocator::new(),
            min_run,
            max_run,
        }
    }

    pub fn spawn<R: Rng>(&self, rng: &mut R, now: Instant) -> Job {
        let (shape, color) = match rng.gen_range(0..5) {
            0 => (Shape::bar(), Color::Cyan),
            1 => (Shape::square(), Color::Yellow),
            2 => (Shape::tee(), Color::Magenta),
            3 => (Shape::ell(), Color::Orange),
            _ => (Shape::ess(), Color::Green),
        };
        let min = self.min_run.as_millis() as u64;
        let max = self.max_run.as_millis() as u64;
        let limit = Duration::from_millis(rng.gen_range(min..=max));
        Job::new(self.ids.allocate(), shape, color, limit, now)
    }
}
