//! Placement validation, lift/replace timing, line clearing, and counter
//! behavior of the scheduler core.

use std::time::{Duration, Instant};

use gridsched::config::SchedConfig;
use gridsched::scheduler::{Color, Job, JobId, JobState, Scheduler, Shape};

fn sched(width: usize, height: usize) -> Scheduler {
    Scheduler::new(SchedConfig::new(width, height))
}

/// Offer a job and pull it straight into the waiting set.
fn admit(scheduler: &Scheduler, id: u64, shape: Shape, limit: Duration) -> JobId {
    let job = Job::new(JobId(id), shape, Color::Green, limit, Instant::now());
    assert!(scheduler.offer(job));
    let admitted = scheduler.admit_next().expect("queue should not be empty");
    assert_eq!(admitted, JobId(id));
    admitted
}

#[test]
fn admission_moves_job_from_queue_to_waiting_set() {
    let scheduler = sched(4, 4);
    let job = Job::new(
        JobId(1),
        Shape::square(),
        Color::Yellow,
        Duration::from_secs(5),
        Instant::now(),
    );
    assert!(scheduler.offer(job));
    assert_eq!(scheduler.queue().len(), 1);
    assert_eq!(scheduler.stats().queue_depth, 1);

    assert_eq!(scheduler.admit_next(), Some(JobId(1)));
    assert_eq!(scheduler.queue().len(), 0);
    assert_eq!(scheduler.waiting_count(), 1);
    assert_eq!(scheduler.job(JobId(1)).unwrap().state(), JobState::Waiting);

    assert!(scheduler.admit_next().is_none());
}

#[test]
fn place_validates_bounds_and_collisions() {
    let scheduler = sched(4, 4);
    let a = admit(&scheduler, 1, Shape::square(), Duration::from_secs(5));
    let b = admit(&scheduler, 2, Shape::square(), Duration::from_secs(5));

    // Bottom-right corner leaves no room for a 2x2 square
    assert!(!scheduler.can_place(a, 3, 3));
    assert!(!scheduler.place(a, 3, 3));
    assert!(!scheduler.place(a, -1, 0));

    assert!(scheduler.place(a, 0, 0));
    assert_eq!(scheduler.job(a).unwrap().state(), JobState::Placed);

    let before = scheduler.grid_snapshot();
    assert!(!scheduler.can_place(b, 1, 1));
    assert!(!scheduler.place(b, 1, 1));
    assert_eq!(
        scheduler.grid_snapshot(),
        before,
        "failed placement must leave the grid untouched"
    );
    assert_eq!(scheduler.job(b).unwrap().state(), JobState::Waiting);

    assert!(scheduler.place(b, 2, 2));
}

#[test]
fn placed_job_cannot_be_placed_again() {
    let scheduler = sched(4, 4);
    let a = admit(&scheduler, 1, Shape::square(), Duration::from_secs(5));
    assert!(scheduler.place(a, 0, 0));
    assert!(!scheduler.place(a, 2, 2));
    assert_eq!(
        scheduler.job(a).unwrap().position().map(|p| (p.x, p.y)),
        Some((0, 0))
    );
}

#[test]
fn unknown_job_is_rejected_everywhere() {
    let scheduler = sched(4, 4);
    assert!(!scheduler.can_place(JobId(9), 0, 0));
    assert!(!scheduler.place(JobId(9), 0, 0));
    assert!(!scheduler.remove(JobId(9)));
    assert!(!scheduler.evict(JobId(9)));
}

#[test]
fn occupancy_matches_shape_and_position() {
    let scheduler = sched(4, 4);
    let a = admit(&scheduler, 1, Shape::tee(), Duration::from_secs(5));
    assert!(scheduler.place(a, 0, 0));

    let snap = scheduler.grid_snapshot();
    for (x, y) in [(0, 0), (1, 0), (2, 0), (1, 1)] {
        assert_eq!(snap[y][x], Some(a), "cell ({x}, {y}) should belong to the tee");
    }
    for (x, y) in [(0, 1), (2, 1), (3, 0), (0, 2)] {
        assert_eq!(snap[y][x], None, "cell ({x}, {y}) should be empty");
    }
}

#[test]
fn remove_releases_cells_and_preserves_elapsed() {
    let scheduler = sched(4, 4);
    let a = admit(&scheduler, 1, Shape::square(), Duration::from_secs(5));
    assert!(scheduler.place(a, 0, 0));

    std::thread::sleep(Duration::from_millis(30));
    assert!(scheduler.remove(a));

    let job = scheduler.job(a).unwrap();
    assert_eq!(job.state(), JobState::Waiting);
    assert!(job.position().is_none());
    assert!(job.elapsed() >= Duration::from_millis(30));
    assert!(job.elapsed() < Duration::from_secs(5));
    let created = job.created_at();
    let banked = job.elapsed();

    assert!(
        scheduler.grid_snapshot().iter().flatten().all(|c| c.is_none()),
        "lifting must release every cell"
    );

    // Re-placing keeps the banked run time and the original creation time
    assert!(scheduler.place(a, 1, 1));
    let job = scheduler.job(a).unwrap();
    assert!(job.elapsed() >= banked);
    assert_eq!(job.created_at(), created);

    // A second remove on the replaced job works; on a waiting job it is a
    // no-op
    assert!(scheduler.remove(a));
    assert!(!scheduler.remove(a));
}

#[test]
fn advance_timers_retires_only_expired_jobs() {
    let scheduler = sched(4, 4);
    let fast = admit(&scheduler, 1, Shape::square(), Duration::ZERO);
    let slow = admit(&scheduler, 2, Shape::square(), Duration::from_secs(5));
    assert!(scheduler.place(fast, 0, 0));
    assert!(scheduler.place(slow, 2, 2));

    let retired = scheduler.advance_timers(Instant::now());
    assert_eq!(retired, vec![fast]);
    assert!(scheduler.job(fast).is_none());
    assert_eq!(scheduler.job(slow).unwrap().state(), JobState::Placed);
    assert_eq!(scheduler.stats().jobs_cleared, 1);

    let snap = scheduler.grid_snapshot();
    assert_eq!(snap[0][0], None, "retired job must release its cells");
    assert_eq!(snap[2][2], Some(slow));
}

#[test]
fn full_row_is_cleared() {
    let scheduler = sched(4, 4);
    let a = admit(&scheduler, 1, Shape::bar(), Duration::from_secs(30));
    assert!(scheduler.place(a, 0, 0));

    let outcome = scheduler.clear_completed_lines().unwrap();
    assert_eq!(outcome.cells, 4);
    assert_eq!(outcome.jobs, vec![a]);
    assert!(scheduler.job(a).is_none());
    assert_eq!(scheduler.stats().jobs_cleared, 1);
    assert!(scheduler.grid_snapshot().iter().flatten().all(|c| c.is_none()));

    // Nothing left to clear
    let outcome = scheduler.clear_completed_lines().unwrap();
    assert_eq!(outcome.cells, 0);
    assert!(outcome.jobs.is_empty());
}

#[test]
fn full_column_is_cleared() {
    let scheduler = sched(4, 4);
    let column = Shape::from_rows(&[&[1], &[1], &[1], &[1]]);
    let a = admit(&scheduler, 1, column, Duration::from_secs(30));
    assert!(scheduler.place(a, 2, 0));

    let outcome = scheduler.clear_completed_lines().unwrap();
    assert_eq!(outcome.cells, 4);
    assert_eq!(outcome.jobs, vec![a]);
    assert!(scheduler.grid_snapshot().iter().flatten().all(|c| c.is_none()));
}

#[test]
fn two_squares_complete_two_rows() {
    let scheduler = sched(4, 4);
    let a = admit(&scheduler, 1, Shape::square(), Duration::from_secs(30));
    let b = admit(&scheduler, 2, Shape::square(), Duration::from_secs(30));
    assert!(scheduler.place(a, 0, 0));
    assert!(scheduler.place(b, 2, 0));

    // Rows 0 and 1 are both complete; each job is evaluated once against the
    // union of the completed cells
    let outcome = scheduler.clear_completed_lines().unwrap();
    assert_eq!(outcome.cells, 8);
    assert_eq!(outcome.jobs.len(), 2);
    assert_eq!(scheduler.stats().jobs_cleared, 2);
    assert_eq!(scheduler.stats().active_jobs, 0);
    assert!(scheduler.grid_snapshot().iter().flatten().all(|c| c.is_none()));
}

#[test]
fn partial_occupant_is_removed_wholesale() {
    let scheduler = sched(4, 4);
    let square = admit(&scheduler, 1, Shape::square(), Duration::from_secs(30));
    let filler = admit(
        &scheduler,
        2,
        Shape::from_rows(&[&[1, 1]]),
        Duration::from_secs(30),
    );
    assert!(scheduler.place(square, 0, 0));
    assert!(scheduler.place(filler, 2, 0));

    // Only row 0 is complete, but the square's row-1 cells go with it: a
    // partially-cleared job is removed wholesale, not reshaped
    let outcome = scheduler.clear_completed_lines().unwrap();
    assert_eq!(outcome.cells, 4);
    assert_eq!(outcome.jobs.len(), 2);
    assert!(scheduler.job(square).is_none());
    assert!(scheduler.job(filler).is_none());
    assert!(scheduler.grid_snapshot().iter().flatten().all(|c| c.is_none()));
    assert_eq!(scheduler.stats().jobs_cleared, 2);
}

#[test]
fn evict_deletes_job_and_counts_cleared() {
    let scheduler = sched(4, 4);
    let placed = admit(&scheduler, 1, Shape::square(), Duration::from_secs(5));
    let waiting = admit(&scheduler, 2, Shape::square(), Duration::from_secs(5));
    assert!(scheduler.place(placed, 0, 0));

    assert!(scheduler.evict(placed));
    assert!(scheduler.job(placed).is_none());
    assert!(scheduler.grid_snapshot().iter().flatten().all(|c| c.is_none()));

    assert!(scheduler.evict(waiting));
    assert_eq!(scheduler.stats().jobs_cleared, 2);
    assert_eq!(scheduler.stats().active_jobs, 0);
}

#[test]
fn starvation_sweep_flags_each_job_once() {
    let config = SchedConfig::new(4, 4).with_max_wait_time(Duration::from_millis(10));
    let scheduler = Scheduler::new(config);

    let waiting = admit(&scheduler, 1, Shape::square(), Duration::from_secs(5));
    let placed = admit(&scheduler, 2, Shape::square(), Duration::from_secs(5));
    assert!(scheduler.place(placed, 0, 0));

    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(scheduler.sweep_starving(Instant::now()), 1);
    assert_eq!(scheduler.sweep_starving(Instant::now()), 0);
    assert_eq!(scheduler.stats().jobs_starved, 1);

    // Starvation is a display flag, not a lifecycle change
    let job = scheduler.job(waiting).unwrap();
    assert_eq!(job.state(), JobState::Waiting);
    assert!(job.starved());
}
