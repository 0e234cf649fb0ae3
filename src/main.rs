use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use gridsched::config::SchedConfig;
use gridsched::scheduler::{JobFactory, JobState, Scheduler};
use gridsched::shutdown::shutdown_token;
use gridsched::worker::ReclaimWorker;

/// Cadence of the automated driver that stands in for the interactive layer.
const DRIVE_INTERVAL: Duration = Duration::from_millis(250);
const STATS_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "gridsched")]
#[command(version)]
#[command(about = "Grid-based process scheduling simulator")]
struct Args {
    /// Grid width in cells
    #[arg(long, default_value = "10")]
    grid_width: usize,

    /// Grid height in cells
    #[arg(long, default_value = "10")]
    grid_height: usize,

    /// Admission queue capacity
    #[arg(long, default_value = "6")]
    queue_capacity: usize,

    /// Reclaim tick interval in milliseconds
    #[arg(long, default_value = "100")]
    tick_ms: u64,

    /// Job spawn interval in milliseconds
    #[arg(long, default_value = "3000")]
    spawn_ms: u64,

    /// Stop after this many seconds (runs until interrupted when omitted)
    #[arg(long)]
    run_secs: Option<u64>,

    /// RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Print the final summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Default)]
struct DriveCounters {
    spawned: AtomicU64,
    admitted: AtomicU64,
    placed: AtomicU64,
}

#[derive(Serialize)]
struct RunSummary {
    jobs_spawned: u64,
    jobs_admitted: u64,
    jobs_placed: u64,
    jobs_cleared: u64,
    jobs_starved: u64,
    queue_overflow: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = SchedConfig::new(args.grid_width, args.grid_height)
        .with_queue_capacity(args.queue_capacity)
        .with_tick_interval(Duration::from_millis(args.tick_ms))
        .with_spawn_interval(Duration::from_millis(args.spawn_ms));

    let scheduler = Arc::new(Scheduler::new(config.clone()));
    let worker = ReclaimWorker::new(scheduler.clone(), config.tick_interval, config.stop_timeout);
    worker.start();

    let counters = Arc::new(DriveCounters::default());
    let shutdown = shutdown_token();

    tokio::spawn(spawn_loop(
        scheduler.clone(),
        config.clone(),
        args.seed,
        counters.clone(),
        shutdown.clone(),
    ));
    tokio::spawn(drive_loop(
        scheduler.clone(),
        config.clone(),
        counters.clone(),
        shutdown.clone(),
    ));
    tokio::spawn(stats_loop(scheduler.clone(), shutdown.clone()));

    match args.run_secs {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    tracing::info!(secs, "run duration elapsed");
                }
                _ = shutdown.cancelled() => {}
            }
        }
        None => shutdown.cancelled().await,
    }
    shutdown.cancel();
    worker.stop().await?;

    let stats = scheduler.stats();
    let summary = RunSummary {
        jobs_spawned: counters.spawned.load(Ordering::Relaxed),
        jobs_admitted: counters.admitted.load(Ordering::Relaxed),
        jobs_placed: counters.placed.load(Ordering::Relaxed),
        jobs_cleared: stats.jobs_cleared,
        jobs_starved: stats.jobs_starved,
        queue_overflow: stats.queue_overflow,
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        tracing::info!(
            spawned = summary.jobs_spawned,
            admitted = summary.jobs_admitted,
            placed = summary.jobs_placed,
            cleared = summary.jobs_cleared,
            starved = summary.jobs_starved,
            overflow = summary.queue_overflow,
            "run complete"
        );
    }
    Ok(())
}

/// Produce a randomized job every spawn interval. Rejections when the queue
/// is full are absorbed by its overflow accounting.
async fn spawn_loop(
    scheduler: Arc<Scheduler>,
    config: SchedConfig,
    seed: Option<u64>,
    counters: Arc<DriveCounters>,
    token: CancellationToken,
) {
    let factory = JobFactory::new(config.min_run_time, config.max_run_time);
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut ticker = tokio::time::interval(config.spawn_interval);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let job = factory.spawn(&mut rng, Instant::now());
                let id = job.id;
                if scheduler.offer(job) {
                    counters.spawned.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(job_id = %id, "job spawned");
                }
            }
        }
    }
}

/// Stand-in for the interactive layer: drains ready jobs into the waiting set
/// while it has room, then first-fit places waiting jobs onto the grid.
async fn drive_loop(
    scheduler: Arc<Scheduler>,
    config: SchedConfig,
    counters: Arc<DriveCounters>,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(DRIVE_INTERVAL);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                while scheduler.waiting_count() < config.max_waiting {
                    if scheduler.admit_next().is_none() {
                        break;
                    }
                    counters.admitted.fetch_add(1, Ordering::Relaxed);
                }

                for job in scheduler.jobs() {
                    if job.state() != JobState::Waiting {
                        continue;
                    }
                    'fit: for y in 0..config.grid_height as i32 {
                        for x in 0..config.grid_width as i32 {
                            if scheduler.place(job.id, x, y) {
                                counters.placed.fetch_add(1, Ordering::Relaxed);
                                break 'fit;
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Periodic read-only stats line for observability.
async fn stats_loop(scheduler: Arc<Scheduler>, token: CancellationToken) {
    let mut ticker = tokio::time::interval(STATS_INTERVAL);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let stats = scheduler.stats();
                tracing::info!(
                    cleared = stats.jobs_cleared,
                    starved = stats.jobs_starved,
                    overflow = stats.queue_overflow,
                    queue_depth = stats.queue_depth,
                    active = stats.active_jobs,
                    "scheduler stats"
                );
            }
        }
    }
}
