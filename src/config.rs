use std::time::Duration;

/// Tuning knobs for the scheduling core.
///
/// Defaults: a 10x10 grid, a 6-slot admission queue, a 100ms reclaim tick, a
/// 3s spawn interval, and 5-14s job run times.
#[derive(Debug, Clone)]
pub struct SchedConfig {
    /// Grid width in cells
    pub grid_width: usize,
    /// Grid height in cells
    pub grid_height: usize,
    /// Capacity of the admission queue
    pub queue_capacity: usize,
    /// Interval between reclaim worker ticks
    pub tick_interval: Duration,
    /// Interval between spawned jobs
    pub spawn_interval: Duration,
    /// Maximum jobs held in the waiting area at once
    pub max_waiting: usize,
    /// Waiting time after which a job counts as starving
    pub max_wait_time: Duration,
    /// Lower bound of the job run-time draw
    pub min_run_time: Duration,
    /// Upper bound of the job run-time draw
    pub max_run_time: Duration,
    /// How long `stop` waits for the reclaim worker to exit
    pub stop_timeout: Duration,
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self {
            grid_width: 10,
            grid_height: 10,
            queue_capacity: 6,
            tick_interval: Duration::from_millis(100),
            spawn_interval: Duration::from_secs(3),
            max_waiting: 5,
            max_wait_time: Duration::from_secs(30),
            min_run_time: Duration::from_secs(5),
            max_run_time: Duration::from_secs(14),
            stop_timeout: Duration::from_secs(1),
        }
    }
}

impl SchedConfig {
    pub fn new(grid_width: usize, grid_height: usize) -> Self {
        Self {
            grid_width,
            grid_height,
            ..Default::default()
        }
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_spawn_interval(mut self, interval: Duration) -> Self {
        self.spawn_interval = interval;
        self
    }

    pub fn with_max_wait_time(mut self, max_wait: Duration) -> Self {
        self.max_wait_time = max_wait;
        self
    }

    pub fn with_run_time_range(mut self, min: Duration, max: Duration) -> Self {
        self.min_run_time = min;
        self.max_run_time = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default() {
        let cfg = SchedConfig::default();
        assert_eq!(cfg.grid_width, 10);
        assert_eq!(cfg.grid_height, 10);
        assert_eq!(cfg.queue_capacity, 6);
        assert_eq!(cfg.tick_interval, Duration::from_millis(100));
        assert_eq!(cfg.spawn_interval, Duration::from_secs(3));
        assert_eq!(cfg.max_waiting, 5);
        assert_eq!(cfg.max_wait_time, Duration::from_secs(30));
        assert_eq!(cfg.min_run_time, Duration::from_secs(5));
        assert_eq!(cfg.max_run_time, Duration::from_secs(14));
    }

    #[test]
    fn config_new_overrides_grid_dimensions() {
        let cfg = SchedConfig::new(4, 6);
        assert_eq!(cfg.grid_width, 4);
        assert_eq!(cfg.grid_height, 6);
        assert_eq!(cfg.queue_capacity, 6);
    }

    #[test]
    fn config_builders() {
        let cfg = SchedConfig::new(8, 8)
            .with_queue_capacity(3)
            .with_tick_interval(Duration::from_millis(10))
            .with_spawn_interval(Duration::from_millis(50))
            .with_max_wait_time(Duration::from_millis(200))
            .with_run_time_range(Duration::from_millis(20), Duration::from_millis(40));
        assert_eq!(cfg.queue_capacity, 3);
        assert_eq!(cfg.tick_interval, Duration::from_millis(10));
        assert_eq!(cfg.spawn_interval, Duration::from_millis(50));
        assert_eq!(cfg.max_wait_time, Duration::from_millis(200));
        assert_eq!(cfg.min_run_time, Duration::from_millis(20));
        assert_eq!(cfg.max_run_time, Duration::from_millis(40));
    }
}
