pub mod engine;
pub mod grid;
pub mod job;
pub mod queue;

pub use engine::{LineClear, Scheduler, Stats};
pub use grid::{Grid, GridPos};
pub use job::{Color, IdAllocator, Job, JobFactory, JobId, JobState, Shape};
pub use queue::JobQueue;
