//! Background reclamation of grid state.
//!
//! The reclaim worker is the system's consumer and garbage collector. On a
//! fixed interval it:
//! - advances the run timers of placed jobs and retires the finished ones,
//! - detects completed rows/columns and applies the clear as one batch,
//! - flags waiting jobs that have crossed the starvation threshold.
//!
//! # Lifecycle
//!
//! `start` spawns the loop as a tokio task; `pause`/`resume` gate the tick
//! body without stopping the task; `stop` cancels the loop and joins it with
//! a bounded timeout. A fault inside one tick is logged and the loop carries
//! on at the next interval.

pub mod reclaim;

pub use reclaim::ReclaimWorker;
