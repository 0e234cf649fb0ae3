use std::time::Duration;

use thiserror::Error;

use crate::scheduler::JobId;

#[derive(Error, Debug)]
pub enum SchedError {
    #[error("occupancy map references unknown job {0}")]
    JobNotFound(JobId),

    #[error("reclaim worker did not stop within {0:?}")]
    StopTimeout(Duration),
}

pub type Result<T> = std::result::Result<T, SchedError>;
