//! Scheduler and offload error types.

use thiserror::Error;

use crate::unit::UnitId;

/// Errors raised by the scheduler and by units that need their owner.
#[derive(Debug, Error)]
pub enum LoopError {
    #[error("scheduler has been dropped")]
    Stopped,

    #[error("unit is not attached to a scheduler")]
    Detached,

    #[error("unit is already attached to a scheduler")]
    AlreadyAttached,

    #[error("unit {unit} failed: {source:#}")]
    UnitFailed {
        unit: UnitId,
        #[source]
        source: anyhow::Error,
    },

    #[error("worker runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

pub type LoopResult<T> = Result<T, LoopError>;

/// Outcome of an offloaded job that did not produce a value.
#[derive(Debug, Error)]
pub enum JobError<E> {
    /// The job ran and returned its own error.
    #[error("{0}")]
    Failed(E),

    #[error("worker panicked: {0}")]
    Panicked(String),

    #[error("worker dropped the job before completing it")]
    Lost,
}

impl<E> JobError<E> {
    /// The job's own error, if it got far enough to return one.
    pub fn failure(&self) -> Option<&E> {
        match self {
            JobError::Failed(e) => Some(e),
            _ => None,
        }
    }
}
