use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Scheduler is already running")]
    AlreadyRunning,

    #[error("Scheduler is not running")]
    NotRunning,

    #[error("Jobs did not finish within {0:?}")]
    ShutdownTimeout(Duration),
}

/// Scheduler result type
pub type Result<T> = std::result::Result<T, SchedulerError>;
