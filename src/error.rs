use thiserror::Error;

use crate::task::TaskKey;

/// Expected failure modes, returned as values. The scheduler never panics
/// for any of these; internal inconsistencies (stale bindings) self-heal on
/// the next dispatch pass instead of surfacing here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("task {0} not found")]
    NotFound(TaskKey),
    #[error("task kind already queued: {0}")]
    NameExists(String),
    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
