use chrono::{DateTime, NaiveDate, Utc};
use shared::fleet::WorkerId;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("conflict: {0}")]
    Conflict(Conflict),
    #[error("not found: {0}")]
    NotFound(Missing),
    #[error("invalid time: shift started at {start} cannot end at {end}")]
    InvalidTime {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("invalid range: start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error("tracking disabled: worker {0} has no open shift")]
    TrackingDisabled(WorkerId),
    #[error("worker {0} is deactivated")]
    InactiveWorker(WorkerId),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Conflict {
    #[error("worker {0} already has an open shift")]
    ShiftAlreadyOpen(WorkerId),
    #[error("a shift change for worker {0} is still being recorded")]
    ShiftChangeInFlight(WorkerId),
    #[error("worker id {0} is already registered")]
    DuplicateWorkerId(WorkerId),
    #[error("worker number {0} is already assigned")]
    DuplicateWorkerNumber(i32),
    #[error("worker {0} has shift history and can only be deactivated")]
    WorkerHasHistory(WorkerId),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Missing {
    #[error("worker {0}")]
    Worker(WorkerId),
    #[error("open shift for worker {0}")]
    OpenShift(WorkerId),
    #[error("open shift {0}")]
    Shift(Uuid),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("store rejected write: {0}")]
    Rejected(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<Conflict> for EngineError {
    fn from(value: Conflict) -> Self {
        Self::Conflict(value)
    }
}

impl From<Missing> for EngineError {
    fn from(value: Missing) -> Self {
        Self::NotFound(value)
    }
}
