use crate::calendar::hours;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use shared::fleet::{GeoPoint, VehicleType, WorkerId};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Worker {
    pub id: WorkerId,
    pub full_name: String,
    pub worker_number: i32,
    pub vehicle: VehicleType,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWorker {
    pub id: WorkerId,
    pub full_name: String,
    pub worker_number: i32,
    pub vehicle: Option<VehicleType>,
}

/// Display data attached to derived records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerDisplay {
    pub full_name: String,
    pub worker_number: Option<i32>,
    pub vehicle: VehicleType,
}

impl WorkerDisplay {
    pub fn unregistered(worker_id: WorkerId) -> Self {
        Self {
            full_name: format!("unregistered worker {worker_id}"),
            worker_number: None,
            vehicle: VehicleType::default(),
        }
    }
}

impl From<&Worker> for WorkerDisplay {
    fn from(worker: &Worker) -> Self {
        Self {
            full_name: worker.full_name.clone(),
            worker_number: Some(worker.worker_number),
            vehicle: worker.vehicle,
        }
    }
}

/// Read-side lookup of worker display data.
pub trait WorkerDirectory {
    fn display(&self, worker_id: WorkerId) -> Option<WorkerDisplay>;

    fn display_or_unregistered(&self, worker_id: WorkerId) -> WorkerDisplay {
        self.display(worker_id)
            .unwrap_or_else(|| WorkerDisplay::unregistered(worker_id))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shift {
    pub id: Uuid,
    pub worker_id: WorkerId,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub start_position: Option<GeoPoint>,
    pub end_position: Option<GeoPoint>,
}

impl Shift {
    pub fn open(worker_id: WorkerId, start: DateTime<Utc>, start_position: Option<GeoPoint>) -> Self {
        Self {
            id: Uuid::now_v7(),
            worker_id,
            start,
            end: None,
            start_position,
            end_position: None,
        }
    }

    pub fn status(&self) -> ShiftStatus {
        if self.end.is_some() {
            ShiftStatus::Closed
        } else {
            ShiftStatus::Open
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Final duration for closed shifts, elapsed time so far for open ones.
    pub fn duration(&self, now: DateTime<Utc>) -> TimeDelta {
        self.end.unwrap_or(now) - self.start
    }

    pub fn duration_hours(&self, now: DateTime<Utc>) -> f64 {
        hours(self.duration(now))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LivePosition {
    pub worker_id: WorkerId,
    pub point: GeoPoint,
    pub seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveWorker {
    pub worker_id: WorkerId,
    pub full_name: String,
    pub worker_number: Option<i32>,
    pub vehicle: VehicleType,
    pub point: GeoPoint,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub shift_id: Uuid,
    pub worker_id: WorkerId,
    pub full_name: String,
    pub worker_number: Option<i32>,
    pub start: DateTime<Utc>,
    pub hours_open: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HoursSummaryRow {
    pub worker_id: WorkerId,
    pub full_name: String,
    pub worker_number: Option<i32>,
    pub shift_count: u32,
    pub total_hours: f64,
    pub average_hours: f64,
}
