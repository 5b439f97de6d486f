use crate::error::StoreError;
use crate::model::{Shift, Worker};
use crate::store::FleetStore;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use shared::fleet::{GeoPoint, VehicleType, WorkerId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct LocationLogEntry {
    pub shift_id: Uuid,
    pub worker_id: WorkerId,
    pub point: GeoPoint,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    workers: BTreeMap<WorkerId, Worker>,
    shifts: HashMap<Uuid, Shift>,
    locations: Vec<LocationLogEntry>,
}

/// Process-local store used when no database is configured, and by tests.
///
/// Clones share the same tables, so a test can keep a handle to inspect what the
/// engine wrote or to inject failures.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    failures: Arc<AtomicUsize>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every write, widening the window between validation and commit.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// The next `count` writes fail with [`StoreError::Unavailable`].
    pub fn fail_next_writes(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn shifts(&self) -> Vec<Shift> {
        self.tables.lock().shifts.values().cloned().collect()
    }

    pub fn locations(&self) -> Vec<LocationLogEntry> {
        self.tables.lock().locations.clone()
    }

    #[cfg(test)]
    pub(crate) fn with_worker_ids(self, ids: impl IntoIterator<Item = WorkerId>) -> Self {
        {
            let mut tables = self.tables.lock();
            for id in ids {
                tables.workers.insert(
                    id,
                    Worker {
                        id,
                        full_name: format!("Worker {id}"),
                        worker_number: id,
                        vehicle: VehicleType::default(),
                        active: true,
                        created_at: DateTime::UNIX_EPOCH,
                    },
                );
            }
        }
        self
    }

    async fn write<T>(
        &self,
        apply: impl FnOnce(&mut Tables) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        apply(&mut self.tables.lock())
    }
}

impl FleetStore for MemoryStore {
    async fn load_workers(&self) -> Result<Vec<Worker>, StoreError> {
        Ok(self.tables.lock().workers.values().cloned().collect())
    }

    async fn insert_worker(&self, worker: &Worker) -> Result<(), StoreError> {
        let worker = worker.clone();
        self.write(move |tables| {
            if tables.workers.contains_key(&worker.id) {
                return Err(StoreError::Rejected(format!(
                    "worker {} already exists",
                    worker.id
                )));
            }
            if tables
                .workers
                .values()
                .any(|w| w.worker_number == worker.worker_number)
            {
                return Err(StoreError::Rejected(format!(
                    "worker number {} is taken",
                    worker.worker_number
                )));
            }
            tables.workers.insert(worker.id, worker);
            Ok(())
        })
        .await
    }

    async fn set_worker_active(&self, worker_id: WorkerId, active: bool) -> Result<(), StoreError> {
        self.write(move |tables| {
            let worker = tables
                .workers
                .get_mut(&worker_id)
                .ok_or_else(|| StoreError::Rejected(format!("worker {worker_id} does not exist")))?;
            worker.active = active;
            Ok(())
        })
        .await
    }

    async fn set_worker_vehicle(
        &self,
        worker_id: WorkerId,
        vehicle: VehicleType,
    ) -> Result<(), StoreError> {
        self.write(move |tables| {
            let worker = tables
                .workers
                .get_mut(&worker_id)
                .ok_or_else(|| StoreError::Rejected(format!("worker {worker_id} does not exist")))?;
            worker.vehicle = vehicle;
            Ok(())
        })
        .await
    }

    async fn delete_worker(&self, worker_id: WorkerId) -> Result<(), StoreError> {
        self.write(move |tables| {
            if tables.shifts.values().any(|s| s.worker_id == worker_id) {
                return Err(StoreError::Rejected(format!(
                    "worker {worker_id} is referenced by shifts"
                )));
            }
            tables.workers.remove(&worker_id);
            Ok(())
        })
        .await
    }

    async fn load_shifts(&self) -> Result<Vec<Shift>, StoreError> {
        Ok(self.tables.lock().shifts.values().cloned().collect())
    }

    async fn insert_shift(&self, shift: &Shift) -> Result<(), StoreError> {
        let shift = shift.clone();
        self.write(move |tables| {
            if !tables.workers.contains_key(&shift.worker_id) {
                return Err(StoreError::Rejected(format!(
                    "worker {} does not exist",
                    shift.worker_id
                )));
            }
            tables.shifts.insert(shift.id, shift);
            Ok(())
        })
        .await
    }

    async fn close_shift(
        &self,
        shift_id: Uuid,
        end: DateTime<Utc>,
        end_position: Option<GeoPoint>,
    ) -> Result<(), StoreError> {
        self.write(move |tables| match tables.shifts.get_mut(&shift_id) {
            Some(shift) if shift.end.is_none() => {
                shift.end = Some(end);
                shift.end_position = end_position;
                Ok(())
            }
            _ => Err(StoreError::Rejected(format!(
                "shift {shift_id} is not open"
            ))),
        })
        .await
    }

    async fn append_location(
        &self,
        shift_id: Uuid,
        worker_id: WorkerId,
        point: GeoPoint,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.write(move |tables| {
            tables.locations.push(LocationLogEntry {
                shift_id,
                worker_id,
                point,
                recorded_at,
            });
            Ok(())
        })
        .await
    }
}
