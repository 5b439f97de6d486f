use crate::error::{Conflict, EngineError, Missing, StoreError};
use crate::model::{NewWorker, Worker, WorkerDirectory, WorkerDisplay};
use crate::store::FleetStore;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use shared::fleet::{VehicleType, WorkerId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Default)]
struct RegistryState {
    workers: BTreeMap<WorkerId, Worker>,
    /// Registrations being written to the store: worker id to worker number.
    pending: HashMap<WorkerId, i32>,
}

impl RegistryState {
    fn check_unique(&self, worker_id: WorkerId, worker_number: i32) -> Result<(), Conflict> {
        if self.workers.contains_key(&worker_id) || self.pending.contains_key(&worker_id) {
            return Err(Conflict::DuplicateWorkerId(worker_id));
        }
        let taken = self.workers.values().any(|w| w.worker_number == worker_number)
            || self.pending.values().any(|&n| n == worker_number);
        if taken {
            return Err(Conflict::DuplicateWorkerNumber(worker_number));
        }
        Ok(())
    }
}

/// Holds a worker id and number while the registration is persisted.
struct PendingRegistration<'a> {
    state: &'a RwLock<RegistryState>,
    worker_id: WorkerId,
    committed: bool,
}

impl PendingRegistration<'_> {
    fn commit(mut self, worker: Worker) {
        let mut state = self.state.write();
        state.pending.remove(&self.worker_id);
        state.workers.insert(worker.id, worker);
        self.committed = true;
    }
}

impl Drop for PendingRegistration<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.state.write().pending.remove(&self.worker_id);
        }
    }
}

/// Worker records keyed by id. Workers are never hard-deleted while shifts reference
/// them; callers check history before calling [`WorkerRegistry::remove`].
pub struct WorkerRegistry<S> {
    store: Arc<S>,
    state: RwLock<RegistryState>,
    default_vehicle: VehicleType,
}

impl<S: FleetStore> WorkerRegistry<S> {
    pub fn new(store: Arc<S>, default_vehicle: VehicleType) -> Self {
        Self {
            store,
            state: RwLock::new(RegistryState::default()),
            default_vehicle,
        }
    }

    pub fn hydrate(&self, workers: Vec<Worker>) {
        let mut state = self.state.write();
        state.pending.clear();
        state.workers.clear();
        state.workers.extend(workers.into_iter().map(|w| (w.id, w)));
        debug!(workers = state.workers.len(), "hydrated worker registry");
    }

    pub fn get(&self, worker_id: WorkerId) -> Option<Worker> {
        self.state.read().workers.get(&worker_id).cloned()
    }

    pub fn list(&self) -> Vec<Worker> {
        self.state.read().workers.values().cloned().collect()
    }

    /// Fails unless the worker exists and is active.
    pub fn require_active(&self, worker_id: WorkerId) -> Result<Worker, EngineError> {
        self.with_active(worker_id, Worker::clone)
    }

    /// Runs `f` on an active worker. Deactivation and removal wait until `f` returns.
    pub fn with_active<T>(
        &self,
        worker_id: WorkerId,
        f: impl FnOnce(&Worker) -> T,
    ) -> Result<T, EngineError> {
        let state = self.state.read();
        match state.workers.get(&worker_id) {
            None => Err(Missing::Worker(worker_id).into()),
            Some(worker) if !worker.active => Err(EngineError::InactiveWorker(worker_id)),
            Some(worker) => Ok(f(worker)),
        }
    }

    pub async fn register(
        &self,
        new: NewWorker,
        created_at: DateTime<Utc>,
    ) -> Result<Worker, EngineError> {
        let pending = {
            let mut state = self.state.write();
            state.check_unique(new.id, new.worker_number)?;
            state.pending.insert(new.id, new.worker_number);
            PendingRegistration {
                state: &self.state,
                worker_id: new.id,
                committed: false,
            }
        };

        let worker = Worker {
            id: new.id,
            full_name: new.full_name,
            worker_number: new.worker_number,
            vehicle: new.vehicle.unwrap_or(self.default_vehicle),
            active: true,
            created_at,
        };
        self.store.insert_worker(&worker).await?;

        pending.commit(worker.clone());
        info!(
            worker_id = worker.id,
            worker_number = worker.worker_number,
            vehicle = %worker.vehicle,
            "registered worker"
        );
        Ok(worker)
    }

    pub async fn deactivate(&self, worker_id: WorkerId) -> Result<Worker, EngineError> {
        self.update(worker_id, |w| w.active = false, |store| {
            store.set_worker_active(worker_id, false)
        })
        .await
    }

    pub async fn set_vehicle(
        &self,
        worker_id: WorkerId,
        vehicle: VehicleType,
    ) -> Result<Worker, EngineError> {
        self.update(worker_id, |w| w.vehicle = vehicle, |store| {
            store.set_worker_vehicle(worker_id, vehicle)
        })
        .await
    }

    pub async fn remove(&self, worker_id: WorkerId) -> Result<Worker, EngineError> {
        if self.get(worker_id).is_none() {
            return Err(Missing::Worker(worker_id).into());
        }
        self.store.delete_worker(worker_id).await?;
        let removed = self
            .state
            .write()
            .workers
            .remove(&worker_id)
            .ok_or(Missing::Worker(worker_id))?;
        info!(worker_id, "removed worker");
        Ok(removed)
    }

    async fn update<'a, F>(
        &'a self,
        worker_id: WorkerId,
        apply: impl FnOnce(&mut Worker),
        persist: impl FnOnce(&'a S) -> F,
    ) -> Result<Worker, EngineError>
    where
        F: Future<Output = Result<(), StoreError>>,
    {
        if self.get(worker_id).is_none() {
            return Err(Missing::Worker(worker_id).into());
        }
        persist(self.store.as_ref()).await?;

        let mut state = self.state.write();
        let worker = state
            .workers
            .get_mut(&worker_id)
            .ok_or(Missing::Worker(worker_id))?;
        apply(worker);
        debug!(worker_id, active = worker.active, vehicle = %worker.vehicle, "updated worker");
        Ok(worker.clone())
    }
}

impl<S: FleetStore> WorkerDirectory for WorkerRegistry<S> {
    fn display(&self, worker_id: WorkerId) -> Option<WorkerDisplay> {
        self.state.read().workers.get(&worker_id).map(WorkerDisplay::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn registry() -> (MemoryStore, WorkerRegistry<MemoryStore>) {
        let store = MemoryStore::new();
        let registry = WorkerRegistry::new(Arc::new(store.clone()), VehicleType::Car);
        (store, registry)
    }

    fn new_worker(id: WorkerId, number: i32) -> NewWorker {
        NewWorker {
            id,
            full_name: format!("Worker {id}"),
            worker_number: number,
            vehicle: None,
        }
    }

    #[tokio::test]
    async fn register_applies_default_vehicle_and_rejects_duplicates() -> Result<(), EngineError> {
        let (_, registry) = registry();
        let worker = registry.register(new_worker(1, 10), Utc::now()).await?;
        assert_eq!(worker.vehicle, VehicleType::Car);
        assert!(worker.active);

        let duplicate_id = registry.register(new_worker(1, 11), Utc::now()).await;
        assert!(matches!(
            duplicate_id,
            Err(EngineError::Conflict(Conflict::DuplicateWorkerId(1)))
        ));
        let duplicate_number = registry.register(new_worker(2, 10), Utc::now()).await;
        assert!(matches!(
            duplicate_number,
            Err(EngineError::Conflict(Conflict::DuplicateWorkerNumber(10)))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn failed_store_write_leaves_worker_unchanged() -> Result<(), EngineError> {
        let (store, registry) = registry();
        registry.register(new_worker(3, 30), Utc::now()).await?;

        store.fail_next_writes(1);
        let result = registry.set_vehicle(3, VehicleType::Scooter).await;
        assert!(matches!(result, Err(EngineError::Store(_))));
        assert_eq!(registry.get(3).map(|w| w.vehicle), Some(VehicleType::Car));

        let updated = registry.set_vehicle(3, VehicleType::Scooter).await?;
        assert_eq!(updated.vehicle, VehicleType::Scooter);
        Ok(())
    }

    #[tokio::test]
    async fn deactivated_workers_are_not_active() -> Result<(), EngineError> {
        let (_, registry) = registry();
        registry.register(new_worker(4, 40), Utc::now()).await?;
        registry.deactivate(4).await?;
        assert!(matches!(
            registry.require_active(4),
            Err(EngineError::InactiveWorker(4))
        ));
        assert!(matches!(
            registry.require_active(5),
            Err(EngineError::NotFound(Missing::Worker(5)))
        ));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_registrations_cannot_share_a_number() {
        let store = MemoryStore::new().with_latency(Duration::from_millis(20));
        let registry = WorkerRegistry::new(Arc::new(store.clone()), VehicleType::Car);

        let (first, second) = tokio::join!(
            registry.register(new_worker(1, 7), Utc::now()),
            registry.register(new_worker(2, 7), Utc::now()),
        );
        assert!(first.is_ok());
        assert!(matches!(
            second,
            Err(EngineError::Conflict(Conflict::DuplicateWorkerNumber(7)))
        ));
        let numbers: Vec<_> = registry.list().iter().map(|w| w.worker_number).collect();
        assert_eq!(numbers, vec![7]);
    }

    #[tokio::test]
    async fn failed_registration_frees_the_number() -> Result<(), EngineError> {
        let (store, registry) = registry();
        store.fail_next_writes(1);
        assert!(registry.register(new_worker(6, 60), Utc::now()).await.is_err());
        assert!(registry.get(6).is_none());

        registry.register(new_worker(6, 60), Utc::now()).await?;
        assert_eq!(registry.get(6).map(|w| w.worker_number), Some(60));
        Ok(())
    }
}
