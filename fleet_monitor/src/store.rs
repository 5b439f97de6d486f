use chrono::{DateTime, Utc};
use fleet_engine::StoreError;
use fleet_engine::model::{Shift, Worker};
use fleet_engine::store::{FleetStore, MemoryStore, PgStore};
use shared::PostgresConfig;
use shared::fleet::{GeoPoint, VehicleType, WorkerId};
use tracing::{info, warn};
use uuid::Uuid;

/// The store picked at startup: Postgres when configured, otherwise process memory.
#[derive(Clone)]
pub enum ConfiguredStore {
    Postgres(PgStore),
    Memory(MemoryStore),
}

impl ConfiguredStore {
    pub async fn connect(pg_config: Option<&PostgresConfig>) -> Result<Self, StoreError> {
        match pg_config {
            Some(pg_config) => {
                let store = PgStore::connect(pg_config).await?;
                info!("using Postgres store");
                Ok(Self::Postgres(store))
            }
            None => {
                warn!("no postgres section configured, state will not survive a restart");
                Ok(Self::Memory(MemoryStore::new()))
            }
        }
    }
}

impl FleetStore for ConfiguredStore {
    async fn load_workers(&self) -> Result<Vec<Worker>, StoreError> {
        match self {
            Self::Postgres(store) => store.load_workers().await,
            Self::Memory(store) => store.load_workers().await,
        }
    }

    async fn insert_worker(&self, worker: &Worker) -> Result<(), StoreError> {
        match self {
            Self::Postgres(store) => store.insert_worker(worker).await,
            Self::Memory(store) => store.insert_worker(worker).await,
        }
    }

    async fn set_worker_active(&self, worker_id: WorkerId, active: bool) -> Result<(), StoreError> {
        match self {
            Self::Postgres(store) => store.set_worker_active(worker_id, active).await,
            Self::Memory(store) => store.set_worker_active(worker_id, active).await,
        }
    }

    async fn set_worker_vehicle(
        &self,
        worker_id: WorkerId,
        vehicle: VehicleType,
    ) -> Result<(), StoreError> {
        match self {
            Self::Postgres(store) => store.set_worker_vehicle(worker_id, vehicle).await,
            Self::Memory(store) => store.set_worker_vehicle(worker_id, vehicle).await,
        }
    }

    async fn delete_worker(&self, worker_id: WorkerId) -> Result<(), StoreError> {
        match self {
            Self::Postgres(store) => store.delete_worker(worker_id).await,
            Self::Memory(store) => store.delete_worker(worker_id).await,
        }
    }

    async fn load_shifts(&self) -> Result<Vec<Shift>, StoreError> {
        match self {
            Self::Postgres(store) => store.load_shifts().await,
            Self::Memory(store) => store.load_shifts().await,
        }
    }

    async fn insert_shift(&self, shift: &Shift) -> Result<(), StoreError> {
        match self {
            Self::Postgres(store) => store.insert_shift(shift).await,
            Self::Memory(store) => store.insert_shift(shift).await,
        }
    }

    async fn close_shift(
        &self,
        shift_id: Uuid,
        end: DateTime<Utc>,
        end_position: Option<GeoPoint>,
    ) -> Result<(), StoreError> {
        match self {
            Self::Postgres(store) => store.close_shift(shift_id, end, end_position).await,
            Self::Memory(store) => store.close_shift(shift_id, end, end_position).await,
        }
    }

    async fn append_location(
        &self,
        shift_id: Uuid,
        worker_id: WorkerId,
        point: GeoPoint,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        match self {
            Self::Postgres(store) => {
                store
                    .append_location(shift_id, worker_id, point, recorded_at)
                    .await
            }
            Self::Memory(store) => {
                store
                    .append_location(shift_id, worker_id, point, recorded_at)
                    .await
            }
        }
    }
}
