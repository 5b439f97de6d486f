//! Durable storage boundary. The in-memory components are hydrated from a store on
//! startup and write through to it; a failed write never reaches the in-memory state.

mod memory;
mod postgres;

pub use memory::{LocationLogEntry, MemoryStore};
pub use postgres::PgStore;

use crate::error::StoreError;
use crate::model::{Shift, Worker};
use chrono::{DateTime, Utc};
use shared::fleet::{GeoPoint, VehicleType, WorkerId};
use std::future::Future;
use uuid::Uuid;

pub trait FleetStore: Send + Sync + 'static {
    fn load_workers(&self) -> impl Future<Output = Result<Vec<Worker>, StoreError>> + Send;

    fn insert_worker(&self, worker: &Worker)
    -> impl Future<Output = Result<(), StoreError>> + Send;

    fn set_worker_active(
        &self,
        worker_id: WorkerId,
        active: bool,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn set_worker_vehicle(
        &self,
        worker_id: WorkerId,
        vehicle: VehicleType,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Must refuse to delete a worker that any shift references.
    fn delete_worker(&self, worker_id: WorkerId)
    -> impl Future<Output = Result<(), StoreError>> + Send;

    fn load_shifts(&self) -> impl Future<Output = Result<Vec<Shift>, StoreError>> + Send;

    fn insert_shift(&self, shift: &Shift) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn close_shift(
        &self,
        shift_id: Uuid,
        end: DateTime<Utc>,
        end_position: Option<GeoPoint>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn append_location(
        &self,
        shift_id: Uuid,
        worker_id: WorkerId,
        point: GeoPoint,
        recorded_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
