use crate::error::StoreError;
use crate::model::{Shift, Worker};
use crate::store::FleetStore;
use chrono::{DateTime, Utc};
use shared::PostgresConfig;
use shared::fleet::{GeoPoint, VehicleType, WorkerId};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Copy, Clone, Debug, PartialEq, sqlx::Type)]
#[sqlx(type_name = "vehicle_type", rename_all = "lowercase")]
enum DbVehicleType {
    Car,
    Motorcycle,
    Scooter,
}

impl From<VehicleType> for DbVehicleType {
    fn from(value: VehicleType) -> Self {
        match value {
            VehicleType::Car => Self::Car,
            VehicleType::Motorcycle => Self::Motorcycle,
            VehicleType::Scooter => Self::Scooter,
        }
    }
}

impl From<DbVehicleType> for VehicleType {
    fn from(value: DbVehicleType) -> Self {
        match value {
            DbVehicleType::Car => Self::Car,
            DbVehicleType::Motorcycle => Self::Motorcycle,
            DbVehicleType::Scooter => Self::Scooter,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WorkerRow {
    id: i32,
    full_name: String,
    worker_number: i32,
    vehicle_type: DbVehicleType,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<WorkerRow> for Worker {
    fn from(row: WorkerRow) -> Self {
        Self {
            id: row.id,
            full_name: row.full_name,
            worker_number: row.worker_number,
            vehicle: row.vehicle_type.into(),
            active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ShiftRow {
    id: Uuid,
    worker_id: i32,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    start_lat: Option<f64>,
    start_lng: Option<f64>,
    end_lat: Option<f64>,
    end_lng: Option<f64>,
}

fn stored_point(lat: Option<f64>, lng: Option<f64>) -> Option<GeoPoint> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
        _ => None,
    }
}

impl From<ShiftRow> for Shift {
    fn from(row: ShiftRow) -> Self {
        Self {
            id: row.id,
            worker_id: row.worker_id,
            start: row.start_time,
            end: row.end_time,
            start_position: stored_point(row.start_lat, row.start_lng),
            end_position: stored_point(row.end_lat, row.end_lng),
        }
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    #[instrument(skip_all)]
    pub async fn connect(pg_config: &PostgresConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&pg_config.connection_string)
            .await?;

        info!("db pool created and connected");

        // Run any new migrations
        sqlx::migrate!("../migrations").run(&pool).await?;

        Ok(Self::new(pool))
    }

    async fn expect_one_row(
        &self,
        query: sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments>,
        what: impl FnOnce() -> String,
    ) -> Result<(), StoreError> {
        let result = query.execute(&self.pool).await?;
        if result.rows_affected() == 1 {
            Ok(())
        } else {
            Err(StoreError::Rejected(what()))
        }
    }
}

impl FleetStore for PgStore {
    async fn load_workers(&self) -> Result<Vec<Worker>, StoreError> {
        let rows = sqlx::query_as::<_, WorkerRow>(
            r"
            SELECT id, full_name, worker_number, vehicle_type, is_active, created_at
            FROM workers
            ORDER BY id
            ",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Worker::from).collect())
    }

    async fn insert_worker(&self, worker: &Worker) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO workers (id, full_name, worker_number, vehicle_type, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(worker.id)
        .bind(&worker.full_name)
        .bind(worker.worker_number)
        .bind(DbVehicleType::from(worker.vehicle))
        .bind(worker.active)
        .bind(worker.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_worker_active(&self, worker_id: WorkerId, active: bool) -> Result<(), StoreError> {
        self.expect_one_row(
            sqlx::query("UPDATE workers SET is_active = $2 WHERE id = $1")
                .bind(worker_id)
                .bind(active),
            || format!("worker {worker_id} does not exist"),
        )
        .await
    }

    async fn set_worker_vehicle(
        &self,
        worker_id: WorkerId,
        vehicle: VehicleType,
    ) -> Result<(), StoreError> {
        self.expect_one_row(
            sqlx::query("UPDATE workers SET vehicle_type = $2 WHERE id = $1")
                .bind(worker_id)
                .bind(DbVehicleType::from(vehicle)),
            || format!("worker {worker_id} does not exist"),
        )
        .await
    }

    async fn delete_worker(&self, worker_id: WorkerId) -> Result<(), StoreError> {
        // shifts.worker_id references workers(id), so history blocks the delete
        sqlx::query("DELETE FROM workers WHERE id = $1")
            .bind(worker_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn load_shifts(&self) -> Result<Vec<Shift>, StoreError> {
        let rows = sqlx::query_as::<_, ShiftRow>(
            r"
            SELECT id, worker_id, start_time, end_time, start_lat, start_lng, end_lat, end_lng
            FROM shifts
            ",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Shift::from).collect())
    }

    async fn insert_shift(&self, shift: &Shift) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO shifts (id, worker_id, start_time, end_time, start_lat, start_lng)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(shift.id)
        .bind(shift.worker_id)
        .bind(shift.start)
        .bind(shift.end)
        .bind(shift.start_position.map(|p| p.lat))
        .bind(shift.start_position.map(|p| p.lng))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn close_shift(
        &self,
        shift_id: Uuid,
        end: DateTime<Utc>,
        end_position: Option<GeoPoint>,
    ) -> Result<(), StoreError> {
        self.expect_one_row(
            sqlx::query(
                r"
                UPDATE shifts
                SET end_time = $2, end_lat = $3, end_lng = $4
                WHERE id = $1 AND end_time IS NULL
                ",
            )
            .bind(shift_id)
            .bind(end)
            .bind(end_position.map(|p| p.lat))
            .bind(end_position.map(|p| p.lng)),
            || format!("shift {shift_id} is not open"),
        )
        .await
    }

    async fn append_location(
        &self,
        shift_id: Uuid,
        worker_id: WorkerId,
        point: GeoPoint,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO locations (shift_id, worker_id, latitude, longitude, recorded_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(shift_id)
        .bind(worker_id)
        .bind(point.lat)
        .bind(point.lng)
        .bind(recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
