use crate::alerts::{AlertThreshold, find_stale_open_shifts};
use crate::calendar::{Calendar, ShiftFilter};
use crate::error::{EngineError, Missing};
use crate::hours::summarize;
use crate::ledger::{ShiftLedger, ShiftList};
use crate::model::{Alert, HoursSummaryRow, LiveWorker, NewWorker, Shift, Worker};
use crate::positions::LivePositionCache;
use crate::registry::WorkerRegistry;
use crate::store::FleetStore;
use chrono::{DateTime, TimeDelta, Utc};
use shared::Config;
use shared::error::ConfigError;
use shared::fleet::{GeoPoint, VehicleType, WorkerId};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct FleetSettings {
    pub threshold: AlertThreshold,
    pub require_open_shift: bool,
    pub default_vehicle: VehicleType,
    pub calendar: Calendar,
    /// Default age filter for live snapshots; `None` keeps every cached worker.
    pub max_age: Option<TimeDelta>,
}

impl Default for FleetSettings {
    fn default() -> Self {
        Self {
            threshold: AlertThreshold::default(),
            require_open_shift: true,
            default_vehicle: VehicleType::default(),
            calendar: Calendar::utc(),
            max_age: None,
        }
    }
}

impl FleetSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let threshold = AlertThreshold::from_hours(config.alerts.threshold_hours).ok_or_else(|| {
            ConfigError::Invalid {
                key: "alerts.threshold_hours",
                reason: format!("{} is not a usable number of hours", config.alerts.threshold_hours),
            }
        })?;
        let calendar = Calendar::with_offset_minutes(config.reporting.utc_offset_minutes)
            .ok_or_else(|| ConfigError::Invalid {
                key: "reporting.utc_offset_minutes",
                reason: format!(
                    "{} minutes is not within one day",
                    config.reporting.utc_offset_minutes
                ),
            })?;
        let max_age = config
            .positions
            .max_age_seconds
            .map(|secs| {
                i64::try_from(secs)
                    .ok()
                    .and_then(TimeDelta::try_seconds)
                    .ok_or_else(|| ConfigError::Invalid {
                        key: "positions.max_age_seconds",
                        reason: format!("{secs} seconds is out of range"),
                    })
            })
            .transpose()?;

        Ok(Self {
            threshold,
            require_open_shift: config.positions.require_open_shift,
            default_vehicle: config.workers.default_vehicle,
            calendar,
            max_age,
        })
    }
}

/// Ingestion boundary and read facade over the registry, ledger and position cache.
pub struct Fleet<S> {
    store: Arc<S>,
    registry: WorkerRegistry<S>,
    ledger: ShiftLedger<S>,
    positions: LivePositionCache,
    settings: FleetSettings,
}

impl<S: FleetStore> Fleet<S> {
    /// An empty fleet. Use [`Fleet::hydrate`] to start from stored state.
    pub fn new(store: Arc<S>, settings: FleetSettings) -> Self {
        Self {
            registry: WorkerRegistry::new(Arc::clone(&store), settings.default_vehicle),
            ledger: ShiftLedger::new(Arc::clone(&store), settings.calendar),
            positions: LivePositionCache::new(),
            store,
            settings,
        }
    }

    #[instrument(skip_all)]
    pub async fn hydrate(store: Arc<S>, settings: FleetSettings) -> Result<Self, EngineError> {
        let workers = store.load_workers().await?;
        let shifts = store.load_shifts().await?;
        let fleet = Self::new(store, settings);
        fleet.registry.hydrate(workers);
        fleet.ledger.hydrate(shifts);
        info!(
            workers = fleet.registry.list().len(),
            open_shifts = fleet.ledger.open_shifts().len(),
            "fleet state loaded from store"
        );
        Ok(fleet)
    }

    pub fn settings(&self) -> &FleetSettings {
        &self.settings
    }

    pub fn registry(&self) -> &WorkerRegistry<S> {
        &self.registry
    }

    pub fn ledger(&self) -> &ShiftLedger<S> {
        &self.ledger
    }

    pub fn positions(&self) -> &LivePositionCache {
        &self.positions
    }

    // Workers

    pub fn workers(&self) -> Vec<Worker> {
        self.registry.list()
    }

    pub fn worker(&self, worker_id: WorkerId) -> Result<Worker, EngineError> {
        self.registry
            .get(worker_id)
            .ok_or_else(|| Missing::Worker(worker_id).into())
    }

    pub async fn register_worker(
        &self,
        new: NewWorker,
        now: DateTime<Utc>,
    ) -> Result<Worker, EngineError> {
        self.registry.register(new, now).await
    }

    /// Also drops the worker from the live position map.
    pub async fn deactivate_worker(&self, worker_id: WorkerId) -> Result<Worker, EngineError> {
        let worker = self.registry.deactivate(worker_id).await?;
        self.positions.evict(worker_id);
        Ok(worker)
    }

    pub async fn set_vehicle(
        &self,
        worker_id: WorkerId,
        vehicle: VehicleType,
    ) -> Result<Worker, EngineError> {
        self.registry.set_vehicle(worker_id, vehicle).await
    }

    /// Only workers without any shift history can be removed; others must be deactivated.
    /// Shift opens for the worker are refused until the removal finishes.
    pub async fn remove_worker(&self, worker_id: WorkerId) -> Result<Worker, EngineError> {
        let _hold = self.ledger.hold_without_history(worker_id)?;
        let worker = self.registry.remove(worker_id).await?;
        self.positions.evict(worker_id);
        Ok(worker)
    }

    // Shifts

    pub async fn open_shift(
        &self,
        worker_id: WorkerId,
        at: DateTime<Utc>,
    ) -> Result<Shift, EngineError> {
        let position = self.last_point(worker_id);
        self.ledger
            .open_shift_admitted(worker_id, at, position, || {
                self.registry.require_active(worker_id).map(drop)
            })
            .await
    }

    pub async fn close_shift(
        &self,
        worker_id: WorkerId,
        at: DateTime<Utc>,
    ) -> Result<Shift, EngineError> {
        self.ledger
            .close_shift(worker_id, at, self.last_point(worker_id))
            .await
    }

    pub async fn force_close(&self, shift_id: Uuid, at: DateTime<Utc>) -> Result<Shift, EngineError> {
        let position = self
            .ledger
            .get(shift_id)
            .and_then(|shift| self.last_point(shift.worker_id));
        self.ledger.force_close(shift_id, at, position).await
    }

    pub fn list_shifts(&self, filter: ShiftFilter) -> Result<ShiftList, EngineError> {
        self.ledger.list_shifts(filter)
    }

    fn last_point(&self, worker_id: WorkerId) -> Option<GeoPoint> {
        self.positions.get(worker_id).map(|p| p.point)
    }

    // Positions

    /// Returns `Ok(false)` when the report is not newer than the cached one.
    ///
    /// Staleness is checked before the location log write and again when the cache is
    /// updated. Out-of-order reports racing each other can both reach the log; only the
    /// newest one lands in the cache.
    pub async fn report_position(
        &self,
        worker_id: WorkerId,
        point: GeoPoint,
        at: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        self.registry.require_active(worker_id)?;
        let open_shift = self.ledger.open_shift_of(worker_id);
        if self.settings.require_open_shift && open_shift.is_none() {
            return Err(EngineError::TrackingDisabled(worker_id));
        }
        if !self.positions.is_newer(worker_id, at) {
            debug!(worker_id, reported_at = %at, "ignoring out-of-order position report");
            return Ok(false);
        }

        if let Some(shift) = open_shift {
            self.store
                .append_location(shift.id, worker_id, point, at)
                .await?;
        }
        // Deactivation may have landed while the log write was pending.
        self.registry
            .with_active(worker_id, |_| self.positions.report(worker_id, point, at))
    }

    pub fn live_positions(&self, max_age: Option<TimeDelta>, now: DateTime<Utc>) -> Vec<LiveWorker> {
        self.positions.snapshot(&self.registry, max_age, now)
    }

    // Derived views

    pub fn stale_open_shifts(
        &self,
        threshold: Option<AlertThreshold>,
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        find_stale_open_shifts(
            &self.ledger,
            &self.registry,
            threshold.unwrap_or(self.settings.threshold),
            now,
        )
    }

    pub fn hours_summary(&self, filter: &ShiftFilter) -> Result<Vec<HoursSummaryRow>, EngineError> {
        summarize(&self.ledger, &self.registry, filter)
    }
}
