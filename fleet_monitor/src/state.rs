use crate::store::ConfiguredStore;
use axum::extract::FromRef;
use chrono::{DateTime, TimeDelta, Utc};
use fleet_engine::Fleet;
use parking_lot::RwLock;
use std::sync::Arc;

pub type SharedFleet = Arc<Fleet<ConfiguredStore>>;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub fleet: SharedFleet,
    pub health: Health,
}

/// Results of the latest refresh ticks, read by the health endpoint.
#[derive(Clone)]
pub struct Health {
    pub last_position_refresh: Arc<RwLock<Option<DateTime<Utc>>>>,
    pub live_workers: Arc<RwLock<usize>>,
    pub last_alert_scan: Arc<RwLock<Option<DateTime<Utc>>>>,
    pub open_alerts: Arc<RwLock<usize>>,
    /// Longest acceptable gap since the last alert scan.
    pub max_scan_gap: TimeDelta,
}

impl Health {
    pub fn new(max_scan_gap: TimeDelta) -> Self {
        Self {
            last_position_refresh: Arc::new(RwLock::new(None)),
            live_workers: Arc::new(RwLock::new(0)),
            last_alert_scan: Arc::new(RwLock::new(None)),
            open_alerts: Arc::new(RwLock::new(0)),
            max_scan_gap,
        }
    }

    pub fn record_position_refresh(&self, at: DateTime<Utc>, live_workers: usize) {
        *self.last_position_refresh.write() = Some(at);
        *self.live_workers.write() = live_workers;
    }

    pub fn record_alert_scan(&self, at: DateTime<Utc>, open_alerts: usize) {
        *self.last_alert_scan.write() = Some(at);
        *self.open_alerts.write() = open_alerts;
    }
}
