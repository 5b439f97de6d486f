use crate::state::{Health, SharedFleet};
use chrono::{DateTime, Utc};
use fleet_engine::model::Alert;
use fleet_engine::scheduler::{RefreshScheduler, SubscriptionHandle};
use shared::Config;
use shared::fleet::WorkerId;
use std::collections::{BTreeSet, HashSet};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, trace, warn};
use uuid::Uuid;

/// Starts the position refresh and alert scan subscriptions.
pub fn subscribe_refresh_jobs(
    scheduler: &RefreshScheduler,
    fleet: &SharedFleet,
    health: &Health,
    config: &Config,
) -> Vec<SubscriptionHandle> {
    let positions = {
        let mut refresh = PositionRefresh::new(Arc::clone(fleet));
        let health = health.clone();
        scheduler.subscribe(
            "positions",
            Duration::from_secs(config.positions.refresh_interval_seconds),
            move |_| {
                let now = Utc::now();
                refresh.run(now);
                health.record_position_refresh(now, refresh.live());
                Ok::<(), Infallible>(())
            },
        )
    };

    let alerts = {
        let mut scan = AlertScan::new(Arc::clone(fleet));
        let health = health.clone();
        scheduler.subscribe(
            "alerts",
            Duration::from_secs(config.alerts.scan_interval_seconds),
            move |_| {
                let now = Utc::now();
                scan.run(now);
                health.record_alert_scan(now, scan.flagged());
                Ok::<(), Infallible>(())
            },
        )
    };

    vec![positions, alerts]
}

/// Tracks which workers are on the live map and logs the ones that go quiet.
pub struct PositionRefresh {
    fleet: SharedFleet,
    live: BTreeSet<WorkerId>,
}

impl PositionRefresh {
    pub fn new(fleet: SharedFleet) -> Self {
        Self {
            fleet,
            live: BTreeSet::new(),
        }
    }

    /// Returns the workers that dropped off the live map since the previous run.
    pub fn run(&mut self, now: DateTime<Utc>) -> Vec<WorkerId> {
        let max_age = self.fleet.settings().max_age;
        let current: BTreeSet<WorkerId> = self
            .fleet
            .live_positions(max_age, now)
            .iter()
            .map(|w| w.worker_id)
            .collect();

        let silent: Vec<WorkerId> = self.live.difference(&current).copied().collect();
        for worker_id in &silent {
            info!(worker_id, "worker dropped off the live map");
        }
        trace!(live_workers = current.len(), "refreshed live positions");

        self.live = current;
        silent
    }

    pub fn live(&self) -> usize {
        self.live.len()
    }
}

/// Re-evaluates stale open shifts and logs each one once when it crosses the threshold.
pub struct AlertScan {
    fleet: SharedFleet,
    flagged: HashSet<Uuid>,
}

impl AlertScan {
    pub fn new(fleet: SharedFleet) -> Self {
        Self {
            fleet,
            flagged: HashSet::new(),
        }
    }

    /// Returns the alerts raised for the first time by this scan.
    pub fn run(&mut self, now: DateTime<Utc>) -> Vec<Alert> {
        let alerts = self.fleet.stale_open_shifts(None, now);
        let current: HashSet<Uuid> = alerts.iter().map(|a| a.shift_id).collect();

        let cleared = self.flagged.difference(&current).count();
        if cleared > 0 {
            info!(cleared, "stale shifts no longer open");
        }

        let raised: Vec<Alert> = alerts
            .into_iter()
            .filter(|a| !self.flagged.contains(&a.shift_id))
            .collect();
        for alert in &raised {
            warn!(
                worker_id = alert.worker_id,
                worker = %alert.full_name,
                shift_id = %alert.shift_id,
                hours_open = alert.hours_open,
                "shift open past alert threshold"
            );
        }

        self.flagged = current;
        raised
    }

    pub fn flagged(&self) -> usize {
        self.flagged.len()
    }
}
