use crate::model::{LivePosition, LiveWorker, WorkerDirectory};
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use shared::fleet::{GeoPoint, WorkerId};
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// Latest known position per worker. Older or duplicate reports are dropped.
#[derive(Default)]
pub struct LivePositionCache {
    entries: RwLock<HashMap<WorkerId, LivePosition>>,
}

impl LivePositionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the report replaced the cached entry.
    pub fn report(&self, worker_id: WorkerId, point: GeoPoint, at: DateTime<Utc>) -> bool {
        let mut entries = self.entries.write();
        if let Some(current) = entries.get(&worker_id)
            && at <= current.seen_at
        {
            trace!(
                worker_id,
                reported_at = %at,
                cached_at = %current.seen_at,
                "dropping stale position report"
            );
            return false;
        }
        entries.insert(
            worker_id,
            LivePosition {
                worker_id,
                point,
                seen_at: at,
            },
        );
        true
    }

    /// Cheap pre-check so callers can skip side effects for reports that would be dropped.
    pub fn is_newer(&self, worker_id: WorkerId, at: DateTime<Utc>) -> bool {
        self.entries
            .read()
            .get(&worker_id)
            .is_none_or(|current| at > current.seen_at)
    }

    pub fn get(&self, worker_id: WorkerId) -> Option<LivePosition> {
        self.entries.read().get(&worker_id).copied()
    }

    pub fn evict(&self, worker_id: WorkerId) -> Option<LivePosition> {
        let evicted = self.entries.write().remove(&worker_id);
        if evicted.is_some() {
            debug!(worker_id, "evicted cached position");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Copies every entry seen within `max_age` of `now` (all entries when `None`),
    /// ordered by worker id and joined with display data from `directory`.
    pub fn snapshot(
        &self,
        directory: &impl WorkerDirectory,
        max_age: Option<TimeDelta>,
        now: DateTime<Utc>,
    ) -> Vec<LiveWorker> {
        let mut positions: Vec<LivePosition> = {
            let entries = self.entries.read();
            entries
                .values()
                .filter(|p| max_age.is_none_or(|max_age| now - p.seen_at <= max_age))
                .copied()
                .collect()
        };
        positions.sort_by_key(|p| p.worker_id);

        positions
            .into_iter()
            .filter_map(|p| {
                let Some(display) = directory.display(p.worker_id) else {
                    warn!(worker_id = p.worker_id, "cached position for unknown worker");
                    return None;
                };
                Some(LiveWorker {
                    worker_id: p.worker_id,
                    full_name: display.full_name,
                    worker_number: display.worker_number,
                    vehicle: display.vehicle,
                    point: p.point,
                    last_seen: p.seen_at,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WorkerDisplay;
    use chrono::TimeZone;
    use shared::fleet::VehicleType;
    use std::collections::HashMap;

    struct Directory(HashMap<WorkerId, WorkerDisplay>);

    impl WorkerDirectory for Directory {
        fn display(&self, worker_id: WorkerId) -> Option<WorkerDisplay> {
            self.0.get(&worker_id).cloned()
        }
    }

    fn directory(ids: &[WorkerId]) -> Directory {
        Directory(
            ids.iter()
                .map(|&id| {
                    (
                        id,
                        WorkerDisplay {
                            full_name: format!("Rider {id}"),
                            worker_number: Some(id * 10),
                            vehicle: VehicleType::Motorcycle,
                        },
                    )
                })
                .collect(),
        )
    }

    fn point(lat: f64, lng: f64) -> GeoPoint {
        GeoPoint::new(lat, lng).unwrap()
    }

    fn t(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
    }

    #[test]
    fn older_report_does_not_replace_newer() {
        let cache = LivePositionCache::new();
        assert!(cache.report(1, point(40.0, -3.0), t(10)));
        assert!(!cache.report(1, point(41.0, -4.0), t(5)));
        assert!(!cache.report(1, point(41.0, -4.0), t(10)));

        let entry = cache.get(1).unwrap();
        assert_eq!(entry.point, point(40.0, -3.0));
        assert_eq!(entry.seen_at, t(10));

        assert!(cache.report(1, point(42.0, -5.0), t(11)));
        assert_eq!(cache.get(1).unwrap().point, point(42.0, -5.0));
    }

    #[test]
    fn snapshot_is_ordered_enriched_and_repeatable() {
        let cache = LivePositionCache::new();
        let directory = directory(&[1, 2]);
        cache.report(2, point(40.1, -3.1), t(1));
        cache.report(1, point(40.2, -3.2), t(2));

        let first = cache.snapshot(&directory, None, t(30));
        let second = cache.snapshot(&directory, None, t(30));
        assert_eq!(first, second);
        assert_eq!(first.iter().map(|w| w.worker_id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(first[0].full_name, "Rider 1");
        assert_eq!(first[0].vehicle, VehicleType::Motorcycle);
    }

    #[test]
    fn snapshot_applies_max_age() {
        let cache = LivePositionCache::new();
        let directory = directory(&[1, 2]);
        cache.report(1, point(40.0, -3.0), t(0));
        cache.report(2, point(40.0, -3.0), t(25));

        let fresh = cache.snapshot(&directory, Some(TimeDelta::minutes(10)), t(30));
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].worker_id, 2);
        assert_eq!(cache.snapshot(&directory, None, t(30)).len(), 2);
    }

    #[test]
    fn evicted_worker_leaves_snapshot() {
        let cache = LivePositionCache::new();
        let directory = directory(&[1]);
        cache.report(1, point(40.0, -3.0), t(0));
        assert!(cache.evict(1).is_some());
        assert!(cache.evict(1).is_none());
        assert!(cache.snapshot(&directory, None, t(1)).is_empty());
        // a fresh report after eviction is accepted regardless of the old timestamp
        assert!(cache.report(1, point(40.0, -3.0), t(0)));
    }
}
