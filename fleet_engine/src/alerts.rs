use crate::calendar::hours;
use crate::ledger::ShiftLedger;
use crate::model::{Alert, WorkerDirectory};
use crate::store::FleetStore;
use chrono::{DateTime, TimeDelta, Utc};

/// How long a shift may stay open before it is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertThreshold(TimeDelta);

impl AlertThreshold {
    pub const DEFAULT_HOURS: f64 = 12.0;

    /// Returns `None` for negative, non-finite or out of range values.
    pub fn from_hours(hours: f64) -> Option<Self> {
        if !hours.is_finite() || hours < 0.0 {
            return None;
        }
        let millis = (hours * 3_600_000.0).round();
        if millis > i64::MAX as f64 {
            return None;
        }
        TimeDelta::try_milliseconds(millis as i64).map(Self)
    }

    pub fn span(&self) -> TimeDelta {
        self.0
    }

    pub fn hours(&self) -> f64 {
        hours(self.0)
    }
}

impl Default for AlertThreshold {
    fn default() -> Self {
        Self(TimeDelta::hours(12))
    }
}

/// Every open shift that has been open strictly longer than `threshold` at `now`,
/// longest-open first.
pub fn find_stale_open_shifts<S: FleetStore>(
    ledger: &ShiftLedger<S>,
    directory: &impl WorkerDirectory,
    threshold: AlertThreshold,
    now: DateTime<Utc>,
) -> Vec<Alert> {
    let mut stale: Vec<_> = ledger
        .open_shifts()
        .into_iter()
        .filter(|shift| shift.duration(now) > threshold.span())
        .collect();
    stale.sort_by(|a, b| {
        b.duration(now)
            .cmp(&a.duration(now))
            .then_with(|| a.worker_id.cmp(&b.worker_id))
    });

    stale
        .into_iter()
        .map(|shift| {
            let display = directory.display_or_unregistered(shift.worker_id);
            Alert {
                shift_id: shift.id,
                worker_id: shift.worker_id,
                full_name: display.full_name,
                worker_number: display.worker_number,
                start: shift.start,
                hours_open: shift.duration_hours(now),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Calendar;
    use crate::error::EngineError;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use std::sync::Arc;

    struct NoDirectory;

    impl WorkerDirectory for NoDirectory {
        fn display(&self, _: shared::fleet::WorkerId) -> Option<crate::model::WorkerDisplay> {
            None
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 6, 0, 0).unwrap()
    }

    #[test]
    fn threshold_from_hours() {
        assert_eq!(AlertThreshold::from_hours(12.0), Some(AlertThreshold::default()));
        assert_eq!(
            AlertThreshold::from_hours(0.5).map(|t| t.span()),
            Some(TimeDelta::minutes(30))
        );
        assert!(AlertThreshold::from_hours(-1.0).is_none());
        assert!(AlertThreshold::from_hours(f64::NAN).is_none());
    }

    #[tokio::test]
    async fn threshold_is_strict() -> Result<(), EngineError> {
        let ledger = ShiftLedger::new(
            Arc::new(MemoryStore::new().with_worker_ids(1..=3)),
            Calendar::utc(),
        );
        ledger.open_shift(1, start(), None).await?;

        let exactly = start() + TimeDelta::hours(12);
        let threshold = AlertThreshold::default();
        assert!(find_stale_open_shifts(&ledger, &NoDirectory, threshold, exactly).is_empty());

        let just_over = start() + TimeDelta::seconds(12 * 3600 + 36);
        let alerts = find_stale_open_shifts(&ledger, &NoDirectory, threshold, just_over);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].hours_open, 12.01);
        assert_eq!(alerts[0].full_name, "unregistered worker 1");
        assert_eq!(alerts[0].worker_number, None);
        Ok(())
    }

    #[tokio::test]
    async fn closed_shifts_never_alert_and_longest_comes_first() -> Result<(), EngineError> {
        let ledger = ShiftLedger::new(
            Arc::new(MemoryStore::new().with_worker_ids(1..=3)),
            Calendar::utc(),
        );
        ledger.open_shift(1, start(), None).await?;
        ledger.close_shift(1, start() + TimeDelta::hours(20), None).await?;
        ledger.open_shift(2, start() + TimeDelta::hours(2), None).await?;
        ledger.open_shift(3, start(), None).await?;

        let now = start() + TimeDelta::hours(30);
        let alerts = find_stale_open_shifts(&ledger, &NoDirectory, AlertThreshold::default(), now);
        let workers: Vec<_> = alerts.iter().map(|a| a.worker_id).collect();
        assert_eq!(workers, vec![3, 2]);
        assert_eq!(alerts[0].hours_open, 30.0);
        assert_eq!(alerts[1].hours_open, 28.0);
        Ok(())
    }
}
