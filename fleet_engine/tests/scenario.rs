use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use fleet_engine::calendar::ShiftFilter;
use fleet_engine::model::{NewWorker, ShiftStatus};
use fleet_engine::store::MemoryStore;
use fleet_engine::{EngineError, Fleet, FleetSettings};
use shared::fleet::{GeoPoint, VehicleType};
use std::sync::Arc;

fn shift_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 7, 0, 0).unwrap()
}

async fn fleet() -> Result<(MemoryStore, Fleet<MemoryStore>), EngineError> {
    let store = MemoryStore::new();
    let fleet = Fleet::new(Arc::new(store.clone()), FleetSettings::default());
    fleet
        .register_worker(
            NewWorker {
                id: 3,
                full_name: "Jordi Puig".to_string(),
                worker_number: 3,
                vehicle: Some(VehicleType::Motorcycle),
            },
            shift_start() - TimeDelta::days(30),
        )
        .await?;
    Ok((store, fleet))
}

#[tokio::test]
async fn forgotten_shift_alerts_until_force_closed() -> Result<(), EngineError> {
    let (store, fleet) = fleet().await?;
    let t = shift_start();

    let shift = fleet.open_shift(3, t).await?;
    assert!(
        fleet
            .report_position(3, GeoPoint::new(41.39, 2.17).unwrap(), t + TimeDelta::minutes(1))
            .await?
    );
    assert!(
        fleet
            .report_position(3, GeoPoint::new(41.40, 2.18).unwrap(), t + TimeDelta::minutes(2))
            .await?
    );
    assert_eq!(store.locations().len(), 2);

    let live = fleet.live_positions(None, t + TimeDelta::minutes(3));
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].worker_number, Some(3));
    assert_eq!(live[0].last_seen, t + TimeDelta::minutes(2));

    let later = t + TimeDelta::hours(13);
    let alerts = fleet.stale_open_shifts(None, later);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].shift_id, shift.id);
    assert_eq!(alerts[0].full_name, "Jordi Puig");
    assert!((alerts[0].hours_open - 13.0).abs() < 1e-9);

    let closed = fleet.force_close(shift.id, later).await?;
    assert_eq!(closed.status(), ShiftStatus::Closed);
    assert_eq!(closed.end_position, Some(GeoPoint::new(41.40, 2.18).unwrap()));
    assert!(fleet.stale_open_shifts(None, later).is_empty());

    let january = ShiftFilter::between(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    );
    let rows = fleet.hours_summary(&january)?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].worker_id, 3);
    assert_eq!(rows[0].shift_count, 1);
    assert_eq!(rows[0].total_hours, 13.0);
    assert_eq!(rows[0].average_hours, 13.0);

    // once the shift is closed the privacy gate stops accepting positions
    assert!(matches!(
        fleet
            .report_position(3, GeoPoint::new(41.41, 2.19).unwrap(), later + TimeDelta::minutes(1))
            .await,
        Err(EngineError::TrackingDisabled(3))
    ));
    Ok(())
}

#[tokio::test]
async fn daily_history_lists_open_and_closed_shifts() -> Result<(), EngineError> {
    let (_, fleet) = fleet().await?;
    let t = shift_start();

    fleet.open_shift(3, t).await?;
    fleet.close_shift(3, t + TimeDelta::hours(4)).await?;
    fleet.open_shift(3, t + TimeDelta::hours(5)).await?;

    let day = ShiftFilter::day(t.date_naive());
    let list = fleet.list_shifts(day)?;
    let shifts: Vec<_> = list.iter().collect();
    assert_eq!(shifts.len(), 2);
    assert!(shifts[0].is_open());
    assert_eq!(shifts[1].duration_hours(t + TimeDelta::hours(6)), 4.0);
    assert_eq!(shifts[0].duration_hours(t + TimeDelta::hours(6)), 1.0);

    let next_day = ShiftFilter::day(t.date_naive() + TimeDelta::days(1));
    assert_eq!(fleet.list_shifts(next_day)?.iter().count(), 0);
    Ok(())
}
