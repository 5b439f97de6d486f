use chrono::{DateTime, NaiveDate, Utc};
use fleet_engine::model::{Alert, HoursSummaryRow, LiveWorker, Shift, ShiftStatus, WorkerDirectory};
use serde::{Deserialize, Serialize};
use shared::fleet::{GeoPoint, VehicleType, WorkerId};
use uuid::Uuid;

/// Hours are kept at full precision in the engine and rounded only here.
pub fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivePositionsQuery {
    pub max_age_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftsQuery {
    pub worker_id: Option<WorkerId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerQuery {
    pub worker_id: Option<WorkerId>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsQuery {
    pub threshold_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct VehicleUpdate {
    pub vehicle_type: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveWorkerDto {
    pub worker_id: WorkerId,
    pub full_name: String,
    pub worker_number: Option<i32>,
    pub vehicle_type: VehicleType,
    pub latitude: f64,
    pub longitude: f64,
    pub last_seen: DateTime<Utc>,
}

impl From<LiveWorker> for LiveWorkerDto {
    fn from(live: LiveWorker) -> Self {
        Self {
            worker_id: live.worker_id,
            full_name: live.full_name,
            worker_number: live.worker_number,
            vehicle_type: live.vehicle,
            latitude: live.point.lat,
            longitude: live.point.lng,
            last_seen: live.last_seen,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LivePositionsDto {
    pub requested_at: DateTime<Utc>,
    pub max_age_seconds: Option<i64>,
    pub workers: Vec<LiveWorkerDto>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionAcceptedDto {
    /// False when the report was older than the position already known.
    pub accepted: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftDto {
    pub id: Uuid,
    pub worker_id: WorkerId,
    pub full_name: String,
    pub worker_number: Option<i32>,
    pub status: ShiftStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_hours: f64,
    pub start_position: Option<GeoPoint>,
    pub end_position: Option<GeoPoint>,
}

impl ShiftDto {
    pub fn new(shift: &Shift, directory: &impl WorkerDirectory, now: DateTime<Utc>) -> Self {
        let display = directory.display_or_unregistered(shift.worker_id);
        Self {
            id: shift.id,
            worker_id: shift.worker_id,
            full_name: display.full_name,
            worker_number: display.worker_number,
            status: shift.status(),
            start_time: shift.start,
            end_time: shift.end,
            duration_hours: round_hours(shift.duration_hours(now)),
            start_position: shift.start_position,
            end_position: shift.end_position,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftsDto {
    pub requested_at: DateTime<Utc>,
    pub worker_id: Option<WorkerId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub count: usize,
    pub total_hours: f64,
    pub shifts: Vec<ShiftDto>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDto {
    pub shift_id: Uuid,
    pub worker_id: WorkerId,
    pub full_name: String,
    pub worker_number: Option<i32>,
    pub start_time: DateTime<Utc>,
    pub hours_open: f64,
}

impl From<Alert> for AlertDto {
    fn from(alert: Alert) -> Self {
        Self {
            shift_id: alert.shift_id,
            worker_id: alert.worker_id,
            full_name: alert.full_name,
            worker_number: alert.worker_number,
            start_time: alert.start,
            hours_open: round_hours(alert.hours_open),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsDto {
    pub requested_at: DateTime<Utc>,
    pub threshold_hours: f64,
    pub alerts: Vec<AlertDto>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoursSummaryRowDto {
    pub worker_id: WorkerId,
    pub full_name: String,
    pub worker_number: Option<i32>,
    pub shift_count: u32,
    pub total_hours: f64,
    pub average_hours: f64,
}

impl From<HoursSummaryRow> for HoursSummaryRowDto {
    fn from(row: HoursSummaryRow) -> Self {
        Self {
            worker_id: row.worker_id,
            full_name: row.full_name,
            worker_number: row.worker_number,
            shift_count: row.shift_count,
            total_hours: round_hours(row.total_hours),
            average_hours: round_hours(row.average_hours),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoursSummaryDto {
    pub requested_at: DateTime<Utc>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub rows: Vec<HoursSummaryRowDto>,
}
