use crate::state::SharedFleet;
use crate::v1::api_models::{ShiftDto, ShiftsDto, ShiftsQuery, WorkerQuery, round_hours};
use crate::v1::error::ApiError;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{NaiveDate, Utc};
use fleet_engine::calendar::ShiftFilter;
use shared::fleet::{ForceCloseCommand, ShiftCommand};
use uuid::Uuid;

pub async fn get_shifts(
    State(fleet): State<SharedFleet>,
    Query(params): Query<ShiftsQuery>,
) -> Result<Json<ShiftsDto>, ApiError> {
    shifts_matching(
        &fleet,
        ShiftFilter {
            worker_id: params.worker_id,
            start_date: params.start_date,
            end_date: params.end_date,
        },
    )
}

pub async fn get_daily_shifts(
    State(fleet): State<SharedFleet>,
    Path(date): Path<NaiveDate>,
    Query(params): Query<WorkerQuery>,
) -> Result<Json<ShiftsDto>, ApiError> {
    shifts_matching(&fleet, ShiftFilter::day(date).with_worker(params.worker_id))
}

pub async fn get_weekly_shifts(
    State(fleet): State<SharedFleet>,
    Path((year, week)): Path<(i32, u32)>,
    Query(params): Query<WorkerQuery>,
) -> Result<Json<ShiftsDto>, ApiError> {
    let filter = ShiftFilter::iso_week(year, week)
        .ok_or_else(|| ApiError::BadRequest(format!("{year} has no ISO week {week}")))?;
    shifts_matching(&fleet, filter.with_worker(params.worker_id))
}

pub async fn get_monthly_shifts(
    State(fleet): State<SharedFleet>,
    Path((year, month)): Path<(i32, u32)>,
    Query(params): Query<WorkerQuery>,
) -> Result<Json<ShiftsDto>, ApiError> {
    let filter = ShiftFilter::month(year, month)
        .ok_or_else(|| ApiError::BadRequest(format!("{year}-{month} is not a valid month")))?;
    shifts_matching(&fleet, filter.with_worker(params.worker_id))
}

fn shifts_matching(fleet: &SharedFleet, filter: ShiftFilter) -> Result<Json<ShiftsDto>, ApiError> {
    let requested_at = Utc::now();
    let list = fleet.list_shifts(filter)?;

    let shifts: Vec<ShiftDto> = list
        .iter()
        .map(|shift| ShiftDto::new(shift, fleet.registry(), requested_at))
        .collect();
    let total_hours = list
        .iter()
        .map(|shift| shift.duration_hours(requested_at))
        .sum();

    Ok(Json(ShiftsDto {
        requested_at,
        worker_id: filter.worker_id,
        start_date: filter.start_date,
        end_date: filter.end_date,
        count: shifts.len(),
        total_hours: round_hours(total_hours),
        shifts,
    }))
}

pub async fn post_open_shift(
    State(fleet): State<SharedFleet>,
    Json(command): Json<ShiftCommand>,
) -> Result<(StatusCode, Json<ShiftDto>), ApiError> {
    let now = Utc::now();
    let shift = fleet
        .open_shift(command.worker_id, command.at.unwrap_or(now))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ShiftDto::new(&shift, fleet.registry(), now)),
    ))
}

pub async fn post_close_shift(
    State(fleet): State<SharedFleet>,
    Json(command): Json<ShiftCommand>,
) -> Result<Json<ShiftDto>, ApiError> {
    let now = Utc::now();
    let shift = fleet
        .close_shift(command.worker_id, command.at.unwrap_or(now))
        .await?;
    Ok(Json(ShiftDto::new(&shift, fleet.registry(), now)))
}

pub async fn post_force_close(
    State(fleet): State<SharedFleet>,
    Path(shift_id): Path<Uuid>,
    Json(command): Json<ForceCloseCommand>,
) -> Result<Json<ShiftDto>, ApiError> {
    let now = Utc::now();
    let shift = fleet.force_close(shift_id, command.at.unwrap_or(now)).await?;
    Ok(Json(ShiftDto::new(&shift, fleet.registry(), now)))
}
