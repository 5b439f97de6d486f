use crate::state::SharedFleet;
use crate::v1::api_models::{AlertDto, AlertsDto, AlertsQuery};
use crate::v1::error::ApiError;
use axum::Json;
use axum::extract::{Query, State};
use chrono::Utc;
use fleet_engine::alerts::AlertThreshold;

pub async fn get_open_shift_alerts(
    State(fleet): State<SharedFleet>,
    Query(params): Query<AlertsQuery>,
) -> Result<Json<AlertsDto>, ApiError> {
    let requested_at = Utc::now();
    let threshold = match params.threshold_hours {
        Some(hours) => AlertThreshold::from_hours(hours).ok_or_else(|| {
            ApiError::BadRequest(format!("thresholdHours {hours} must be a non-negative number"))
        })?,
        None => fleet.settings().threshold,
    };

    let alerts = fleet
        .stale_open_shifts(Some(threshold), requested_at)
        .into_iter()
        .map(AlertDto::from)
        .collect();

    Ok(Json(AlertsDto {
        requested_at,
        threshold_hours: threshold.hours(),
        alerts,
    }))
}
