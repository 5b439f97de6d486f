use crate::state::SharedFleet;
use crate::v1::api_models::{HoursSummaryDto, HoursSummaryRowDto, ShiftsQuery};
use crate::v1::error::ApiError;
use axum::Json;
use axum::extract::{Query, State};
use chrono::Utc;
use fleet_engine::calendar::ShiftFilter;

pub async fn get_hours_summary(
    State(fleet): State<SharedFleet>,
    Query(params): Query<ShiftsQuery>,
) -> Result<Json<HoursSummaryDto>, ApiError> {
    let requested_at = Utc::now();
    let filter = ShiftFilter {
        worker_id: params.worker_id,
        start_date: params.start_date,
        end_date: params.end_date,
    };

    let rows = fleet
        .hours_summary(&filter)?
        .into_iter()
        .map(HoursSummaryRowDto::from)
        .collect();

    Ok(Json(HoursSummaryDto {
        requested_at,
        start_date: filter.start_date,
        end_date: filter.end_date,
        rows,
    }))
}
