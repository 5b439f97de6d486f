use crate::state::SharedFleet;
use crate::v1::api_models::{
    LivePositionsDto, LivePositionsQuery, LiveWorkerDto, PositionAcceptedDto,
};
use crate::v1::error::ApiError;
use axum::Json;
use axum::extract::{Query, State};
use chrono::{TimeDelta, Utc};
use shared::fleet::PositionReport;

pub async fn get_live_positions(
    State(fleet): State<SharedFleet>,
    Query(params): Query<LivePositionsQuery>,
) -> Result<Json<LivePositionsDto>, ApiError> {
    let requested_at = Utc::now();

    let max_age = match params.max_age_seconds {
        Some(secs) => Some(
            i64::try_from(secs)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .ok_or_else(|| {
                    ApiError::BadRequest(format!("maxAgeSeconds {secs} is out of range"))
                })?,
        ),
        None => fleet.settings().max_age,
    };

    let workers = fleet
        .live_positions(max_age, requested_at)
        .into_iter()
        .map(LiveWorkerDto::from)
        .collect();

    Ok(Json(LivePositionsDto {
        requested_at,
        max_age_seconds: max_age.map(|age| age.num_seconds()),
        workers,
    }))
}

pub async fn post_position(
    State(fleet): State<SharedFleet>,
    Json(report): Json<PositionReport>,
) -> Result<Json<PositionAcceptedDto>, ApiError> {
    let point = report.point()?;
    let accepted = fleet
        .report_position(report.worker_id, point, report.timestamp)
        .await?;
    Ok(Json(PositionAcceptedDto { accepted }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v1::handlers::test_support;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    fn report(worker_id: i32, latitude: f64, minutes_ago: i64) -> PositionReport {
        PositionReport {
            worker_id,
            latitude,
            longitude: 2.17,
            timestamp: Utc::now() - TimeDelta::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn reports_show_up_in_live_snapshot() {
        let fleet = test_support::fleet().await;
        fleet.open_shift(1, Utc::now() - TimeDelta::hours(1)).await.unwrap();

        let Json(accepted) = post_position(State(fleet.clone()), Json(report(1, 41.38, 30)))
            .await
            .unwrap();
        assert!(accepted.accepted);
        let Json(stale) = post_position(State(fleet.clone()), Json(report(1, 41.0, 40)))
            .await
            .unwrap();
        assert!(!stale.accepted);

        let Json(live) = get_live_positions(State(fleet.clone()), Query(LivePositionsQuery::default()))
            .await
            .unwrap();
        assert_eq!(live.workers.len(), 1);
        assert_eq!(live.workers[0].latitude, 41.38);
        assert_eq!(live.workers[0].full_name, "Clara Núñez");

        let Json(recent) = get_live_positions(
            State(fleet),
            Query(LivePositionsQuery {
                max_age_seconds: Some(60),
            }),
        )
        .await
        .unwrap();
        assert!(recent.workers.is_empty());
        assert_eq!(recent.max_age_seconds, Some(60));
    }

    #[tokio::test]
    async fn gated_and_invalid_reports_are_rejected() {
        let fleet = test_support::fleet().await;

        let no_shift = post_position(State(fleet.clone()), Json(report(2, 41.38, 1))).await;
        let status = no_shift.map(|_| ()).unwrap_err().into_response().status();
        assert_eq!(status, StatusCode::FORBIDDEN);

        let out_of_range = post_position(State(fleet), Json(report(2, 95.0, 1))).await;
        let status = out_of_range.map(|_| ()).unwrap_err().into_response().status();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
