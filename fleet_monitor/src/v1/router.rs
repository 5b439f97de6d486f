use crate::state::AppState;
use crate::v1::handlers::alerts::get_open_shift_alerts;
use crate::v1::handlers::positions::{get_live_positions, post_position};
use crate::v1::handlers::reports::get_hours_summary;
use crate::v1::handlers::shifts::{
    get_daily_shifts, get_monthly_shifts, get_shifts, get_weekly_shifts, post_close_shift,
    post_force_close, post_open_shift,
};
use crate::v1::handlers::workers::{
    delete_worker, get_worker, get_workers, post_deactivate_worker, post_worker,
    put_worker_vehicle,
};
use axum::Router;
use axum::routing::{get, post, put};

pub fn router() -> Router<AppState> {
    Router::<AppState>::new()
        .route("/positions", post(post_position))
        .route("/positions/live", get(get_live_positions))
        .route("/shifts", get(get_shifts))
        .route("/shifts/open", post(post_open_shift))
        .route("/shifts/close", post(post_close_shift))
        .route("/shifts/{id}/force-close", post(post_force_close))
        .route("/shifts/daily/{date}", get(get_daily_shifts))
        .route("/shifts/weekly/{year}/{week}", get(get_weekly_shifts))
        .route("/shifts/monthly/{year}/{month}", get(get_monthly_shifts))
        .route("/alerts/open-shifts", get(get_open_shift_alerts))
        .route("/reports/hours-summary", get(get_hours_summary))
        .route("/workers", get(get_workers).post(post_worker))
        .route("/workers/{id}", get(get_worker).delete(delete_worker))
        .route("/workers/{id}/deactivate", post(post_deactivate_worker))
        .route("/workers/{id}/vehicle", put(put_worker_vehicle))
}
