#[warn(clippy::pedantic)]
mod error;
mod jobs;
mod state;
mod store;
mod v1;

use crate::error::MainError;
use crate::state::{AppState, Health};
use crate::store::ConfiguredStore;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use chrono::{TimeDelta, Utc};
use fleet_engine::scheduler::RefreshScheduler;
use fleet_engine::{Fleet, FleetSettings};
use shared::error::InitializationError;
use shared::{init_tracing, load_config, shutdown_listener};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), MainError> {
    init_tracing()?;

    let config = load_config().map_err(InitializationError::Config)?;
    let settings = FleetSettings::from_config(&config).map_err(InitializationError::Config)?;

    let store = ConfiguredStore::connect(config.postgres.as_ref()).await?;
    let fleet = Arc::new(Fleet::hydrate(Arc::new(store), settings).await?);

    // Three missed scans in a row make the service unhealthy.
    let scan_interval = i64::try_from(config.alerts.scan_interval_seconds).unwrap_or(i64::MAX);
    let health = Health::new(
        TimeDelta::try_seconds(scan_interval.saturating_mul(3)).unwrap_or(TimeDelta::MAX),
    );

    // Cancellation token shared across tasks; listener cancels on SIGINT/SIGTERM.
    let shutdown_token = CancellationToken::new();
    let signal_handle = tokio::spawn(shutdown_listener(Some(shutdown_token.clone())));

    let scheduler = RefreshScheduler::new(shutdown_token.child_token());
    jobs::subscribe_refresh_jobs(&scheduler, &fleet, &health, &config);

    let axum_handle = tokio::spawn(run_server(
        AppState { fleet, health },
        config.server.listen_addr.clone(),
        shutdown_token.clone(),
    ));

    tokio::select! {
        res = axum_handle => {
            shutdown_token.cancel();
            scheduler.shutdown().await;
            res??;
        }
        res = signal_handle => {
            shutdown_token.cancel();
            scheduler.shutdown().await;
            res?;
        }
    }

    Ok(())
}

async fn run_server(
    state: AppState,
    listen_addr: String,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/v1", v1::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    info!("starting server at {listen_addr}");
    let listener = TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
        })
        .await?;
    Ok(())
}

async fn health_check(State(health): State<Health>) -> impl IntoResponse {
    let last_scan = *health.last_alert_scan.read();
    let last_refresh = *health.last_position_refresh.read();
    let open_alerts = *health.open_alerts.read();
    let live_workers = *health.live_workers.read();

    let Some(last_scan) = last_scan else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "No alert scan has completed yet".to_string(),
        );
    };

    let refresh = last_refresh.map_or_else(|| "never".to_string(), |at| at.to_string());
    if (Utc::now() - last_scan) > health.max_scan_gap {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!(
                "Alert scan has not run since {last_scan} ({} allowed). Last position refresh: {refresh}",
                humantime::format_duration(health.max_scan_gap.to_std().unwrap_or_default())
            ),
        )
    } else {
        (
            StatusCode::OK,
            format!(
                "Last alert scan: {last_scan} ({open_alerts} open alerts). Last position refresh: {refresh} ({live_workers} live workers)"
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_follows_alert_scans() {
        let health = Health::new(TimeDelta::seconds(90));
        let response = health_check(State(health.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        health.record_alert_scan(Utc::now(), 2);
        let response = health_check(State(health.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        health.record_alert_scan(Utc::now() - TimeDelta::minutes(5), 2);
        let response = health_check(State(health)).await.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
