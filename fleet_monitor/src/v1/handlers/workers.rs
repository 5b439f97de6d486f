use crate::state::SharedFleet;
use crate::v1::api_models::VehicleUpdate;
use crate::v1::error::ApiError;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use fleet_engine::model::{NewWorker, Worker};
use shared::fleet::{VehicleType, WorkerId, WorkerRegistration};

pub async fn get_workers(State(fleet): State<SharedFleet>) -> Json<Vec<Worker>> {
    Json(fleet.workers())
}

pub async fn get_worker(
    State(fleet): State<SharedFleet>,
    Path(worker_id): Path<WorkerId>,
) -> Result<Json<Worker>, ApiError> {
    Ok(Json(fleet.worker(worker_id)?))
}

pub async fn post_worker(
    State(fleet): State<SharedFleet>,
    Json(registration): Json<WorkerRegistration>,
) -> Result<(StatusCode, Json<Worker>), ApiError> {
    let vehicle = registration.vehicle(fleet.settings().default_vehicle)?;
    if registration.full_name.trim().is_empty() {
        return Err(ApiError::BadRequest("fullName must not be empty".to_string()));
    }

    let worker = fleet
        .register_worker(
            NewWorker {
                id: registration.id,
                full_name: registration.full_name.trim().to_string(),
                worker_number: registration.worker_number,
                vehicle: Some(vehicle),
            },
            Utc::now(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(worker)))
}

pub async fn post_deactivate_worker(
    State(fleet): State<SharedFleet>,
    Path(worker_id): Path<WorkerId>,
) -> Result<Json<Worker>, ApiError> {
    Ok(Json(fleet.deactivate_worker(worker_id).await?))
}

pub async fn put_worker_vehicle(
    State(fleet): State<SharedFleet>,
    Path(worker_id): Path<WorkerId>,
    Json(update): Json<VehicleUpdate>,
) -> Result<Json<Worker>, ApiError> {
    let vehicle: VehicleType = update.vehicle_type.parse()?;
    Ok(Json(fleet.set_vehicle(worker_id, vehicle).await?))
}

pub async fn delete_worker(
    State(fleet): State<SharedFleet>,
    Path(worker_id): Path<WorkerId>,
) -> Result<StatusCode, ApiError> {
    fleet.remove_worker(worker_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v1::handlers::test_support;
    use axum::response::IntoResponse;

    fn registration(id: WorkerId, number: i32, vehicle: Option<&str>) -> Json<WorkerRegistration> {
        Json(WorkerRegistration {
            id,
            full_name: format!("Rider {id}"),
            worker_number: number,
            vehicle_type: vehicle.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn register_change_vehicle_and_delete() {
        let fleet = test_support::fleet().await;

        let (status, Json(worker)) =
            post_worker(State(fleet.clone()), registration(3, 30, Some("scooter")))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(worker.vehicle, VehicleType::Scooter);

        let Json(updated) = put_worker_vehicle(
            State(fleet.clone()),
            Path(3),
            Json(VehicleUpdate {
                vehicle_type: "Motorcycle".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(updated.vehicle, VehicleType::Motorcycle);

        let status = delete_worker(State(fleet.clone()), Path(3)).await.unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        let Json(workers) = get_workers(State(fleet)).await;
        let ids: Vec<_> = workers.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn duplicate_number_and_unknown_vehicle_are_rejected() {
        let fleet = test_support::fleet().await;

        let duplicate = post_worker(State(fleet.clone()), registration(3, 10, None)).await;
        assert_eq!(
            duplicate.map(|_| ()).unwrap_err().into_response().status(),
            StatusCode::CONFLICT
        );

        let truck = post_worker(State(fleet), registration(4, 40, Some("truck"))).await;
        assert_eq!(
            truck.map(|_| ()).unwrap_err().into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn workers_with_shifts_are_deactivated_not_deleted() {
        let fleet = test_support::fleet().await;
        fleet.open_shift(1, Utc::now()).await.unwrap();

        let refused = delete_worker(State(fleet.clone()), Path(1)).await;
        assert_eq!(
            refused.map(|_| ()).unwrap_err().into_response().status(),
            StatusCode::CONFLICT
        );

        let Json(worker) = post_deactivate_worker(State(fleet.clone()), Path(1))
            .await
            .unwrap();
        assert!(!worker.active);
        assert_eq!(
            get_worker(State(fleet), Path(1)).await.unwrap().0.id,
            1
        );
    }
}
