use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fleet_engine::EngineError;
use serde::{Serialize, Serializer};
use shared::fleet::PayloadError;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    #[serde(serialize_with = "serialize_status")]
    pub status_code: StatusCode,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Engine(e) => match e {
                EngineError::Conflict(_) => {
                    debug!(error = %e, "request conflicts with current state");
                    ErrorMessage::from((StatusCode::CONFLICT, e.to_string())).into_response()
                }
                EngineError::NotFound(_) => {
                    ErrorMessage::from((StatusCode::NOT_FOUND, e.to_string())).into_response()
                }
                EngineError::InvalidTime { .. } | EngineError::InvalidRange { .. } => {
                    ErrorMessage::from((StatusCode::BAD_REQUEST, e.to_string())).into_response()
                }
                EngineError::TrackingDisabled(_) | EngineError::InactiveWorker(_) => {
                    ErrorMessage::from((StatusCode::FORBIDDEN, e.to_string())).into_response()
                }
                EngineError::Store(e) => {
                    warn!(error = ?e, "store error");
                    ErrorMessage::from((StatusCode::INTERNAL_SERVER_ERROR, "internal server error"))
                        .into_response()
                }
            },
            ApiError::Payload(e) => {
                ErrorMessage::from((StatusCode::BAD_REQUEST, e.to_string())).into_response()
            }
            ApiError::BadRequest(message) => {
                ErrorMessage::from((StatusCode::BAD_REQUEST, message)).into_response()
            }
        }
    }
}

fn serialize_status<S>(value: &StatusCode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u16(value.as_u16())
}

impl From<(StatusCode, String)> for ErrorMessage {
    fn from((status_code, message): (StatusCode, String)) -> Self {
        Self {
            status_code,
            message,
        }
    }
}

impl From<(StatusCode, &str)> for ErrorMessage {
    fn from((status_code, message): (StatusCode, &str)) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ErrorMessage {
    fn into_response(self) -> Response {
        (self.status_code, Json(self)).into_response()
    }
}
