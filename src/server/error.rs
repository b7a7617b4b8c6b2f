use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::DeviceError;

/// API错误类型
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn new(status: StatusCode, error: impl Into<anyhow::Error>) -> Self {
        Self { status, error: error.into() }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, anyhow::anyhow!("invalid token"))
    }
}

fn status_of(error: &anyhow::Error) -> StatusCode {
    match error.downcast_ref::<DeviceError>() {
        Some(DeviceError::UnknownDevice(_) | DeviceError::UnknownImage { .. }) => StatusCode::NOT_FOUND,
        Some(DeviceError::DuplicateDevice(_)) => StatusCode::CONFLICT,
        Some(
            DeviceError::EmptyImageSet
            | DeviceError::InvalidDeviceName(_)
            | DeviceError::ImageDecode(_),
        ) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "message": self.error.to_string(),
        });
        (self.status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let error = err.into();
        Self { status: status_of(&error), error }
    }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
