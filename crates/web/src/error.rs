use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use chess_orchestrator_core::Error;

/// Core errors rendered as `{"detail": ...}`
pub struct AppError(pub Error);

impl From<Error> for AppError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Move(_)
            | Error::InvalidFen(_)
            | Error::InvalidSquare(_)
            | Error::InvalidRequest(_)
            | Error::Pgn(_) => StatusCode::BAD_REQUEST,
            Error::NotInitialized | Error::Destroyed | Error::EngineUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Error::Engine(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, AppError>;
