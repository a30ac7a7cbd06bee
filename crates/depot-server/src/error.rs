//! HTTP error responses

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use depot_core::ErrorKind;
use serde::Serialize;

/// A coordinator error on its way out as an HTTP response.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] depot_core::Error);

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(depot_core::Error::bad_request(message))
    }

    pub fn kind(&self) -> ErrorKind {
        self.0.kind()
    }

    pub fn status_code(&self) -> StatusCode {
        status_for(self.kind())
    }
}

/// Status for each error kind. Exhaustive, so a new kind must be mapped.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            code: status.as_u16(),
            kind: self.kind(),
            message: self.0.message().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_a_status() {
        let statuses: Vec<u16> = ErrorKind::ALL
            .into_iter()
            .map(|kind| status_for(kind).as_u16())
            .collect();
        assert_eq!(statuses, vec![400, 409, 404, 500]);
    }

    #[test]
    fn test_status_follows_kind() {
        let err = ApiError::from(depot_core::Error::conflict("taken"));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
