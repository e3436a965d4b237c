//! Bearer-token extractors and error responses.

use std::sync::Arc;

use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::error;

use super::AppState;
use super::types::ErrorResponse;
use crate::auth::Identity;
use crate::error::{GridError, GridResult};

fn authenticate(parts: &Parts, state: &AppState) -> GridResult<Identity> {
    let token = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(GridError::Unauthorized)?;
    state.auth.verify(token)
}

fn status_of(err: &GridError) -> StatusCode {
    match err {
        GridError::Protocol(_) | GridError::Time { .. } => StatusCode::BAD_REQUEST,
        GridError::BoardNotFound(_) | GridError::UnknownScenario(_) => StatusCode::NOT_FOUND,
        GridError::AlreadyActive | GridError::NotActive => StatusCode::CONFLICT,
        GridError::Unauthorized => StatusCode::UNAUTHORIZED,
        GridError::Forbidden => StatusCode::FORBIDDEN,
        GridError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Caller of a JSON route.
pub struct Caller(pub Identity);

impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).map(Caller).map_err(ApiError)
    }
}

/// Caller of a binary device route.
pub struct DeviceCaller(pub Identity);

impl FromRequestParts<Arc<AppState>> for DeviceCaller {
    type Rejection = DeviceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).map(DeviceCaller).map_err(DeviceError)
    }
}

/// JSON error: `{"error": "<message>"}` with a matching status code.
#[derive(Debug)]
pub struct ApiError(pub GridError);

impl From<GridError> for ApiError {
    fn from(err: GridError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_of(&self.0);
        let message = match &self.0 {
            GridError::Internal(detail) => {
                error!(detail, "internal error");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Device error: the ASCII code as a plain-text body.
#[derive(Debug)]
pub struct DeviceError(pub GridError);

impl From<GridError> for DeviceError {
    fn from(err: GridError) -> Self {
        Self(err)
    }
}

impl IntoResponse for DeviceError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GridError::Forbidden => StatusCode::UNAUTHORIZED,
            GridError::Internal(detail) => {
                error!(detail, "internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GridError::AlreadyActive | GridError::NotActive | GridError::UnknownScenario(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            other => status_of(other),
        };
        let mut resp = (status, self.0.device_code()).into_response();
        resp.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=us-ascii"));
        resp
    }
}
