// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::db::GatewayError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        // Transport and data errors carry internal detail (paths, SQL
        // state); log it and hand the client a generic body.
        tracing::error!(error = %err, "protected data retrieval failed");
        ApiError::internal("Internal data store error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_message() {
        let internal = ApiError::internal("boom");
        assert_eq!(internal.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.message, "boom");

        let teapot = ApiError::new(StatusCode::IM_A_TEAPOT, "short and stout");
        assert_eq!(teapot.status, StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::internal("bad data").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data"}"#);
    }

    #[tokio::test]
    async fn gateway_errors_surface_without_detail() {
        let err = GatewayError::CredentialLoad("/etc/secrets/client.key unreadable".to_string());
        let api_err: ApiError = err.into();
        assert_eq!(api_err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api_err.message.contains("client.key"));
    }
}
