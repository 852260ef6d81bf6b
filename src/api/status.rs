// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Public status endpoints.
//!
//! Unauthenticated liveness probes. These deliberately check nothing
//! beyond the process being up; a failing identity provider or data
//! store must not flap the liveness signal.

use axum::Json;

use crate::models::StatusResponse;

/// Root status endpoint handler.
#[utoipa::path(
    get,
    path = "/",
    tag = "Status",
    responses(
        (status = 200, description = "Service is alive", body = StatusResponse)
    )
)]
pub async fn root_status() -> Json<StatusResponse> {
    Json(StatusResponse::ok())
}

/// Public status endpoint handler.
#[utoipa::path(
    get,
    path = "/api/v1/public/status",
    tag = "Status",
    responses(
        (status = 200, description = "Service is alive", body = StatusResponse)
    )
)]
pub async fn public_status() -> Json<StatusResponse> {
    Json(StatusResponse::ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_endpoints_return_fixed_payload() {
        let Json(root) = root_status().await;
        let Json(public) = public_status().await;
        assert_eq!(root, StatusResponse::ok());
        assert_eq!(public, StatusResponse::ok());
    }
}
