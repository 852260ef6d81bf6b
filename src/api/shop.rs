// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Protected shop-data endpoint.

use axum::{extract::State, Json};

use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::ShopDataResponse;
use crate::state::AppState;

/// Get shop records with decrypted discount codes.
///
/// Requires a verified bearer token; the records are fetched over the
/// mTLS channel with server-side decryption of the protected column.
#[utoipa::path(
    get,
    path = "/protected/shop-data",
    tag = "Shop",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Shop records for the verified caller", body = ShopDataResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 500, description = "Data store unavailable"),
    )
)]
pub async fn shop_data(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<ShopDataResponse>, ApiError> {
    // Audit by verified subject; never the raw token.
    tracing::info!(subject = %user.user_id, user = user.audit_name(), "shop data access");

    let data = state.shop.fetch_shop_items().await?;

    Ok(Json(ShopDataResponse {
        user: user.username,
        email: user.email,
        data,
    }))
}
