// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::models::{ShopDataResponse, ShopItem, StatusResponse};
use crate::state::AppState;

pub mod shop;
pub mod status;

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/", get(status::root_status))
        .route("/api/v1/public/status", get(status::public_status))
        .route("/protected/shop-data", get(shop::shop_data))
        .with_state(state);

    routes
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        status::root_status,
        status::public_status,
        shop::shop_data
    ),
    components(
        schemas(
            StatusResponse,
            ShopItem,
            ShopDataResponse
        )
    ),
    tags(
        (name = "Status", description = "Public liveness endpoints"),
        (name = "Shop", description = "Token-protected shop data")
    )
)]
struct ApiDoc;
