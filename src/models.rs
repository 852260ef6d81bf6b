// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! This module defines the response data structures used by the REST
//! API. All types derive `Serialize`, `Deserialize`, and `ToSchema` for
//! automatic JSON handling and OpenAPI documentation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Fixed liveness payload for the public status endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StatusResponse {
    /// Always `"ok"` while the process is serving.
    pub status: String,
    /// Service identifier.
    pub service: String,
}

impl StatusResponse {
    /// The one payload both public endpoints return.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            service: "relational-shop-gateway".to_string(),
        }
    }
}

/// One shop record with its server-side-decrypted discount code.
///
/// Materialized per query execution; never persisted by this service.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ShopItem {
    /// Product name.
    pub item: String,
    /// Unit price. Non-negative by construction.
    pub price: f64,
    /// Decrypted discount code; absent when the stored column is NULL.
    pub secret_code: Option<String>,
    /// ISO currency code (e.g., "EUR", "USD").
    pub currency: String,
    /// Free-text description, if any.
    pub description: Option<String>,
}

/// Response for `GET /protected/shop-data`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShopDataResponse {
    /// Login name of the verified caller.
    pub user: Option<String>,
    /// Email of the verified caller, if released by the provider.
    pub email: Option<String>,
    /// The decrypted shop records.
    pub data: Vec<ShopItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_response_is_fixed() {
        let status = StatusResponse::ok();
        assert_eq!(status.status, "ok");
        assert_eq!(status.service, "relational-shop-gateway");
    }

    #[test]
    fn shop_item_serializes_with_null_secret() {
        let item = ShopItem {
            item: "Grinder".to_string(),
            price: 49.5,
            secret_code: None,
            currency: "EUR".to_string(),
            description: None,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["item"], "Grinder");
        assert!(json["secret_code"].is_null());
    }

    #[test]
    fn shop_data_response_shape_matches_contract() {
        let response = ShopDataResponse {
            user: Some("alice".to_string()),
            email: Some("alice@example.corp".to_string()),
            data: vec![],
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["user"], "alice");
        assert_eq!(json["email"], "alice@example.corp");
        assert!(json["data"].as_array().unwrap().is_empty());
    }
}
