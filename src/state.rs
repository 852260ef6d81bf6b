// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::TokenVerifier;
use crate::db::ShopGateway;

/// Shared application state, cloned per request.
///
/// Both components are immutable after startup; the only mutable state
/// in the process is the JWKS cache inside the verifier, which swaps
/// snapshots atomically.
#[derive(Clone)]
pub struct AppState {
    /// Bearer-token verification pipeline.
    pub verifier: Arc<TokenVerifier>,
    /// Protected-data gateway to the backing store.
    pub shop: Arc<ShopGateway>,
}

impl AppState {
    pub fn new(verifier: TokenVerifier, shop: ShopGateway) -> Self {
        Self {
            verifier: Arc::new(verifier),
            shop: Arc::new(shop),
        }
    }
}
