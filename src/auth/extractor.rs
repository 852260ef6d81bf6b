// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```
//!
//! A missing or malformed `Authorization` header is rejected before any
//! verification work, as a distinct client error.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{AuthError, AuthenticatedUser};
use crate::state::AppState;

/// Extractor for authenticated users.
///
/// Validates the bearer token from the `Authorization` header through
/// the verification pipeline and provides the authenticated user.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // First check if middleware already set the user
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        // Extract Authorization header
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        // Extract Bearer token
        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        // Run the verification pipeline
        let user = state.verifier.verify(token).await?;

        Ok(Auth(user))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::Request;

    use super::super::testutil::{self, TEST_AUDIENCE, TEST_ISSUER};
    use super::super::{JwksManager, TokenVerifier};
    use super::*;
    use crate::state::AppState;

    async fn test_state() -> AppState {
        let manager = JwksManager::new("https://127.0.0.1:1/certs", testutil::TEST_CA_PEM.as_bytes())
            .expect("pinned client builds");
        manager.prime_with_age(testutil::snapshot(), Duration::ZERO).await;
        let verifier = TokenVerifier::new(manager, TEST_ISSUER, TEST_AUDIENCE);
        AppState {
            verifier: Arc::new(verifier),
            shop: Arc::new(crate::db::ShopGateway::disconnected_for_tests()),
        }
    }

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/protected/shop-data");
        if let Some(value) = value {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn missing_header_is_a_client_error() {
        let state = test_state().await;
        let mut parts = parts_with_auth(None);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn non_bearer_header_is_a_client_error() {
        let state = test_state().await;
        let mut parts = parts_with_auth(Some("Basic dXNlcjpwYXNz"));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn valid_bearer_token_authenticates() {
        let state = test_state().await;
        let token = testutil::sign_with_current(&testutil::valid_claims("alice"));
        let mut parts = parts_with_auth(Some(&format!("Bearer {token}")));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        let Auth(user) = result.expect("valid token authenticates");
        assert_eq!(user.user_id, "alice");
    }

    #[tokio::test]
    async fn invalid_token_is_a_verification_error() {
        let state = test_state().await;
        let mut parts = parts_with_auth(Some("Bearer not-a-jwt"));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MalformedToken)));
    }

    #[tokio::test]
    async fn extractor_prefers_extensions() {
        let state = test_state().await;
        let mut parts = parts_with_auth(None);

        let user = AuthenticatedUser {
            user_id: "user_from_middleware".to_string(),
            username: Some("mw".to_string()),
            email: None,
            issuer: "middleware".to_string(),
            expires_at: 0,
        };
        parts.extensions.insert(user.clone());

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(result.is_ok());
        assert_eq!(result.unwrap().0.user_id, "user_from_middleware");
    }
}
