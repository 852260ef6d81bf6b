// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Claims decoded from a verified OIDC access token.
///
/// Keycloak access tokens carry standard OIDC claims plus profile claims
/// (`preferred_username`, `email`). Only the fields the rest of the
/// system consumes are modeled; everything here is typed so a missing
/// claim is an explicit `None`, never silently empty.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifiedClaims {
    /// Subject - the canonical user identifier at the identity provider
    pub sub: String,

    /// Issuer (the identity provider realm URL)
    pub iss: String,

    /// Audience. Either a single string or an array of strings;
    /// membership is validated during verification.
    #[serde(default)]
    pub aud: serde_json::Value,

    /// Expiration timestamp
    pub exp: i64,

    /// Issued at timestamp (optional)
    #[serde(default)]
    pub iat: Option<i64>,

    /// Login name shown to the user
    #[serde(default)]
    pub preferred_username: Option<String>,

    /// Email address, if released by the provider
    #[serde(default)]
    pub email: Option<String>,
}

/// Authenticated user information extracted from a verified token.
///
/// This is the primary type used throughout the application to represent
/// the authenticated caller of a request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Canonical user ID (`sub` claim)
    pub user_id: String,

    /// Login name (`preferred_username` claim)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Email address (`email` claim)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Original issuer (used for audit, not serialized)
    #[serde(skip)]
    pub issuer: String,

    /// Token expiration (Unix timestamp, used for audit, not serialized)
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    /// Create from verified claims.
    pub fn from_claims(claims: VerifiedClaims) -> Self {
        Self {
            user_id: claims.sub,
            username: claims.preferred_username,
            email: claims.email,
            issuer: claims.iss,
            expires_at: claims.exp,
        }
    }

    /// Name to record in the audit log: the login name when present,
    /// otherwise the subject identifier.
    pub fn audit_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.user_id)
    }
}
