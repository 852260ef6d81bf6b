// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Every step of the verification pipeline short-circuits to exactly one
//! of these variants. Verification failures surface to the client as a
//! generic 401 body; the specific variant is logged server-side only.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type.
///
/// `MissingAuthHeader` and `InvalidAuthHeader` are client errors raised
/// before verification starts; the remaining variants map one-to-one to
/// the pipeline steps that can fail.
#[derive(Debug)]
pub enum AuthError {
    /// No authorization header present
    MissingAuthHeader,
    /// Invalid authorization header format
    InvalidAuthHeader,
    /// Token structure or header cannot be decoded
    MalformedToken,
    /// The identity provider's key set could not be fetched or parsed
    KeySetUnavailable(String),
    /// The token's key identifier matches no key in the current key set
    UnknownSigningKey,
    /// The matched key's material could not be turned into a usable key
    KeyConstruction(String),
    /// Signature verification failed (includes algorithm mismatch)
    InvalidSignature,
    /// Token has expired
    TokenExpired,
    /// Issuer or audience does not match the configured expectation
    ClaimMismatch(&'static str),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::KeySetUnavailable(_) => "key_set_unavailable",
            AuthError::UnknownSigningKey => "unknown_signing_key",
            AuthError::KeyConstruction(_) => "key_construction_error",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::ClaimMismatch(_) => "claim_mismatch",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::MalformedToken
            | AuthError::UnknownSigningKey
            | AuthError::InvalidSignature
            | AuthError::TokenExpired
            | AuthError::ClaimMismatch(_) => StatusCode::UNAUTHORIZED,
            AuthError::KeySetUnavailable(_) | AuthError::KeyConstruction(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Generic client-facing message.
    ///
    /// Internal detail (which key matched, which claim failed) stays in
    /// the server-side log.
    fn public_message(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "Authorization header is required",
            AuthError::InvalidAuthHeader => {
                "Invalid authorization header format (expected 'Bearer <token>')"
            }
            AuthError::KeySetUnavailable(_) | AuthError::KeyConstruction(_) => {
                "Authentication is temporarily unavailable"
            }
            _ => "Token verification failed",
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingAuthHeader => write!(f, "Authorization header is required"),
            AuthError::InvalidAuthHeader => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::MalformedToken => write!(f, "Token is malformed"),
            AuthError::KeySetUnavailable(msg) => write!(f, "Failed to fetch key set: {msg}"),
            AuthError::UnknownSigningKey => write!(f, "No matching key found in key set"),
            AuthError::KeyConstruction(msg) => write!(f, "Failed to construct public key: {msg}"),
            AuthError::InvalidSignature => write!(f, "Token signature is invalid"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::ClaimMismatch(claim) => write!(f, "Token {claim} claim is invalid"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // Full detail to the log, generic message to the client.
        tracing::warn!(error = %self, error_code = self.error_code(), "authentication failed");
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.public_message().to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
