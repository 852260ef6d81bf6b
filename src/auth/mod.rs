// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! This module verifies OIDC bearer tokens for the shop gateway API.
//!
//! ## Auth Flow
//!
//! 1. Frontend authenticates the user at the identity provider
//! 2. Frontend sends `Authorization: Bearer <JWT>`
//! 3. Gateway:
//!    - Resolves the token's `kid` against the cached JWKS snapshot
//!      (fetched over a pinned-root HTTPS connection)
//!    - Verifies the signature with the matched key's declared algorithm
//!    - Validates issuer, audience and expiry
//!    - Extracts `sub`, `preferred_username` and `email` as typed claims
//!
//! ## Security
//!
//! - JWKS fetching trusts only the pinned identity-provider root
//! - Key lookup is strictly by `kid`; the token header's algorithm is
//!   never used for verification
//! - Any pipeline failure yields exactly one typed error and a generic
//!   client response; detail stays in the server-side log
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testutil;

pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::Auth;
pub use jwks::JwksManager;
pub use verifier::TokenVerifier;
