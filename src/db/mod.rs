// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Protected Data Module
//!
//! This module retrieves shop records from Postgres over a mutually
//! authenticated TLS channel. The discount-code column is stored
//! encrypted at rest and decrypted server-side (`pgp_sym_decrypt`) with
//! a key this service supplies as a bound query parameter.
//!
//! ## Security Model
//!
//! - The server certificate must chain to the configured root CA; the
//!   ambient trust store is never consulted
//! - A client certificate/key pair is always presented; there is no
//!   fallback to unauthenticated transport
//! - The decryption key travels only as a bound parameter and is never
//!   interpolated into SQL, logged, or echoed in errors
//! - Each call owns one connection and releases it unconditionally

use thiserror::Error;

pub mod channel;
pub mod gateway;

#[cfg(test)]
pub(crate) mod testutil;

pub use channel::SecureChannel;
pub use gateway::ShopGateway;

/// Errors from the secure channel and the protected query.
///
/// All variants surface to HTTP clients as a generic server error; the
/// variant and message are logged server-side only.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A TLS credential file is missing or not valid PEM.
    #[error("TLS credential error: {0}")]
    CredentialLoad(String),

    /// The mTLS connection could not be established.
    #[error("database connection failed: {0}")]
    Connection(String),

    /// The protected query failed, including server-side decryption
    /// failures surfaced by Postgres.
    #[error("protected query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// A result row could not be mapped to the expected shape.
    #[error("row mapping failed: {0}")]
    DataMapping(String),
}
