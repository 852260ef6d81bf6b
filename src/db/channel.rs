// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Mutual-TLS channel configuration for the backing store.
//!
//! [`SecureChannel`] turns the configured credential paths into sqlx
//! connect options. Credentials are read per connection attempt and
//! dropped with the options; nothing holds key material longer than the
//! attempt that uses it.
//!
//! ## Policy
//!
//! - The server certificate is always validated against the configured
//!   root CA ([`PgSslMode::VerifyCa`] at minimum)
//! - Hostname verification ([`PgSslMode::VerifyFull`]) is the default;
//!   relaxing it to `VerifyCa` requires the explicit
//!   `DB_TLS_VERIFY_HOSTNAME=false` flag and is meant for internal
//!   deployments whose server identity is pinned by CN convention
//! - Missing or malformed credential files fail the channel closed

use std::fs;
use std::path::Path;

use sqlx::postgres::{PgConnectOptions, PgSslMode};

use super::GatewayError;
use crate::config::DbSettings;

/// Factory for mutually-authenticated connections to the backing store.
#[derive(Debug, Clone)]
pub struct SecureChannel {
    settings: DbSettings,
}

impl SecureChannel {
    /// Create a channel factory from validated settings.
    pub fn new(settings: DbSettings) -> Self {
        Self { settings }
    }

    /// Build connect options for one connection attempt.
    ///
    /// Reads and validates all three credential files; any missing or
    /// malformed file fails with [`GatewayError::CredentialLoad`] before
    /// a connection is attempted.
    pub fn connect_options(&self) -> Result<PgConnectOptions, GatewayError> {
        let root_cert = read_pem(&self.settings.root_cert, "CERTIFICATE")?;
        let client_cert = read_pem(&self.settings.client_cert, "CERTIFICATE")?;
        let client_key = read_pem(&self.settings.client_key, "PRIVATE KEY")?;

        let mut options = PgConnectOptions::new()
            .host(&self.settings.host)
            .port(self.settings.port)
            .username(&self.settings.user)
            .database(&self.settings.database)
            .ssl_mode(ssl_mode_for(self.settings.verify_hostname))
            .ssl_root_cert_from_pem(root_cert)
            .ssl_client_cert_from_pem(&client_cert)
            .ssl_client_key_from_pem(&client_key);

        if let Some(password) = &self.settings.password {
            options = options.password(password.expose());
        }

        Ok(options)
    }
}

/// TLS verification level for the configured hostname policy.
///
/// The CA check applies in both modes; only the hostname match is
/// relaxed when the flag is off.
fn ssl_mode_for(verify_hostname: bool) -> PgSslMode {
    if verify_hostname {
        PgSslMode::VerifyFull
    } else {
        PgSslMode::VerifyCa
    }
}

/// Read a credential file and check it looks like the expected PEM kind.
fn read_pem(path: &Path, expected_marker: &str) -> Result<Vec<u8>, GatewayError> {
    let bytes = fs::read(path).map_err(|e| {
        GatewayError::CredentialLoad(format!("failed to read {}: {e}", path.display()))
    })?;

    let text = std::str::from_utf8(&bytes).map_err(|_| {
        GatewayError::CredentialLoad(format!("{} is not valid PEM", path.display()))
    })?;
    if !text.contains("-----BEGIN") || !text.contains(expected_marker) {
        return Err(GatewayError::CredentialLoad(format!(
            "{} does not contain a PEM {}",
            path.display(),
            expected_marker.to_lowercase()
        )));
    }

    Ok(bytes)
}
