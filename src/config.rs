// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and the [`AppConfig`]
//! struct built from them once at startup. Components receive their
//! configuration by value or reference; nothing reads the process
//! environment after startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `OIDC_ISSUER` | Expected JWT issuer (identity provider realm URL) | Required |
//! | `OIDC_AUDIENCE` | Expected JWT audience claim | Required |
//! | `OIDC_JWKS_URL` | JWKS endpoint | `<issuer>/protocol/openid-connect/certs` |
//! | `IDP_ROOT_CERT` | Path to the pinned identity-provider root certificate | Required |
//! | `DB_HOST` | Postgres host | Required |
//! | `DB_PORT` | Postgres port | `5432` |
//! | `DB_USER` | Postgres user | Required |
//! | `DB_PASSWORD` | Postgres password | Optional (cert-only auth) |
//! | `DB_NAME` | Postgres database name | Required |
//! | `DB_ROOT_CERT` | Path to the Postgres root CA certificate | Required |
//! | `DB_CLIENT_CERT` | Path to the client certificate (mTLS) | Required |
//! | `DB_CLIENT_KEY` | Path to the client private key (mTLS) | Required |
//! | `DB_TLS_VERIFY_HOSTNAME` | Verify the server hostname against its certificate | `true` |
//! | `SHOP_DB_SECRET` | Symmetric key for server-side column decryption | Required |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! ## Security
//!
//! - `SHOP_DB_SECRET` has no fallback: if it is absent the service refuses
//!   to start rather than serving protected data with a built-in key.
//! - `DB_TLS_VERIFY_HOSTNAME=false` is an explicit trust decision for
//!   deployments where the server identity is pinned by an internal
//!   DNS/CN convention; the CA check is never relaxed.

use std::env;
use std::path::PathBuf;

use thiserror::Error;
use url::Url;

/// Environment variable name for the server bind address.
pub const HOST_ENV: &str = "HOST";
/// Environment variable name for the server bind port.
pub const PORT_ENV: &str = "PORT";
/// Environment variable name for the expected token issuer.
pub const OIDC_ISSUER_ENV: &str = "OIDC_ISSUER";
/// Environment variable name for the expected token audience.
pub const OIDC_AUDIENCE_ENV: &str = "OIDC_AUDIENCE";
/// Environment variable name for the JWKS endpoint override.
pub const OIDC_JWKS_URL_ENV: &str = "OIDC_JWKS_URL";
/// Environment variable name for the pinned identity-provider root certificate.
pub const IDP_ROOT_CERT_ENV: &str = "IDP_ROOT_CERT";
/// Environment variable name for the Postgres host.
pub const DB_HOST_ENV: &str = "DB_HOST";
/// Environment variable name for the Postgres port.
pub const DB_PORT_ENV: &str = "DB_PORT";
/// Environment variable name for the Postgres user.
pub const DB_USER_ENV: &str = "DB_USER";
/// Environment variable name for the Postgres password.
pub const DB_PASSWORD_ENV: &str = "DB_PASSWORD";
/// Environment variable name for the Postgres database name.
pub const DB_NAME_ENV: &str = "DB_NAME";
/// Environment variable name for the Postgres root CA certificate path.
pub const DB_ROOT_CERT_ENV: &str = "DB_ROOT_CERT";
/// Environment variable name for the mTLS client certificate path.
pub const DB_CLIENT_CERT_ENV: &str = "DB_CLIENT_CERT";
/// Environment variable name for the mTLS client private key path.
pub const DB_CLIENT_KEY_ENV: &str = "DB_CLIENT_KEY";
/// Environment variable name for the hostname-verification flag.
pub const DB_TLS_VERIFY_HOSTNAME_ENV: &str = "DB_TLS_VERIFY_HOSTNAME";
/// Environment variable name for the column decryption key.
pub const SHOP_DB_SECRET_ENV: &str = "SHOP_DB_SECRET";

/// JWKS path appended to the issuer URL when `OIDC_JWKS_URL` is not set.
///
/// Matches the Keycloak realm layout (`<realm>/protocol/openid-connect/certs`).
const DEFAULT_JWKS_PATH: &str = "protocol/openid-connect/certs";

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    /// An environment variable is set but cannot be parsed.
    #[error("invalid value for {var}: {reason}")]
    Invalid {
        /// The offending variable name.
        var: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// A secret configuration value.
///
/// Wraps the raw string so the secret can never leak through `Debug`
/// formatting or accidental logging of the surrounding config.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    /// Wrap a raw secret string.
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    /// Access the raw secret. Callers must not log or echo the value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print secret material
        f.write_str("Secret(***)")
    }
}

/// Token-verification settings.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Expected `iss` claim (exact match).
    pub issuer: String,
    /// Expected `aud` claim.
    pub audience: String,
    /// JWKS endpoint URL.
    pub jwks_url: String,
    /// Pinned root certificate for the JWKS fetch.
    pub idp_root_cert: PathBuf,
}

/// Backing-store connection settings.
#[derive(Debug, Clone)]
pub struct DbSettings {
    /// Postgres host.
    pub host: String,
    /// Postgres port.
    pub port: u16,
    /// Postgres user.
    pub user: String,
    /// Postgres password (optional when client-cert auth suffices).
    pub password: Option<Secret>,
    /// Database name.
    pub database: String,
    /// Root CA the server certificate must chain to.
    pub root_cert: PathBuf,
    /// Client certificate presented for mutual TLS.
    pub client_cert: PathBuf,
    /// Client private key for mutual TLS.
    pub client_key: PathBuf,
    /// Whether to verify the server hostname against its certificate.
    ///
    /// `false` relaxes only the hostname check (CA validation always
    /// applies) and is intended for internal deployments with a pinned
    /// DNS/CN naming convention.
    pub verify_hostname: bool,
}

/// Application configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server bind address.
    pub host: String,
    /// Server bind port.
    pub port: u16,
    /// Token-verification settings.
    pub auth: AuthSettings,
    /// Backing-store settings.
    pub db: DbSettings,
    /// Symmetric key for server-side column decryption.
    pub decryption_key: Secret,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an injectable lookup function.
    ///
    /// Tests pass a map-backed closure instead of touching the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let issuer = require(&lookup, OIDC_ISSUER_ENV)?;
        let issuer_url: Url = issuer.parse().map_err(|e| ConfigError::Invalid {
            var: OIDC_ISSUER_ENV,
            reason: format!("not a valid URL: {e}"),
        })?;

        let jwks_url = match lookup(OIDC_JWKS_URL_ENV) {
            Some(url) => url,
            None => derive_jwks_url(&issuer_url),
        };

        let auth = AuthSettings {
            issuer,
            audience: require(&lookup, OIDC_AUDIENCE_ENV)?,
            jwks_url,
            idp_root_cert: require(&lookup, IDP_ROOT_CERT_ENV)?.into(),
        };

        let db = DbSettings {
            host: require(&lookup, DB_HOST_ENV)?,
            port: parse_port(&lookup, DB_PORT_ENV, 5432)?,
            user: require(&lookup, DB_USER_ENV)?,
            password: lookup(DB_PASSWORD_ENV).map(Secret::new),
            database: require(&lookup, DB_NAME_ENV)?,
            root_cert: require(&lookup, DB_ROOT_CERT_ENV)?.into(),
            client_cert: require(&lookup, DB_CLIENT_CERT_ENV)?.into(),
            client_key: require(&lookup, DB_CLIENT_KEY_ENV)?.into(),
            verify_hostname: parse_bool(&lookup, DB_TLS_VERIFY_HOSTNAME_ENV, true)?,
        };

        // No fallback key: absent secret means the service must not start.
        let decryption_key = require(&lookup, SHOP_DB_SECRET_ENV).map(Secret::new)?;

        Ok(AppConfig {
            host: lookup(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_port(&lookup, PORT_ENV, 8080)?,
            auth,
            db,
            decryption_key,
        })
    }
}

/// Derive the JWKS endpoint from the issuer URL (Keycloak realm layout).
fn derive_jwks_url(issuer: &Url) -> String {
    let base = issuer.as_str().trim_end_matches('/');
    format!("{base}/{DEFAULT_JWKS_PATH}")
}

fn require(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<String, ConfigError> {
    match lookup(var) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(var)),
    }
}

fn parse_port(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u16,
) -> Result<u16, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e| ConfigError::Invalid {
            var,
            reason: format!("not a valid port: {e}"),
        }),
    }
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match lookup(var).as_deref() {
        None => Ok(default),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            var,
            reason: format!("expected true/false, got {other:?}"),
        }),
    }
}
