// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Protected shop-data retrieval.
//!
//! One call = one mTLS connection, one parameterized query, one
//! unconditional close. Postgres decrypts the protected column with the
//! key bound as `$1`; the key never appears in SQL text, logs, or error
//! messages.

use std::time::Duration;

use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{ConnectOptions, Connection, Row};

use super::channel::SecureChannel;
use super::GatewayError;
use crate::config::Secret;
use crate::models::ShopItem;

/// The one query this gateway executes.
///
/// The decryption key is bound as `$1`; the statement text is a constant
/// and is never assembled from caller input.
const SHOP_DATA_QUERY: &str = "\
SELECT \
    name, \
    price::float8 AS price, \
    pgp_sym_decrypt(encrypted_discount_code, $1) AS discount_code, \
    currency, \
    description \
FROM products";

/// Connection attempts before surfacing a connection failure.
const CONNECT_ATTEMPTS: u32 = 3;
/// Timeout for a single connection attempt.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Backoff before the second attempt; doubles per attempt.
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
/// Overall bound on one gateway call, retries included.
const CALL_TIMEOUT: Duration = Duration::from_secs(15);

/// Fetches shop records with server-side decryption of the protected
/// discount-code column.
pub struct ShopGateway {
    channel: SecureChannel,
    decryption_key: Secret,
}

impl ShopGateway {
    /// Create a gateway over the given channel with the given key.
    pub fn new(channel: SecureChannel, decryption_key: Secret) -> Self {
        Self {
            channel,
            decryption_key,
        }
    }

    /// Fetch all shop items, decrypting the protected column.
    ///
    /// Opens one connection, runs the query, and closes the connection on
    /// both success and failure. The whole call is bounded by
    /// [`CALL_TIMEOUT`].
    pub async fn fetch_shop_items(&self) -> Result<Vec<ShopItem>, GatewayError> {
        match tokio::time::timeout(CALL_TIMEOUT, self.fetch_inner()).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Connection(
                "shop data call timed out".to_string(),
            )),
        }
    }

    async fn fetch_inner(&self) -> Result<Vec<ShopItem>, GatewayError> {
        let mut conn = self.connect_with_retry().await?;

        let result = sqlx::query(SHOP_DATA_QUERY)
            .bind(self.decryption_key.expose())
            .fetch_all(&mut conn)
            .await;

        // Release the connection before surfacing either outcome.
        if let Err(err) = conn.close().await {
            tracing::debug!(error = %err, "closing database connection failed");
        }

        let rows = result.map_err(GatewayError::Query)?;
        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(item_from_row(row)?);
        }

        tracing::debug!(rows = items.len(), "fetched shop items");
        Ok(items)
    }

    /// Connect with bounded retries and exponential backoff.
    ///
    /// Credential-load failures are not retried; they cannot heal between
    /// attempts. Connection failures and per-attempt timeouts are.
    async fn connect_with_retry(&self) -> Result<PgConnection, GatewayError> {
        let mut backoff = INITIAL_BACKOFF;
        let mut last_error = String::new();

        for attempt in 1..=CONNECT_ATTEMPTS {
            // Credentials are loaded per attempt and dropped with the options.
            let options = self.channel.connect_options()?;

            match tokio::time::timeout(CONNECT_TIMEOUT, options.connect()).await {
                Ok(Ok(conn)) => {
                    if attempt > 1 {
                        tracing::debug!(attempt, "database connection succeeded after retry");
                    }
                    return Ok(conn);
                }
                Ok(Err(err)) => {
                    tracing::warn!(attempt, error = %err, "database connection failed");
                    last_error = err.to_string();
                }
                Err(_) => {
                    tracing::warn!(attempt, "database connection attempt timed out");
                    last_error = "connection attempt timed out".to_string();
                }
            }

            if attempt < CONNECT_ATTEMPTS {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }

        Err(GatewayError::Connection(format!(
            "{last_error} (after {CONNECT_ATTEMPTS} attempts)"
        )))
    }

    /// Gateway whose channel points at nonexistent credentials and a
    /// closed port; every fetch fails fast.
    #[cfg(test)]
    pub(crate) fn disconnected_for_tests() -> Self {
        use std::path::Path;

        use crate::db::testutil::settings_with;

        let settings = settings_with(
            Path::new("/nonexistent/ca.crt"),
            Path::new("/nonexistent/client.crt"),
            Path::new("/nonexistent/client.key"),
            true,
        );
        Self::new(SecureChannel::new(settings), Secret::new("test-key"))
    }
}

/// Map one result row to a [`ShopItem`].
fn item_from_row(row: &PgRow) -> Result<ShopItem, GatewayError> {
    let name: String = get_column(row, "name")?;
    let price: f64 = get_column(row, "price")?;
    let secret_code: Option<String> = get_column(row, "discount_code")?;
    let currency: String = get_column(row, "currency")?;
    let description: Option<String> = get_column(row, "description")?;

    build_item(name, price, secret_code, currency, description)
}

fn get_column<'r, T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>>(
    row: &'r PgRow,
    column: &str,
) -> Result<T, GatewayError> {
    row.try_get(column)
        .map_err(|e| GatewayError::DataMapping(format!("column {column}: {e}")))
}

/// Assemble and validate one item.
///
/// Prices come from an untrusted network peer like everything else;
/// negative or non-finite values are rejected rather than served.
fn build_item(
    name: String,
    price: f64,
    secret_code: Option<String>,
    currency: String,
    description: Option<String>,
) -> Result<ShopItem, GatewayError> {
    if !price.is_finite() || price < 0.0 {
        return Err(GatewayError::DataMapping(format!(
            "invalid price {price} for item {name}"
        )));
    }

    Ok(ShopItem {
        item: name,
        price,
        secret_code,
        currency,
        description,
    })
}
