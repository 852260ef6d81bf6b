// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Security
//!
//! - The key set is fetched via HTTPS with the server certificate
//!   verified against a pinned root, never the ambient trust store
//! - Key lookup is strictly by `kid`; there is no try-every-key path
//! - Snapshots are immutable and swapped atomically; a reader never
//!   observes a partially updated key set
//! - An unknown `kid` triggers one rate-limited refresh to pick up
//!   rotated keys without letting bad tokens hammer the provider
//!
//! ## Usage
//!
//! Initialize [`JwksManager`] with the JWKS URL and the pinned root
//! certificate in `main.rs`; the token verifier resolves signing keys
//! through it on every request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{AlgorithmParameters, JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::RwLock;

use super::error::AuthError;

/// Default key-set cache TTL (5 minutes).
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Minimum interval between forced refreshes triggered by unknown kids.
///
/// Bounds how often a flood of forged tokens can make us re-fetch.
const FORCED_REFRESH_BACKOFF: Duration = Duration::from_secs(30);

/// Timeout for a single JWKS fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// One published signing key.
///
/// Holds the raw key material; the usable [`DecodingKey`] is constructed
/// at verification time so malformed material surfaces as its own error.
#[derive(Debug, Clone)]
pub struct SigningKey {
    /// Key identifier, unique within its snapshot.
    pub kid: String,
    /// Signature algorithm declared on the key. Verification always uses
    /// this algorithm, never the one claimed by a token header.
    pub algorithm: Algorithm,
    /// Public key parameters as published.
    params: AlgorithmParameters,
}

impl SigningKey {
    /// Construct a usable public key from the published material.
    pub fn decoding_key(&self) -> Result<DecodingKey, AuthError> {
        match &self.params {
            AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
                .map_err(|e| AuthError::KeyConstruction(e.to_string())),
            AlgorithmParameters::EllipticCurve(ec) => DecodingKey::from_ec_components(&ec.x, &ec.y)
                .map_err(|e| AuthError::KeyConstruction(e.to_string())),
            _ => Err(AuthError::KeyConstruction(
                "unsupported key type in key set".to_string(),
            )),
        }
    }
}

/// An immutable snapshot of the identity provider's signing keys,
/// indexed by key identifier.
#[derive(Debug, Clone, Default)]
pub struct KeySetSnapshot {
    keys: HashMap<String, SigningKey>,
}

impl KeySetSnapshot {
    /// Build a snapshot from a fetched JWKS document.
    ///
    /// Every entry must carry `kid` and `alg`; entries whose algorithm is
    /// not a supported signature algorithm (encryption keys, symmetric
    /// algorithms) are excluded from the snapshot. Duplicate identifiers
    /// make the whole document invalid.
    pub fn from_jwk_set(set: &JwkSet) -> Result<Self, AuthError> {
        let mut keys = HashMap::new();

        for jwk in &set.keys {
            let kid = jwk.common.key_id.as_deref().ok_or_else(|| {
                AuthError::KeySetUnavailable("key set entry is missing 'kid'".to_string())
            })?;
            let alg = jwk.common.key_algorithm.ok_or_else(|| {
                AuthError::KeySetUnavailable(format!("key {kid} is missing 'alg'"))
            })?;

            let Some(algorithm) = signature_algorithm(alg) else {
                // Typical for providers that also publish encryption keys.
                tracing::debug!(kid, alg = ?alg, "skipping non-signature key in key set");
                continue;
            };

            let key = SigningKey {
                kid: kid.to_string(),
                algorithm,
                params: jwk.algorithm.clone(),
            };
            if keys.insert(key.kid.clone(), key).is_some() {
                return Err(AuthError::KeySetUnavailable(format!(
                    "duplicate key identifier {kid} in key set"
                )));
            }
        }

        Ok(KeySetSnapshot { keys })
    }

    /// Look up a signing key by identifier.
    pub fn get(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.get(kid)
    }

    /// Number of usable signing keys in the snapshot.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the snapshot contains no usable signing keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Map a JWKS `alg` value to a supported asymmetric signature algorithm.
///
/// Symmetric algorithms are deliberately absent: accepting an HMAC key
/// from a public key set would reopen the key-confusion attack class.
fn signature_algorithm(alg: KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        _ => None,
    }
}

/// Cached key-set snapshot.
struct CacheEntry {
    snapshot: Arc<KeySetSnapshot>,
    fetched_at: Instant,
}

/// JWKS manager with caching.
///
/// Fetches and caches the identity provider's key set for token
/// verification.
#[derive(Clone)]
pub struct JwksManager {
    /// JWKS endpoint URL
    jwks_url: String,
    /// Cache TTL
    cache_ttl: Duration,
    /// Cached snapshot
    cache: Arc<RwLock<Option<CacheEntry>>>,
    /// HTTP client pinned to the identity provider's root certificate
    client: reqwest::Client,
}

impl JwksManager {
    /// Create a new JWKS manager.
    ///
    /// # Arguments
    /// - `jwks_url`: the JWKS endpoint URL
    /// - `root_cert_pem`: PEM-encoded root certificate the endpoint's
    ///   server certificate must chain to; the ambient trust store is
    ///   not consulted
    pub fn new(jwks_url: impl Into<String>, root_cert_pem: &[u8]) -> Result<Self, reqwest::Error> {
        let root = reqwest::Certificate::from_pem(root_cert_pem)?;
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .tls_built_in_root_certs(false)
            .add_root_certificate(root)
            .timeout(FETCH_TIMEOUT)
            .build()?;

        Ok(Self {
            jwks_url: jwks_url.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
            cache: Arc::new(RwLock::new(None)),
            client,
        })
    }

    /// Create with custom cache TTL.
    #[allow(dead_code)]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Get the JWKS URL.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Get the current key-set snapshot, fetching if the cache is cold
    /// or expired.
    pub async fn snapshot(&self) -> Result<Arc<KeySetSnapshot>, AuthError> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = &*cache {
                if entry.fetched_at.elapsed() < self.cache_ttl {
                    return Ok(Arc::clone(&entry.snapshot));
                }
            }
        }

        self.fetch_and_store().await
    }

    /// Resolve a signing key by identifier.
    ///
    /// On a miss the manager refreshes the key set once (rate-limited by
    /// [`FORCED_REFRESH_BACKOFF`]) to pick up rotated keys, then fails
    /// with [`AuthError::UnknownSigningKey`] if the identifier is still
    /// absent.
    pub async fn signing_key(&self, kid: &str) -> Result<SigningKey, AuthError> {
        let snapshot = self.snapshot().await?;
        if let Some(key) = snapshot.get(kid) {
            return Ok(key.clone());
        }

        let snapshot = self.refresh_for_rotation(snapshot).await;
        snapshot.get(kid).cloned().ok_or(AuthError::UnknownSigningKey)
    }

    /// Prefetch the key set so the first request does not pay the fetch.
    ///
    /// Failures are returned for logging but are not fatal: the cache
    /// fills on first use once the provider is reachable.
    pub async fn warm(&self) -> Result<(), AuthError> {
        self.fetch_and_store().await.map(|_| ())
    }

    /// Refresh after an unknown-kid miss, unless a fetch happened
    /// recently enough that another one cannot have new information.
    async fn refresh_for_rotation(&self, current: Arc<KeySetSnapshot>) -> Arc<KeySetSnapshot> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = &*cache {
                if entry.fetched_at.elapsed() < FORCED_REFRESH_BACKOFF {
                    return current;
                }
            }
        }

        match self.fetch_and_store().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "key set refresh after unknown kid failed, keeping cached snapshot"
                );
                current
            }
        }
    }

    /// Fetch a fresh key set and atomically replace the cached snapshot.
    async fn fetch_and_store(&self) -> Result<Arc<KeySetSnapshot>, AuthError> {
        let snapshot = Arc::new(self.fetch_key_set().await?);

        let mut cache = self.cache.write().await;
        *cache = Some(CacheEntry {
            snapshot: Arc::clone(&snapshot),
            fetched_at: Instant::now(),
        });

        Ok(snapshot)
    }

    /// Fetch and parse the key set from the endpoint.
    async fn fetch_key_set(&self) -> Result<KeySetSnapshot, AuthError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::KeySetUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::KeySetUnavailable(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        let set: JwkSet = response
            .json()
            .await
            .map_err(|e| AuthError::KeySetUnavailable(e.to_string()))?;

        let snapshot = KeySetSnapshot::from_jwk_set(&set)?;
        tracing::debug!(keys = snapshot.len(), "fetched key set");
        Ok(snapshot)
    }

    /// Check if a fresh snapshot is currently cached.
    #[allow(dead_code)]
    pub async fn is_cached(&self) -> bool {
        let cache = self.cache.read().await;
        match &*cache {
            Some(entry) => entry.fetched_at.elapsed() < self.cache_ttl,
            None => false,
        }
    }

    /// Insert a snapshot directly, backdated by `age`.
    #[cfg(test)]
    pub(crate) async fn prime_with_age(&self, snapshot: KeySetSnapshot, age: Duration) {
        let fetched_at = Instant::now().checked_sub(age).unwrap_or_else(Instant::now);
        let mut cache = self.cache.write().await;
        *cache = Some(CacheEntry {
            snapshot: Arc::new(snapshot),
            fetched_at,
        });
    }
}
