// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer-token verification.
//!
//! [`TokenVerifier::verify`] runs the full pipeline for one token:
//!
//! 1. Decode the unverified header (structure check)
//! 2. Read the claimed key identifier from it
//! 3. Obtain the current key-set snapshot
//! 4. Look up the claimed identifier - strictly by `kid`
//! 5. Construct a usable public key from the matched material
//! 6. Verify the signature with the algorithm declared on the *matched
//!    key*; the algorithm claimed by the token header is never trusted
//! 7. Validate issuer (exact), audience (membership) and expiry
//! 8. Return the typed claims
//!
//! Each step short-circuits to exactly one [`AuthError`]; there is no
//! degraded-trust path.

use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Validation};

use super::claims::{AuthenticatedUser, VerifiedClaims};
use super::error::AuthError;
use super::jwks::JwksManager;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Verifies bearer tokens against the identity provider's key set.
#[derive(Clone)]
pub struct TokenVerifier {
    jwks: JwksManager,
    issuer: String,
    audience: String,
}

impl TokenVerifier {
    /// Create a verifier bound to one issuer and audience.
    pub fn new(jwks: JwksManager, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            jwks,
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }

    /// The JWKS manager backing this verifier.
    pub fn jwks(&self) -> &JwksManager {
        &self.jwks
    }

    /// Verify a raw bearer token and return the authenticated user.
    pub async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        // Steps 1-2: unverified header, claimed kid. The header's `alg`
        // is deliberately ignored from here on.
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
        let kid = header.kid.as_deref().ok_or(AuthError::MalformedToken)?;

        // Steps 3-4: snapshot fetch + lookup (with rotation refresh).
        let key = self.jwks.signing_key(kid).await?;

        // Step 5: usable public key from the published material.
        let decoding_key = key.decoding_key()?;

        // Steps 6-7: signature with the key's declared algorithm, then
        // issuer/audience/expiry.
        let mut validation = Validation::new(key.algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.leeway = CLOCK_SKEW_LEEWAY;

        let token_data =
            decode::<VerifiedClaims>(token, &decoding_key, &validation).map_err(classify)?;

        // Step 8: typed claims out.
        Ok(AuthenticatedUser::from_claims(token_data.claims))
    }
}

/// Map jsonwebtoken failures onto the pipeline's error taxonomy.
fn classify(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        // InvalidAlgorithm means the header claimed something other than
        // the matched key's algorithm - rejected as a bad signature.
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthError::InvalidSignature,
        ErrorKind::InvalidIssuer => AuthError::ClaimMismatch("iss"),
        ErrorKind::InvalidAudience => AuthError::ClaimMismatch("aud"),
        ErrorKind::ImmatureSignature => AuthError::ClaimMismatch("nbf"),
        ErrorKind::MissingRequiredClaim(claim) => match claim.as_str() {
            "iss" => AuthError::ClaimMismatch("iss"),
            "aud" => AuthError::ClaimMismatch("aud"),
            "exp" => AuthError::ClaimMismatch("exp"),
            _ => AuthError::MalformedToken,
        },
        _ => AuthError::MalformedToken,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use super::super::testutil::{self, TEST_AUDIENCE, TEST_ISSUER};
    use super::*;

    /// Verifier with a primed cache; the endpoint refuses connections so
    /// any attempted fetch in these tests would fail loudly.
    async fn primed_verifier() -> TokenVerifier {
        let manager = JwksManager::new("https://127.0.0.1:1/certs", testutil::TEST_CA_PEM.as_bytes())
            .expect("pinned client builds");
        manager.prime_with_age(testutil::snapshot(), Duration::ZERO).await;
        TokenVerifier::new(manager, TEST_ISSUER, TEST_AUDIENCE)
    }

    #[tokio::test]
    async fn round_trip_valid_token() {
        let verifier = primed_verifier().await;
        let token = testutil::sign_with_current(&testutil::valid_claims("alice"));

        let user = verifier.verify(&token).await.expect("valid token verifies");
        assert_eq!(user.user_id, "alice");
        assert_eq!(user.username.as_deref(), Some("alice"));
        assert_eq!(user.email.as_deref(), Some("alice@example.corp"));
        assert_eq!(user.issuer, TEST_ISSUER);
    }

    #[tokio::test]
    async fn garbage_token_is_malformed() {
        let verifier = primed_verifier().await;
        for token in ["", "not-a-jwt", "a.b", "a.b.c.d"] {
            let result = verifier.verify(token).await;
            assert!(
                matches!(result, Err(AuthError::MalformedToken)),
                "expected MalformedToken for {token:?}, got {result:?}"
            );
        }
    }

    #[tokio::test]
    async fn token_without_kid_is_malformed() {
        // A header without a key identifier cannot select a key; there
        // is no try-every-key fallback.
        let verifier = primed_verifier().await;
        let token = testutil::craft_raw_token(
            &json!({"alg": "ES256", "typ": "JWT"}),
            &testutil::valid_claims("alice"),
        );
        let result = verifier.verify(&token).await;
        assert!(matches!(result, Err(AuthError::MalformedToken)));
    }

    #[tokio::test]
    async fn alg_none_forgery_is_rejected() {
        let verifier = primed_verifier().await;
        let token = testutil::craft_raw_token(
            &json!({"alg": "none", "typ": "JWT", "kid": testutil::KID_CURRENT}),
            &testutil::valid_claims("mallory"),
        );
        let result = verifier.verify(&token).await;
        assert!(matches!(result, Err(AuthError::MalformedToken)));
    }

    #[tokio::test]
    async fn unknown_kid_is_rejected() {
        let verifier = primed_verifier().await;
        let token =
            testutil::sign_token(testutil::EC1_PRIVATE_PEM, "retired-kid", &testutil::valid_claims("alice"));
        let result = verifier.verify(&token).await;
        assert!(matches!(result, Err(AuthError::UnknownSigningKey)));
    }

    #[tokio::test]
    async fn header_algorithm_is_ignored_in_favor_of_key_algorithm() {
        // Token signed with the right key, but re-headed to claim RS256.
        // Verification must use the matched key's ES256 and reject.
        let verifier = primed_verifier().await;
        let token = testutil::sign_with_current(&testutil::valid_claims("mallory"));
        let confused = testutil::swap_header(
            &token,
            &json!({"alg": "RS256", "typ": "JWT", "kid": testutil::KID_CURRENT}),
        );
        let result = verifier.verify(&confused).await;
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    #[tokio::test]
    async fn key_substitution_is_rejected() {
        // Signed with a different key but claiming the current kid.
        let verifier = primed_verifier().await;
        let token = testutil::sign_token(
            testutil::EC2_PRIVATE_PEM,
            testutil::KID_CURRENT,
            &testutil::valid_claims("mallory"),
        );
        let result = verifier.verify(&token).await;
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    #[tokio::test]
    async fn tampered_payload_is_rejected() {
        let verifier = primed_verifier().await;
        let token = testutil::sign_with_current(&testutil::valid_claims("alice"));

        // Replace the payload, keep header and signature.
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
        let parts: Vec<&str> = token.split('.').collect();
        let mut payload = testutil::valid_claims("alice");
        payload["preferred_username"] = json!("admin");
        let tampered = format!(
            "{}.{}.{}",
            parts[0],
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap()),
            parts[2]
        );

        let result = verifier.verify(&tampered).await;
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let verifier = primed_verifier().await;
        let mut claims = testutil::valid_claims("alice");
        claims["exp"] = json!(testutil::now() - 3600);
        let token = testutil::sign_with_current(&claims);

        let result = verifier.verify(&token).await;
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn wrong_issuer_is_rejected() {
        let verifier = primed_verifier().await;
        let mut claims = testutil::valid_claims("alice");
        claims["iss"] = json!("https://evil.example.net/realms/shop");
        let token = testutil::sign_with_current(&claims);

        let result = verifier.verify(&token).await;
        assert!(matches!(result, Err(AuthError::ClaimMismatch("iss"))));
    }

    #[tokio::test]
    async fn wrong_audience_is_rejected() {
        let verifier = primed_verifier().await;
        let mut claims = testutil::valid_claims("alice");
        claims["aud"] = json!("some-other-app");
        let token = testutil::sign_with_current(&claims);

        let result = verifier.verify(&token).await;
        assert!(matches!(result, Err(AuthError::ClaimMismatch("aud"))));
    }

    #[tokio::test]
    async fn audience_list_containing_expected_is_accepted() {
        let verifier = primed_verifier().await;
        let mut claims = testutil::valid_claims("alice");
        claims["aud"] = json!([TEST_AUDIENCE, "account"]);
        let token = testutil::sign_with_current(&claims);

        assert!(verifier.verify(&token).await.is_ok());
    }

    #[tokio::test]
    async fn missing_audience_is_rejected() {
        let verifier = primed_verifier().await;
        let mut claims = testutil::valid_claims("alice");
        claims.as_object_mut().unwrap().remove("aud");
        let token = testutil::sign_with_current(&claims);

        let result = verifier.verify(&token).await;
        assert!(matches!(result, Err(AuthError::ClaimMismatch("aud"))));
    }

    #[tokio::test]
    async fn malformed_key_material_fails_construction() {
        let manager = JwksManager::new("https://127.0.0.1:1/certs", testutil::TEST_CA_PEM.as_bytes())
            .unwrap();
        let set: jsonwebtoken::jwk::JwkSet = serde_json::from_value(json!({
            "keys": [{
                "kty": "EC", "crv": "P-256", "kid": testutil::KID_CURRENT, "alg": "ES256",
                "x": "!!!", "y": "!!!"
            }]
        }))
        .unwrap();
        let snapshot = super::super::jwks::KeySetSnapshot::from_jwk_set(&set).unwrap();
        manager.prime_with_age(snapshot, Duration::ZERO).await;

        let verifier = TokenVerifier::new(manager, TEST_ISSUER, TEST_AUDIENCE);
        let token = testutil::sign_with_current(&testutil::valid_claims("alice"));
        let result = verifier.verify(&token).await;
        assert!(matches!(result, Err(AuthError::KeyConstruction(_))));
    }

    #[tokio::test]
    async fn unreachable_key_set_is_unavailable() {
        // Cold cache: the fetch itself fails before any lookup.
        let manager = JwksManager::new("https://127.0.0.1:1/certs", testutil::TEST_CA_PEM.as_bytes())
            .unwrap();
        let verifier = TokenVerifier::new(manager, TEST_ISSUER, TEST_AUDIENCE);
        let token = testutil::sign_with_current(&testutil::valid_claims("alice"));

        let result = verifier.verify(&token).await;
        assert!(matches!(result, Err(AuthError::KeySetUnavailable(_))));
    }

    #[tokio::test]
    async fn token_signed_before_rotation_is_rejected_after() {
        let verifier = primed_verifier().await;
        let token = testutil::sign_with_current(&testutil::valid_claims("alice"));
        assert!(verifier.verify(&token).await.is_ok());

        // Provider rotates: old kid removed, new kid published.
        verifier
            .jwks()
            .prime_with_age(testutil::rotated_snapshot(), Duration::ZERO)
            .await;

        let result = verifier.verify(&token).await;
        assert!(matches!(result, Err(AuthError::UnknownSigningKey)));

        let fresh = testutil::sign_token(
            testutil::EC2_PRIVATE_PEM,
            testutil::KID_ROTATED,
            &testutil::valid_claims("alice"),
        );
        assert!(verifier.verify(&fresh).await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_verifications_share_one_snapshot() {
        // 100 distinct valid tokens against a single cached snapshot:
        // all verify, each yielding its own claims.
        let verifier = Arc::new(primed_verifier().await);

        let mut handles = Vec::new();
        for i in 0..100 {
            let verifier = Arc::clone(&verifier);
            let sub = format!("user-{i}");
            let token = testutil::sign_with_current(&testutil::valid_claims(&sub));
            handles.push(tokio::spawn(async move {
                let user = verifier.verify(&token).await.expect("token verifies");
                assert_eq!(user.user_id, sub);
                assert_eq!(user.email.as_deref(), Some(format!("{sub}@example.corp").as_str()));
            }));
        }

        for handle in handles {
            handle.await.expect("verification task completes");
        }
    }
}
