// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{env, net::SocketAddr, process};

use tracing_subscriber::EnvFilter;

use relational_shop_gateway::api::router;
use relational_shop_gateway::auth::{JwksManager, TokenVerifier};
use relational_shop_gateway::config::AppConfig;
use relational_shop_gateway::db::{SecureChannel, ShopGateway};
use relational_shop_gateway::state::AppState;

#[tokio::main]
async fn main() {
    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    init_tracing();

    // Fail closed on configuration errors: a missing decryption key or
    // credential path must stop the process, not degrade it.
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "configuration error, refusing to start");
            process::exit(1);
        }
    };

    let idp_root = match std::fs::read(&config.auth.idp_root_cert) {
        Ok(pem) => pem,
        Err(err) => {
            tracing::error!(
                path = %config.auth.idp_root_cert.display(),
                error = %err,
                "cannot read identity-provider root certificate"
            );
            process::exit(1);
        }
    };

    let jwks = match JwksManager::new(config.auth.jwks_url.clone(), &idp_root) {
        Ok(jwks) => jwks,
        Err(err) => {
            tracing::error!(error = %err, "cannot build pinned JWKS client");
            process::exit(1);
        }
    };

    // Prefetch is best-effort: the provider may come up after us.
    if let Err(err) = jwks.warm().await {
        tracing::warn!(error = %err, "key set prefetch failed, will retry on first request");
    }
    tracing::info!(
        jwks_url = jwks.jwks_url(),
        issuer = %config.auth.issuer,
        audience = %config.auth.audience,
        "token verification configured"
    );

    let verifier = TokenVerifier::new(jwks, config.auth.issuer.clone(), config.auth.audience.clone());
    let gateway = ShopGateway::new(
        SecureChannel::new(config.db.clone()),
        config.decryption_key.clone(),
    );
    tracing::info!(
        db_host = %config.db.host,
        db_name = %config.db.database,
        verify_hostname = config.db.verify_hostname,
        "protected data channel configured"
    );

    let app = router(AppState::new(verifier, gateway));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Failed to parse bind address");

    tracing::info!(%addr, "shop gateway listening (docs at /docs)");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("HTTP server failed");
}

/// Initialize tracing with `RUST_LOG` filtering and the `LOG_FORMAT`
/// switch (`json` for structured output, pretty otherwise).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    if env::var("LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Resolve on SIGTERM or ctrl-c so in-flight requests can drain.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining");
}
