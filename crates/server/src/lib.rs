//! Gatekeeper server library.
//!
//! Provides a reusable server function to serve the gatekeeper either for the binary, or for the integration tests.

#![deny(missing_docs)]

mod auth;
mod client_ip;
mod error;
mod eviction;
mod gateway;
mod health;
mod login;
mod status;

use std::{net::SocketAddr, sync::Arc};

use anyhow::anyhow;
use auth::{CredentialIssuer, CredentialStore, IdentityLayer, TokenAuthenticator};
use axum::Router;
use axum_server::{Handle, tls_rustls::RustlsConfig};
use config::Config;
use gateway::RequestGateway;
use rate_limit::{QuotaPolicy, UsageTracker};
use status::StatusReporter;
use tokio::net::TcpListener;

/// Configuration for serving the gatekeeper.
pub struct ServeConfig {
    /// The socket address (IP and port) the server will bind to
    pub listen_address: SocketAddr,
    /// The deserialized gatekeeper TOML configuration.
    pub config: Config,
}

/// Starts and runs the gatekeeper with the provided configuration.
pub async fn serve(ServeConfig { listen_address, config }: ServeConfig) -> anyhow::Result<()> {
    let app = router(&config)?;

    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("Failed to bind to {listen_address}: {e}"))?;

    let service = app.into_make_service_with_connect_info::<SocketAddr>();

    match &config.server.tls {
        Some(tls_config) => {
            // Errors only if another provider was installed first.
            let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

            let rustls_config = RustlsConfig::from_pem_file(&tls_config.certificate, &tls_config.key)
                .await
                .map_err(|e| anyhow!("Failed to load TLS certificate and key: {e}"))?;

            log::info!("Gatekeeper listening on https://{listen_address}");

            let handle = Handle::new();
            tokio::spawn(shutdown_on_ctrl_c(handle.clone()));

            axum_server::from_tcp_rustls(listener.into_std()?, rustls_config)
                .handle(handle)
                .serve(service)
                .await
                .map_err(|e| anyhow!("Failed to start HTTPS server: {e}"))?;
        }
        None => {
            log::info!("Gatekeeper listening on http://{listen_address}");

            axum::serve(listener, service)
                .with_graceful_shutdown(ctrl_c())
                .await
                .map_err(|e| anyhow!("Failed to start HTTP server: {e}"))?;
        }
    }

    Ok(())
}

/// Wires every component from the configuration into the application router.
fn router(config: &Config) -> anyhow::Result<Router> {
    let server = &config.server;

    let policy = Arc::new(QuotaPolicy::new(&server.quotas));

    let store = CredentialStore::load(&server.auth)?;
    store.ensure_covered_by(&policy)?;
    log::debug!("Loaded {} user credentials", store.user_count());

    let key = Arc::new(auth::signing_key(&server.auth));
    let issuer = CredentialIssuer::new(store, key.clone(), server.auth.token_ttl)?;
    let authenticator = TokenAuthenticator::new(key, policy.clone());

    let tracker = Arc::new(UsageTracker::in_memory(policy, &server.quotas.eviction));

    if server.quotas.eviction.enabled {
        eviction::spawn_sweeper(tracker.clone(), server.quotas.eviction.sweep_interval);
    }

    let generator = llm::from_config(&config.llm)?;
    let gateway = Arc::new(RequestGateway::new(tracker.clone(), generator));
    let reporter = Arc::new(StatusReporter::new(tracker));

    let identified = gateway::router(gateway)
        .merge(status::router(reporter))
        .layer(IdentityLayer::new(authenticator, server.trust_forwarded_headers));

    let mut app = Router::new().merge(login::router(Arc::new(issuer))).merge(identified);

    if server.health.enabled {
        app = app.merge(health::router(&server.health));
    }

    Ok(app)
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }

    log::info!("Shutting down");
}

async fn shutdown_on_ctrl_c(handle: Handle) {
    ctrl_c().await;
    handle.graceful_shutdown(None);
}
