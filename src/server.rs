// ABOUTME: HTTP server assembly and lifecycle
// ABOUTME: Merges all route groups, applies tracing and body limits, serves until shutdown
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::config::ServerConfig;
use crate::constants::service::MULTIPART_OVERHEAD_BYTES;
use crate::database::Database;
use crate::middleware::{propagate_request_id_layer, set_request_id_layer, trace_layer};
use crate::resources::ServerResources;
use crate::routes::{AuthRoutes, HealthRoutes, HomeRoutes, OAuthRoutes, TikTokRoutes};
use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;

/// Build the application router
pub fn build_router(resources: Arc<ServerResources>) -> Router {
    let body_limit = resources
        .config
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .merge(HealthRoutes::routes(resources.clone()))
        .merge(AuthRoutes::routes(resources.clone()))
        .merge(OAuthRoutes::routes(resources.clone()))
        .merge(TikTokRoutes::routes(resources.clone()))
        .merge(HomeRoutes::routes(resources))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(propagate_request_id_layer())
        .layer(trace_layer())
        .layer(set_request_id_layer())
}

/// Open the database and build the shared resources
///
/// # Errors
///
/// Returns an error if the database cannot be opened or migrated
pub async fn build_resources(config: Arc<ServerConfig>) -> Result<Arc<ServerResources>> {
    let database = Database::new(&config.database_url, &config.token_encryption_key)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;
    database.migrate().await.context("Database migration failed")?;
    info!(database_url = %config.database_url, "Database ready");

    Ok(Arc::new(ServerResources::new(database, config)))
}

/// Serve until Ctrl-C or SIGTERM
///
/// # Errors
///
/// Returns an error if startup fails or the listener cannot be bound
pub async fn run_server(config: ServerConfig) -> Result<()> {
    config.validate()?;
    let config = Arc::new(config);

    let resources = build_resources(config.clone()).await?;
    let app = build_router(resources);

    let addr = format!("{}:{}", config.host, config.http_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    display_available_endpoints(&config);
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}

/// Display all available endpoints
fn display_available_endpoints(config: &ServerConfig) {
    let base = config.base_url.trim_end_matches('/');

    info!("=== Available Endpoints ===");
    display_auth_endpoints(base);
    display_oauth_endpoints(base, config);
    display_tiktok_endpoints(base);
    info!("   Health:            GET  {base}/health");
    info!("   Readiness:         GET  {base}/ready");
    info!("=== End of Endpoint List ===");
}

#[allow(clippy::cognitive_complexity)]
fn display_auth_endpoints(base: &str) {
    info!("Local accounts:");
    info!("   Login page:        GET  {base}/login");
    info!("   Register:          POST {base}/api/register");
    info!("   Password login:    POST {base}/perform-login");
    info!("   Logout:            GET  {base}/logout");
    info!("   Home:              GET  {base}/home");
}

fn display_oauth_endpoints(base: &str, config: &ServerConfig) {
    let enabled = config.oauth.enabled_providers();
    info!("Social login ({} enabled):", enabled.len());
    for provider in enabled {
        info!(
            "   {:<18} GET  {base}{}",
            provider.as_str(),
            crate::routes::auth::authorization_path(provider)
        );
    }
}

#[allow(clippy::cognitive_complexity)]
fn display_tiktok_endpoints(base: &str) {
    info!("TikTok:");
    info!("   Callback:          GET  {base}/auth/tiktok/callback/");
    info!("   Upload status:     GET  {base}/tiktok/upload");
    info!("   Upload video:      POST {base}/tiktok/upload");
}
