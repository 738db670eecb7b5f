// ABOUTME: Shared test utilities for idlink integration tests
// ABOUTME: In-memory database, test configuration and router construction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs
)]

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use idlink::config::{Environment, OAuthConfig, OAuthProviderConfig, ServerConfig, SessionConfig};
use idlink::database::Database;
use idlink::models::{AuthProvider, NewIdentity, ProviderTokens, User};
use idlink::resources::ServerResources;
use idlink::server::build_router;
use std::sync::{Arc, Once};
use tower::ServiceExt;
use uuid::Uuid;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            Ok("WARN" | "ERROR") | _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

pub const TEST_BASE_URL: &str = "http://localhost:8080";

/// Provider settings pointing every endpoint at `mock_base`
pub fn provider_config(mock_base: &str, name: &str, callback_path: &str) -> OAuthProviderConfig {
    OAuthProviderConfig {
        client_id: Some(format!("{name}-client")),
        client_secret: Some(format!("{name}-secret")),
        redirect_uri: format!("{TEST_BASE_URL}{callback_path}"),
        scopes: vec!["profile".to_owned()],
        auth_url: format!("{mock_base}/{name}/authorize"),
        token_url: format!("{mock_base}/{name}/token"),
        userinfo_url: format!("{mock_base}/{name}/user"),
        use_pkce: false,
        enabled: true,
    }
}

/// GitHub and TikTok enabled against a mock server, Google and Facebook disabled
pub fn mock_oauth_config(mock_base: &str) -> OAuthConfig {
    OAuthConfig {
        google: OAuthProviderConfig::default(),
        facebook: OAuthProviderConfig::default(),
        github: provider_config(mock_base, "github", "/login/oauth2/code/github"),
        tiktok: provider_config(mock_base, "tiktok", "/auth/tiktok/callback/"),
        github_emails_url: format!("{mock_base}/github/user/emails"),
        tiktok_api_base: format!("{mock_base}/tiktok-api"),
    }
}

/// Server configuration backed by an in-memory database
pub fn test_config(oauth: OAuthConfig) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_owned(),
        http_port: 8080,
        base_url: TEST_BASE_URL.to_owned(),
        environment: Environment::Testing,
        database_url: "sqlite::memory:".to_owned(),
        token_encryption_key: vec![7u8; 32],
        session: SessionConfig {
            secret: b"integration-test-session-secret".to_vec(),
            expiry_hours: 1,
            cookie_secure: false,
        },
        max_upload_bytes: 1024 * 1024,
        oauth,
    }
}

/// Resources over a fresh in-memory database with a cheap bcrypt cost
pub async fn create_test_resources(config: ServerConfig) -> Result<Arc<ServerResources>> {
    init_test_logging();
    let database = Database::new(&config.database_url, &config.token_encryption_key).await?;
    Ok(Arc::new(
        ServerResources::new(database, Arc::new(config)).with_bcrypt_cost(4),
    ))
}

/// Resources and router with no provider configured
pub async fn create_test_app() -> Result<(Arc<ServerResources>, Router)> {
    let resources = create_test_resources(test_config(OAuthConfig::default())).await?;
    let router = build_router(resources.clone());
    Ok((resources, router))
}

/// Resources and router with GitHub and TikTok served by `mock_base`
pub async fn create_mock_app(mock_base: &str) -> Result<(Arc<ServerResources>, Router)> {
    let resources = create_test_resources(test_config(mock_oauth_config(mock_base))).await?;
    let router = build_router(resources.clone());
    Ok((resources, router))
}

/// Create a user holding a linked identity of `provider`
pub async fn create_linked_user(
    database: &Database,
    email: &str,
    provider: AuthProvider,
    provider_id: &str,
    tokens: Option<ProviderTokens>,
) -> Result<User> {
    let user = User::new(email.to_owned(), Some("Linked User".to_owned()));
    let identity = NewIdentity {
        user_id: user.id,
        provider,
        provider_id: Some(provider_id.to_owned()),
        tokens,
    };
    database.create_user_with_identity(&user, &identity).await?;
    Ok(user)
}

/// `Cookie` header value carrying a session for `user`
pub fn session_cookie_header(
    resources: &ServerResources,
    user: &User,
    provider: AuthProvider,
) -> String {
    let token = resources
        .auth_manager
        .generate_session_token(user, provider)
        .unwrap();
    format!("{}={token}", idlink::constants::cookies::SESSION_COOKIE)
}

/// Send a request through the router
pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

/// Read a response body as JSON
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// `Location` header of a redirect
pub fn location(response: &Response<Body>) -> String {
    response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_owned()
}

/// Value of the `Set-Cookie` header naming `name`, if any
pub fn set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{name}=")))
        .map(str::to_owned)
}

/// `name=value` part of a `Set-Cookie` header, ready for a `Cookie` header
pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .unwrap_or_default()
        .to_owned()
}

/// Random provider subject id
pub fn random_subject() -> String {
    Uuid::new_v4().simple().to_string()
}
