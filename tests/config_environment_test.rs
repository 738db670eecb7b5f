// ABOUTME: Environment configuration loading tests
// ABOUTME: Provider enablement, redirect derivation, endpoint overrides and validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use idlink::config::{Environment, ServerConfig};
use idlink::models::AuthProvider;
use serial_test::serial;
use std::env;

const MANAGED_VARS: &[&str] = &[
    "ENVIRONMENT",
    "HTTP_PORT",
    "BASE_URL",
    "DATABASE_URL",
    "TOKEN_ENCRYPTION_KEY",
    "SESSION_SECRET",
    "SESSION_EXPIRY_HOURS",
    "COOKIE_SECURE",
    "MAX_UPLOAD_BYTES",
    "GOOGLE_CLIENT_ID",
    "GOOGLE_CLIENT_SECRET",
    "GITHUB_CLIENT_ID",
    "GITHUB_CLIENT_SECRET",
    "GITHUB_TOKEN_URL",
    "FACEBOOK_CLIENT_ID",
    "FACEBOOK_CLIENT_SECRET",
    "TIKTOK_CLIENT_KEY",
    "TIKTOK_CLIENT_SECRET",
    "TIKTOK_REDIRECT_URI",
    "TIKTOK_API_BASE",
];

fn clear_env() {
    for var in MANAGED_VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults_without_providers() {
    clear_env();

    let config = ServerConfig::from_env().unwrap();
    assert_eq!(config.http_port, 8080);
    assert_eq!(config.base_url, "http://localhost:8080");
    assert_eq!(config.environment, Environment::Development);
    assert!(!config.session.cookie_secure);
    assert_eq!(config.token_encryption_key.len(), 32);
    assert!(config.oauth.enabled_providers().is_empty());
    assert_eq!(
        config.oauth.github.redirect_uri,
        "http://localhost:8080/login/oauth2/code/github"
    );
    assert_eq!(
        config.oauth.tiktok.redirect_uri,
        "http://localhost:8080/auth/tiktok/callback/"
    );
    assert!(config.oauth.google.use_pkce);
}

#[test]
#[serial]
fn test_providers_enable_with_both_credentials() {
    clear_env();
    env::set_var("BASE_URL", "https://idlink.example.com/");
    env::set_var("GITHUB_CLIENT_ID", "gh-id");
    env::set_var("GITHUB_CLIENT_SECRET", "gh-secret");
    env::set_var("GOOGLE_CLIENT_ID", "only-an-id");
    env::set_var("TIKTOK_CLIENT_KEY", "tt-key");
    env::set_var("TIKTOK_CLIENT_SECRET", "tt-secret");
    env::set_var("TIKTOK_REDIRECT_URI", "https://tunnel.example.com/auth/tiktok/callback/");

    let config = ServerConfig::from_env().unwrap();
    assert_eq!(
        config.oauth.enabled_providers(),
        vec![AuthProvider::Github, AuthProvider::Tiktok]
    );
    assert_eq!(
        config.oauth.github.redirect_uri,
        "https://idlink.example.com/login/oauth2/code/github"
    );
    assert_eq!(
        config.oauth.tiktok.redirect_uri,
        "https://tunnel.example.com/auth/tiktok/callback/"
    );
    assert_eq!(config.oauth.tiktok.client_id.as_deref(), Some("tt-key"));
    clear_env();
}

#[test]
#[serial]
fn test_endpoint_overrides() {
    clear_env();
    env::set_var("GITHUB_TOKEN_URL", "http://127.0.0.1:9999/token");
    env::set_var("TIKTOK_API_BASE", "http://127.0.0.1:9999/api/");

    let config = ServerConfig::from_env().unwrap();
    assert_eq!(config.oauth.github.token_url, "http://127.0.0.1:9999/token");
    assert_eq!(config.oauth.tiktok_api_base, "http://127.0.0.1:9999/api");
    clear_env();
}

#[test]
#[serial]
fn test_production_defaults_to_secure_cookies() {
    clear_env();
    env::set_var("ENVIRONMENT", "production");
    env::set_var("TOKEN_ENCRYPTION_KEY", "0f".repeat(32));

    let config = ServerConfig::from_env().unwrap();
    assert!(config.environment.is_production());
    assert!(config.session.cookie_secure);
    assert_eq!(config.token_encryption_key, vec![0x0f; 32]);
    clear_env();
}

#[test]
#[serial]
fn test_malformed_values_are_rejected() {
    clear_env();
    env::set_var("HTTP_PORT", "not-a-port");
    assert!(ServerConfig::from_env().is_err());

    clear_env();
    env::set_var("TOKEN_ENCRYPTION_KEY", "abcd");
    assert!(ServerConfig::from_env().is_err());

    clear_env();
    env::set_var("SESSION_EXPIRY_HOURS", "0");
    assert!(ServerConfig::from_env().is_err());

    clear_env();
    env::set_var("MAX_UPLOAD_BYTES", "0");
    assert!(ServerConfig::from_env().is_err());
    clear_env();
}
