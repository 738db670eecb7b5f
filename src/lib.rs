// ABOUTME: Main library entry point for the identity linking server
// ABOUTME: Local and social login, provider identity linking and TikTok inbox uploads
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![deny(unsafe_code)]

//! # idlink
//!
//! A web back end where one account can be reached through a password and
//! through Google, Facebook, GitHub and TikTok logins.
//!
//! ## Features
//!
//! - **Local accounts**: bcrypt-hashed passwords, JWT session cookie
//! - **Social login**: `OAuth2` authorization code flow with state bound to the browser
//! - **Identity linking**: logins are reconciled by provider subject, then by email
//! - **Token lifecycle**: provider tokens encrypted at rest and refreshed before expiry
//! - **TikTok upload**: single-chunk inbox upload through the content posting API
//!
//! ## Architecture
//!
//! - **Routes**: thin axum handlers grouped per flow
//! - **Services**: reconciliation, token refresh and upload rules
//! - **Database**: `SQLite` persistence for users and linked identities
//! - **`OAuth2` client** and **providers**: code exchange and profile normalisation
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use idlink::config::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     idlink::server::run_server(config).await
//! }
//! ```

// ── Public API ──────────────────────────────────────────────────────────
// These modules are used by the binary (src/bin/) and integration tests (tests/).

/// Session tokens and password hashing
pub mod auth;

/// Environment configuration
pub mod config;

/// Application constants
pub mod constants;

/// Provider token encryption at rest
pub mod crypto;

/// `SQLite` persistence for users and linked identities
pub mod database;

/// Unified error handling
pub mod errors;

/// Structured logging setup
pub mod logging;

/// Session extractor and request tracing
pub mod middleware;

/// Users, providers and linked identities
pub mod models;

/// `OAuth2` authorization code clients
pub mod oauth2_client;

/// Provider profile normalisation
pub mod providers;

/// Shared server resources
pub mod resources;

/// HTTP route groups
pub mod routes;

/// `OAuth` state protection and cookies
pub mod security;

/// Server assembly and lifecycle
pub mod server;

/// Reconciliation, token and upload services
pub mod services;

/// HTTP client construction
pub mod utils;
