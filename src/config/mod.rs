// ABOUTME: Configuration module root
// ABOUTME: Environment-only configuration for server, session and provider settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Configuration loaded from environment variables

/// Server, database and session settings
pub mod environment;
/// Identity provider settings
pub mod oauth;

pub use environment::{Environment, ServerConfig, SessionConfig};
pub use oauth::{OAuthConfig, OAuthProviderConfig};
