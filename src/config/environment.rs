// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses bind address, database, session and token-encryption settings from env vars
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Environment-based configuration management

use super::oauth::OAuthConfig;
use crate::constants::service::{
    DEFAULT_DATABASE_URL, DEFAULT_HTTP_PORT, DEFAULT_MAX_UPLOAD_BYTES,
    DEFAULT_SESSION_EXPIRY_HOURS,
};
use anyhow::{bail, Context, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use tracing::{info, warn};

/// Length of the AES-256 token encryption key in bytes
pub const TOKEN_KEY_LEN: usize = 32;

/// Environment type for security and other configurations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Session cookie and token settings
#[derive(Clone)]
pub struct SessionConfig {
    /// HS256 signing key for session tokens
    pub secret: Vec<u8>,
    /// Session lifetime in hours
    pub expiry_hours: i64,
    /// Mark cookies `Secure`
    pub cookie_secure: bool,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"<redacted>")
            .field("expiry_hours", &self.expiry_hours)
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}

/// Top-level server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub http_port: u16,
    /// Public base URL used to derive redirect URIs
    pub base_url: String,
    /// Deployment environment
    pub environment: Environment,
    /// `SQLite` connection URL
    pub database_url: String,
    /// AES-256 key for provider tokens at rest
    pub token_encryption_key: Vec<u8>,
    /// Session settings
    pub session: SessionConfig,
    /// Upload body limit in bytes
    pub max_upload_bytes: usize,
    /// Identity provider settings
    pub oauth: OAuthConfig,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("http_port", &self.http_port)
            .field("base_url", &self.base_url)
            .field("environment", &self.environment)
            .field("database_url", &self.database_url)
            .field("token_encryption_key", &"<redacted>")
            .field("session", &self.session)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("oauth", &self.oauth)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but malformed
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let environment =
            Environment::from_str_or_default(&env_var_or("ENVIRONMENT", "development"));
        let http_port: u16 = env_var_or("HTTP_PORT", &DEFAULT_HTTP_PORT.to_string())
            .parse()
            .context("Invalid HTTP_PORT value")?;
        let base_url = env::var("BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{http_port}"))
            .trim_end_matches('/')
            .to_owned();

        let session = SessionConfig {
            secret: load_session_secret(),
            expiry_hours: env_var_or(
                "SESSION_EXPIRY_HOURS",
                &DEFAULT_SESSION_EXPIRY_HOURS.to_string(),
            )
            .parse()
            .context("Invalid SESSION_EXPIRY_HOURS value")?,
            cookie_secure: env_var_or(
                "COOKIE_SECURE",
                if environment.is_production() { "true" } else { "false" },
            )
            .parse()
            .context("Invalid COOKIE_SECURE value")?,
        };

        let config = Self {
            host: env_var_or("HOST", "127.0.0.1"),
            http_port,
            environment,
            database_url: env_var_or("DATABASE_URL", DEFAULT_DATABASE_URL),
            token_encryption_key: load_token_encryption_key()?,
            session,
            max_upload_bytes: env_var_or(
                "MAX_UPLOAD_BYTES",
                &DEFAULT_MAX_UPLOAD_BYTES.to_string(),
            )
            .parse()
            .context("Invalid MAX_UPLOAD_BYTES value")?,
            oauth: OAuthConfig::from_env(&base_url),
            base_url,
        };

        config.validate()?;
        info!(
            http_port = config.http_port,
            environment = %config.environment,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns an error if a value is out of range
    pub fn validate(&self) -> Result<()> {
        if self.session.expiry_hours <= 0 {
            bail!("SESSION_EXPIRY_HOURS must be positive");
        }
        if self.token_encryption_key.len() != TOKEN_KEY_LEN {
            bail!("TOKEN_ENCRYPTION_KEY must be {TOKEN_KEY_LEN} bytes");
        }
        if self.max_upload_bytes == 0 {
            bail!("MAX_UPLOAD_BYTES must be positive");
        }
        if self.environment.is_production() && !self.session.cookie_secure {
            warn!("COOKIE_SECURE is disabled in production");
        }
        self.oauth.validate_and_log();
        Ok(())
    }
}

/// Decode a hex-encoded AES-256 key
///
/// # Errors
///
/// Returns an error if the value is not 64 hex characters
pub fn parse_encryption_key(hex_key: &str) -> Result<Vec<u8>> {
    let key = hex::decode(hex_key.trim()).context("TOKEN_ENCRYPTION_KEY is not valid hex")?;
    if key.len() != TOKEN_KEY_LEN {
        bail!(
            "TOKEN_ENCRYPTION_KEY must decode to {TOKEN_KEY_LEN} bytes, got {}",
            key.len()
        );
    }
    Ok(key)
}

fn load_token_encryption_key() -> Result<Vec<u8>> {
    match env::var("TOKEN_ENCRYPTION_KEY") {
        Ok(value) => parse_encryption_key(&value),
        Err(_) => {
            warn!(
                "TOKEN_ENCRYPTION_KEY not set; stored provider tokens will not survive a restart"
            );
            Ok(random_bytes(TOKEN_KEY_LEN))
        }
    }
}

fn load_session_secret() -> Vec<u8> {
    match env::var("SESSION_SECRET") {
        Ok(secret) if !secret.is_empty() => secret.into_bytes(),
        _ => {
            warn!("SESSION_SECRET not set; sessions will not survive a restart");
            random_bytes(64)
        }
    }
}

/// Generate `len` random bytes from the OS-seeded thread RNG
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Get environment variable or default value
pub(crate) fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Parse separator-delimited scopes
pub(crate) fn parse_scopes(scopes_str: &str, separator: char) -> Vec<String> {
    scopes_str
        .split(separator)
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scopes() {
        assert_eq!(
            parse_scopes("openid, email ,profile", ','),
            vec!["openid", "email", "profile"]
        );
        assert_eq!(parse_scopes("read:user user:email", ' '), vec!["read:user", "user:email"]);
        assert!(parse_scopes("", ',').is_empty());
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(Environment::from_str_or_default("prod"), Environment::Production);
        assert_eq!(Environment::from_str_or_default("TEST"), Environment::Testing);
        assert_eq!(Environment::from_str_or_default("other"), Environment::Development);
        assert_eq!(Environment::Production.to_string(), "production");
    }

    #[test]
    fn test_parse_encryption_key() {
        let key = parse_encryption_key(&"ab".repeat(32)).unwrap();
        assert_eq!(key.len(), TOKEN_KEY_LEN);
        assert!(parse_encryption_key("abcd").is_err());
        assert!(parse_encryption_key(&"zz".repeat(32)).is_err());
    }
}
