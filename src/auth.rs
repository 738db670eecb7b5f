// ABOUTME: Session token issuance and validation plus password hashing
// ABOUTME: HS256 JWT sessions carried in a cookie, bcrypt hashing on blocking threads
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Authentication
//!
//! A successful login (local or social) produces a short JWT naming the user
//! and the provider used for that login. The token travels in an `HttpOnly`
//! cookie and is validated on every request that needs a session.

use crate::constants::service::SESSION_AUDIENCE;
use crate::errors::{AppError, AppResult};
use crate::models::{AuthProvider, User};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session token claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User `ID`
    pub sub: String,
    /// User email at login time
    pub email: String,
    /// Provider used for this login
    pub provider: AuthProvider,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Audience
    pub aud: String,
}

impl Claims {
    /// Parse the subject as a user id
    ///
    /// # Errors
    ///
    /// Returns an error if the subject is not a UUID
    pub fn user_id(&self) -> AppResult<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::auth_invalid("Malformed session subject"))
    }
}

/// Issues and validates session tokens
#[derive(Clone)]
pub struct AuthManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_expiry_hours: i64,
}

impl AuthManager {
    /// Create a manager from an HS256 secret
    #[must_use]
    pub fn new(secret: &[u8], token_expiry_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            token_expiry_hours,
        }
    }

    /// Session lifetime in hours
    #[must_use]
    pub const fn token_expiry_hours(&self) -> i64 {
        self.token_expiry_hours
    }

    /// Generate a session token for a login through `provider`
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails
    pub fn generate_session_token(&self, user: &User, provider: AuthProvider) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            provider,
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.token_expiry_hours)).timestamp(),
            aud: SESSION_AUDIENCE.to_owned(),
        };
        self.encode_claims(&claims)
    }

    fn encode_claims(&self, claims: &Claims) -> AppResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to sign session token: {e}")))
    }

    /// Validate a session token
    ///
    /// # Errors
    ///
    /// Returns `AUTH_EXPIRED` for an expired token and `AUTH_INVALID` otherwise
    pub fn validate_session_token(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_audience(&[SESSION_AUDIENCE]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::auth_expired("Session expired"),
                _ => {
                    tracing::debug!(error = %e, "Session token rejected");
                    AppError::auth_invalid("Invalid session token")
                }
            })
    }
}

/// Hash a password with bcrypt on a blocking thread
///
/// # Errors
///
/// Returns an error if hashing fails or the blocking task panics
pub async fn hash_password(password: String, cost: u32) -> AppResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::internal(format!("Password hashing task failed: {e}")))?
        .map_err(|e| AppError::internal(format!("Password hashing failed: {e}")))
}

/// Verify a password against a bcrypt hash on a blocking thread
///
/// # Errors
///
/// Returns an error if the hash is malformed or the blocking task panics
pub async fn verify_password(password: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::internal(format!("Password verification task failed: {e}")))?
        .map_err(|e| AppError::internal(format!("Password verification failed: {e}")))
}
