// ABOUTME: Pending OAuth authorization store keyed by the CSRF state parameter
// ABOUTME: One-time, expiring entries binding a state to its provider and PKCE verifier
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! `OAuth` state protection
//!
//! Each login attempt registers a random `state`. The callback must present the
//! same value both in the query string and in the state cookie set when the
//! flow started, and the value can be redeemed only once.

use crate::constants::oauth::STATE_TTL_SECS;
use crate::errors::{AppError, AppResult};
use crate::models::AuthProvider;
use crate::oauth2_client::generate_state;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use subtle::ConstantTimeEq;
use tracing::debug;

/// Authorization waiting for its callback
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    /// Provider the flow was started for
    pub provider: AuthProvider,
    /// PKCE verifier to send with the code exchange
    pub pkce_verifier: Option<String>,
    /// When the state stops being accepted
    pub expires_at: DateTime<Utc>,
}

/// In-memory store of pending authorizations
pub struct OAuthStateManager {
    pending: DashMap<String, PendingAuthorization>,
    ttl: Duration,
}

impl Default for OAuthStateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl OAuthStateManager {
    /// Create a store with the default ten minute lifetime
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(STATE_TTL_SECS))
    }

    /// Create a store with a custom lifetime
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            ttl,
        }
    }

    /// Register a new flow and return its `state`
    pub fn begin(&self, provider: AuthProvider, pkce_verifier: Option<String>) -> String {
        self.cleanup_expired();

        let state = generate_state();
        self.pending.insert(
            state.clone(),
            PendingAuthorization {
                provider,
                pkce_verifier,
                expires_at: Utc::now() + self.ttl,
            },
        );
        debug!(provider = %provider, pending = self.pending.len(), "OAuth flow started");
        state
    }

    /// Redeem a `state` for `provider`
    ///
    /// The entry is removed whether or not it is accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the state is unknown, expired or belongs to another provider
    pub fn consume(&self, state: &str, provider: AuthProvider) -> AppResult<PendingAuthorization> {
        let (_, pending) = self
            .pending
            .remove(state)
            .ok_or_else(|| AppError::auth_invalid("Unknown OAuth state"))?;

        if pending.expires_at <= Utc::now() {
            return Err(AppError::auth_invalid("OAuth state expired"));
        }
        if pending.provider != provider {
            return Err(AppError::auth_invalid(format!(
                "OAuth state was issued for {}, not {provider}",
                pending.provider
            )));
        }
        Ok(pending)
    }

    /// Number of flows awaiting a callback
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop expired entries
    pub fn cleanup_expired(&self) {
        let now = Utc::now();
        self.pending.retain(|_, pending| pending.expires_at > now);
    }
}

/// Whether the query `state` equals the value stored in the browser's cookie
#[must_use]
pub fn state_matches_cookie(query_state: &str, cookie_state: Option<&str>) -> bool {
    cookie_state.is_some_and(|cookie| {
        !cookie.is_empty() && bool::from(query_state.as_bytes().ct_eq(cookie.as_bytes()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_single_use() {
        let manager = OAuthStateManager::new();
        let state = manager.begin(AuthProvider::Google, Some("verifier".into()));

        let pending = manager.consume(&state, AuthProvider::Google).unwrap();
        assert_eq!(pending.pkce_verifier.as_deref(), Some("verifier"));
        assert!(manager.consume(&state, AuthProvider::Google).is_err());
    }

    #[test]
    fn test_provider_mismatch_burns_state() {
        let manager = OAuthStateManager::new();
        let state = manager.begin(AuthProvider::Github, None);

        assert!(manager.consume(&state, AuthProvider::Facebook).is_err());
        assert!(manager.consume(&state, AuthProvider::Github).is_err());
    }

    #[test]
    fn test_expired_state_rejected_and_swept() {
        let manager = OAuthStateManager::with_ttl(Duration::seconds(-1));
        let state = manager.begin(AuthProvider::Tiktok, None);
        assert!(manager.consume(&state, AuthProvider::Tiktok).is_err());

        manager.begin(AuthProvider::Tiktok, None);
        manager.begin(AuthProvider::Tiktok, None);
        // Each insert sweeps the previous, already expired, entries
        assert_eq!(manager.pending_count(), 1);
    }

    #[test]
    fn test_cookie_binding() {
        assert!(state_matches_cookie("abc", Some("abc")));
        assert!(!state_matches_cookie("abc", Some("abd")));
        assert!(!state_matches_cookie("abc", None));
        assert!(!state_matches_cookie("", Some("")));
    }
}
