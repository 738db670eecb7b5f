// ABOUTME: OAuth login for Google, Facebook and GitHub
// ABOUTME: Starts the authorization redirect and completes the callback into a session
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! `OAuth` login routes
//!
//! `GET /oauth2/authorization/:provider` stores a pending authorization,
//! binds its `state` to the browser with a cookie and redirects to the provider.
//! `GET /login/oauth2/code/:provider` checks the state, exchanges the code,
//! fetches the profile and reconciles it with the local accounts.

use super::{callback_failure, finish_login, login_error_redirect};
use crate::constants::cookies::OAUTH_STATE_COOKIE;
use crate::constants::login_errors::{
    EMAIL_NOT_PROVIDED, INVALID_STATE, MISSING_PARAMS, OAUTH_CALLBACK_FAILED, PROVIDER_DISABLED,
};
use crate::errors::{AppError, AppResult};
use crate::logging::{redact, AppLogger};
use crate::models::AuthProvider;
use crate::oauth2_client::{OAuth2Client, OAuth2Config, PkceParams};
use crate::providers::create_profile_provider;
use crate::resources::ServerResources;
use crate::security::cookies::{get_cookie_value, state_cookie};
use crate::security::state_matches_cookie;
use crate::services::{LoginOutcome, OAuthLogin};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Query parameters of an authorization callback
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code
    pub code: Option<String>,
    /// CSRF state
    pub state: Option<String>,
    /// Provider error code
    pub error: Option<String>,
    /// Provider error text
    pub error_description: Option<String>,
}

/// `OAuth` routes implementation
pub struct OAuthRoutes;

impl OAuthRoutes {
    /// Create the authorization and callback routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/oauth2/authorization/:provider", get(Self::handle_authorize))
            .route("/login/oauth2/code/:provider", get(Self::handle_callback))
            .with_state(resources)
    }

    /// Parse a path segment naming a social provider
    fn social_provider(segment: &str) -> AppResult<AuthProvider> {
        segment
            .parse::<AuthProvider>()
            .ok()
            .filter(AuthProvider::is_oauth)
            .ok_or_else(|| AppError::not_found(format!("Identity provider {segment}")))
    }

    fn client_for(resources: &ServerResources, provider: AuthProvider) -> AppResult<OAuth2Client> {
        let settings = resources
            .oauth
            .provider(provider)
            .ok_or_else(|| AppError::config(format!("{provider} has no OAuth settings")))?;
        let config = OAuth2Config::from_provider(provider, settings)?;
        Ok(OAuth2Client::new(provider, config, resources.oauth_http.clone()))
    }

    async fn handle_authorize(
        State(resources): State<Arc<ServerResources>>,
        Path(provider): Path<String>,
        jar: CookieJar,
    ) -> Result<Response, AppError> {
        let provider = Self::social_provider(&provider)?;
        if provider == AuthProvider::Tiktok {
            return Ok(Redirect::to("/oauth/tiktok").into_response());
        }

        let client = match Self::client_for(&resources, provider) {
            Ok(client) => client,
            Err(e) => {
                warn!(provider = %provider, error = %e, "Login attempted for unavailable provider");
                return Ok(login_error_redirect(PROVIDER_DISABLED).into_response());
            }
        };

        let pkce = client.config().use_pkce.then(PkceParams::generate);
        let state = resources
            .state_manager
            .begin(provider, pkce.as_ref().map(|p| p.code_verifier.clone()));
        let url = client.get_authorization_url(&state, pkce.as_ref())?;

        AppLogger::log_oauth_event(provider.as_str(), "authorize", true, None);
        let jar = jar.add(state_cookie(state, resources.config.session.cookie_secure));
        Ok((jar, Redirect::to(&url)).into_response())
    }

    async fn handle_callback(
        State(resources): State<Arc<ServerResources>>,
        Path(provider): Path<String>,
        Query(query): Query<CallbackQuery>,
        jar: CookieJar,
    ) -> Result<Response, AppError> {
        let provider = Self::social_provider(&provider)?;

        if let Some(error) = query.error.as_deref() {
            AppLogger::log_oauth_event(
                provider.as_str(),
                "callback",
                false,
                Some(query.error_description.as_deref().unwrap_or(error)),
            );
            return Ok(callback_failure(jar, error).into_response());
        }

        let (Some(code), Some(state)) = (query.code.as_deref(), query.state.as_deref()) else {
            return Ok(callback_failure(jar, MISSING_PARAMS).into_response());
        };

        let cookie_state = get_cookie_value(&jar, OAUTH_STATE_COOKIE);
        if !state_matches_cookie(state, cookie_state.as_deref()) {
            AppLogger::log_security_event(
                "oauth_state_mismatch",
                "callback state does not match the browser's state cookie",
                Some(provider.as_str()),
            );
            return Ok(callback_failure(jar, INVALID_STATE).into_response());
        }
        let pending = match resources.state_manager.consume(state, provider) {
            Ok(pending) => pending,
            Err(e) => {
                AppLogger::log_security_event(
                    "oauth_state_rejected",
                    &e.message,
                    Some(provider.as_str()),
                );
                return Ok(callback_failure(jar, INVALID_STATE).into_response());
            }
        };

        let verifier = pending.pkce_verifier.as_deref();
        match Self::complete_login(&resources, provider, code, verifier).await {
            Ok(outcome) => {
                info!(
                    user_id = %outcome.user.id,
                    provider = %provider,
                    outcome = %outcome.outcome,
                    "OAuth login completed"
                );
                Ok(finish_login(&resources, jar, &outcome.user, provider)?.into_response())
            }
            Err(reason) => Ok(callback_failure(jar, reason).into_response()),
        }
    }

    /// Exchange, fetch and reconcile; the error is the login page reason code
    async fn complete_login(
        resources: &ServerResources,
        provider: AuthProvider,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<LoginOutcome, &'static str> {
        let fail = |stage: &str, e: &AppError| {
            AppLogger::log_oauth_event(provider.as_str(), stage, false, Some(&e.to_string()));
            OAUTH_CALLBACK_FAILED
        };

        let client = Self::client_for(resources, provider).map_err(|e| fail("configure", &e))?;
        let token = client
            .exchange_code(code, pkce_verifier)
            .await
            .map_err(|e| fail("exchange_code", &e))?;
        tracing::debug!(
            provider = %provider,
            access_token = %redact(&token.access_token),
            "Authorization code exchanged"
        );

        let profiles =
            create_profile_provider(provider, &resources.oauth, resources.oauth_http.clone())
                .map_err(|e| fail("profile", &e))?;
        let profile = profiles
            .fetch_profile(&token.access_token)
            .await
            .map_err(|e| fail("profile", &e))?;

        let tokens = Some(token.into_provider_tokens());
        let login = OAuthLogin::from_profile(profile, tokens).map_err(|e| {
            AppLogger::log_oauth_event(provider.as_str(), "profile", false, Some(&e.message));
            EMAIL_NOT_PROVIDED
        })?;

        resources
            .identity_service()
            .find_or_create_oauth_user(&login)
            .await
            .map_err(|e| fail("reconcile", &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_social_provider_rejects_local_and_unknown() {
        assert_eq!(OAuthRoutes::social_provider("github").unwrap(), AuthProvider::Github);
        assert!(OAuthRoutes::social_provider("local").is_err());
        assert!(OAuthRoutes::social_provider("myspace").is_err());
    }
}
