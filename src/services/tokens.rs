// ABOUTME: Provider token lifecycle for linked identities
// ABOUTME: Returns a usable access token, refreshing it shortly before expiry

use crate::config::OAuthConfig;
use crate::constants::oauth::TOKEN_REFRESH_MARGIN_SECS;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::logging::{redact, AppLogger};
use crate::models::{AuthProvider, LinkedIdentity, ProviderTokens};
use crate::oauth2_client::{OAuth2Client, OAuth2Config, TikTokOAuthClient};
use chrono::Duration;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Keeps stored provider tokens usable
#[derive(Clone)]
pub struct TokenService {
    database: Arc<Database>,
    oauth: Arc<OAuthConfig>,
    http: Client,
    refresh_margin: Duration,
}

impl TokenService {
    /// Create the service with the default five minute refresh margin
    #[must_use]
    pub fn new(database: Arc<Database>, oauth: Arc<OAuthConfig>, http: Client) -> Self {
        Self {
            database,
            oauth,
            http,
            refresh_margin: Duration::seconds(TOKEN_REFRESH_MARGIN_SECS),
        }
    }

    /// Access token for a user's identity of `provider`, refreshed when close to expiry
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` when the provider is not linked and
    /// `AUTH_EXPIRED` when the token has expired and cannot be refreshed
    pub async fn ensure_fresh(&self, user_id: Uuid, provider: AuthProvider) -> AppResult<String> {
        if !provider.is_oauth() {
            return Err(AppError::invalid_input("Local identities carry no tokens"));
        }

        let identity = self
            .database
            .find_user_identity(user_id, provider)
            .await?
            .ok_or_else(|| AppError::not_found(format!("{provider} identity")))?;

        if !identity.needs_refresh(self.refresh_margin) {
            if let Some(token) = identity.access_token {
                return Ok(token);
            }
        }

        let Some(refresh_token) = identity.refresh_token.clone() else {
            return usable_or_expired(&identity, "no refresh token stored");
        };

        debug!(
            user_id = %user_id,
            provider = %provider,
            refresh_token = %redact(&refresh_token),
            "Refreshing provider access token"
        );
        match self.refresh(provider, &refresh_token).await {
            Ok(tokens) => {
                self.database
                    .update_identity_tokens(identity.id, &tokens)
                    .await?;
                AppLogger::log_oauth_event(provider.as_str(), "token_refresh", true, None);
                Ok(tokens.access_token)
            }
            Err(e) => {
                AppLogger::log_oauth_event(
                    provider.as_str(),
                    "token_refresh",
                    false,
                    Some(&e.message),
                );
                usable_or_expired(&identity, "refresh failed")
            }
        }
    }

    async fn refresh(
        &self,
        provider: AuthProvider,
        refresh_token: &str,
    ) -> AppResult<ProviderTokens> {
        let settings = self
            .oauth
            .provider(provider)
            .ok_or_else(|| AppError::config(format!("{provider} has no OAuth settings")))?;

        if provider == AuthProvider::Tiktok {
            let client = TikTokOAuthClient::from_config(settings, self.http.clone())?;
            let token = client.refresh_token(refresh_token).await?;
            return Ok(token.provider_tokens());
        }

        let config = OAuth2Config::from_provider(provider, settings)?;
        let client = OAuth2Client::new(provider, config, self.http.clone());
        Ok(client.refresh_token(refresh_token).await?.into_provider_tokens())
    }
}

/// The stored token while it is still valid, else `AUTH_EXPIRED`
fn usable_or_expired(identity: &LinkedIdentity, reason: &str) -> AppResult<String> {
    match &identity.access_token {
        Some(token) if !identity.is_token_expired() => {
            warn!(
                identity_id = %identity.id,
                provider = %identity.provider,
                reason,
                "Using access token close to expiry"
            );
            Ok(token.clone())
        }
        _ => Err(AppError::auth_expired(format!(
            "{} access token expired, sign in again",
            identity.provider
        ))),
    }
}
