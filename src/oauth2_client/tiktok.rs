// ABOUTME: TikTok Login Kit OAuth client
// ABOUTME: TikTok names the client id client_key and returns open_id with the token

use super::client::seconds_from_value;
use crate::config::OAuthProviderConfig;
use crate::errors::{AppError, AppResult};
use crate::logging::redact;
use crate::models::{AuthProvider, ProviderTokens};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

/// Tokens TikTok issued for one user
#[derive(Debug, Clone)]
pub struct TikTokToken {
    /// Access token
    pub access_token: String,
    /// Refresh token
    pub refresh_token: Option<String>,
    /// Access token expiry
    pub expires_at: Option<DateTime<Utc>>,
    /// TikTok user id scoped to this application
    pub open_id: String,
    /// Granted scopes (comma separated)
    pub scope: Option<String>,
}

impl TikTokToken {
    /// Tokens in the form persisted on a linked identity
    #[must_use]
    pub fn provider_tokens(&self) -> ProviderTokens {
        ProviderTokens {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at: self.expires_at,
        }
    }
}

/// Raw TikTok token endpoint response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TikTokTokenResponse {
    /// Access token
    pub access_token: Option<String>,
    /// Refresh token
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds
    pub expires_in: Option<serde_json::Value>,
    /// TikTok user id
    pub open_id: Option<String>,
    /// Granted scopes
    pub scope: Option<String>,
    /// Error code on failure
    pub error: Option<String>,
    /// Error description on failure
    pub error_description: Option<String>,
}

impl TikTokTokenResponse {
    /// Complete token, or `None` when `access_token` or `open_id` is missing
    #[must_use]
    pub fn into_token(self) -> Option<TikTokToken> {
        let access_token = self.access_token.filter(|t| !t.is_empty())?;
        let open_id = self.open_id.filter(|id| !id.is_empty())?;
        Some(TikTokToken {
            access_token,
            refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
            expires_at: self
                .expires_in
                .as_ref()
                .and_then(seconds_from_value)
                .map(|secs| Utc::now() + Duration::seconds(secs)),
            open_id,
            scope: self.scope,
        })
    }
}

/// TikTok OAuth client
#[derive(Debug, Clone)]
pub struct TikTokOAuthClient {
    client_key: String,
    client_secret: String,
    auth_url: String,
    token_url: String,
    redirect_uri: String,
    scopes: Vec<String>,
    client: Client,
}

impl TikTokOAuthClient {
    /// Build from provider configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if TikTok is disabled or lacks credentials
    pub fn from_config(config: &OAuthProviderConfig, client: Client) -> AppResult<Self> {
        let (Some(client_key), Some(client_secret)) = (&config.client_id, &config.client_secret)
        else {
            return Err(AppError::config("TikTok client key and secret are not configured"));
        };
        Ok(Self {
            client_key: client_key.clone(),
            client_secret: client_secret.clone(),
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
            client,
        })
    }

    /// Authorization URL for the TikTok consent screen
    ///
    /// # Errors
    ///
    /// Returns an error if the authorization URL is malformed
    pub fn get_authorization_url(&self, state: &str) -> AppResult<String> {
        let mut url = Url::parse(&self.auth_url)
            .map_err(|e| AppError::config(format!("Invalid TikTok auth URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("client_key", &self.client_key)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scopes.join(","))
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("state", state);
        Ok(url.to_string())
    }

    /// Exchange an authorization code
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or TikTok reports an `error`
    pub async fn exchange_code(&self, code: &str) -> AppResult<TikTokTokenResponse> {
        debug!(code = %redact(code), "Exchanging TikTok authorization code");
        let params = [
            ("client_key", self.client_key.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        self.token_request(&params).await
    }

    /// Refresh an access token
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is incomplete
    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<TikTokToken> {
        let params = [
            ("client_key", self.client_key.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        self.token_request(&params).await?.into_token().ok_or_else(|| {
            AppError::external_service(
                AuthProvider::Tiktok.as_str(),
                "Refresh response lacks access_token or open_id",
            )
        })
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> AppResult<TikTokTokenResponse> {
        let response = self
            .client
            .post(&self.token_url)
            .form(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: TikTokTokenResponse = serde_json::from_str(&body).map_err(|e| {
            AppError::external_service(
                AuthProvider::Tiktok.as_str(),
                format!("Unreadable token response (HTTP {status}): {e}"),
            )
        })?;

        if let Some(error) = parsed.error.as_deref().filter(|e| !e.is_empty()) {
            let description = parsed.error_description.as_deref().unwrap_or_default();
            warn!(error = %error, description = %description, "TikTok token request rejected");
            return Err(AppError::external_auth_failed(
                AuthProvider::Tiktok.as_str(),
                format!("{error}: {description}"),
            ));
        }
        if !status.is_success() {
            return Err(AppError::external_auth_failed(
                AuthProvider::Tiktok.as_str(),
                format!("Token endpoint returned HTTP {status}"),
            ));
        }

        Ok(parsed)
    }
}
