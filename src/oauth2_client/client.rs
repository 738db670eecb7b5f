// ABOUTME: OAuth2 authorization-code client for social login providers
// ABOUTME: Builds authorization URLs, exchanges codes with optional PKCE and refreshes tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::config::OAuthProviderConfig;
use crate::constants::oauth::STATE_BYTES;
use crate::errors::{AppError, AppResult};
use crate::logging::redact;
use crate::models::{AuthProvider, ProviderTokens};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::{Rng, RngCore};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use url::Url;

/// Length of a generated PKCE code verifier
const CODE_VERIFIER_LENGTH: usize = 64;

/// OAuth 2.0 client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2Config {
    /// OAuth client ID from provider
    pub client_id: String,
    /// OAuth client secret from provider
    #[serde(skip_serializing)]
    pub client_secret: String,
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
    /// Redirect URI for OAuth callbacks
    pub redirect_uri: String,
    /// OAuth scopes to request
    pub scopes: Vec<String>,
    /// Whether to use PKCE for enhanced security
    pub use_pkce: bool,
}

impl OAuth2Config {
    /// Build from provider configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the provider is disabled or lacks credentials
    pub fn from_provider(provider: AuthProvider, config: &OAuthProviderConfig) -> AppResult<Self> {
        let (Some(client_id), Some(client_secret)) = (&config.client_id, &config.client_secret)
        else {
            return Err(AppError::config(format!(
                "OAuth provider {provider} is not configured"
            )));
        };
        if !config.enabled {
            return Err(AppError::config(format!("OAuth provider {provider} is disabled")));
        }

        Ok(Self {
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
            use_pkce: config.use_pkce,
        })
    }
}

/// `PKCE` (Proof Key for Code Exchange) parameters
#[derive(Debug, Clone)]
pub struct PkceParams {
    /// Randomly generated code verifier (43-128 characters)
    pub code_verifier: String,
    /// SHA256 hash of code verifier, base64url encoded
    pub code_challenge: String,
    /// Challenge method (always "S256" for SHA256)
    pub code_challenge_method: String,
}

impl PkceParams {
    /// Generate `PKCE` parameters with `S256` challenge method
    #[must_use]
    pub fn generate() -> Self {
        const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";
        let mut rng = rand::thread_rng();
        let code_verifier: String = (0..CODE_VERIFIER_LENGTH)
            .map(|_| char::from(CHARS[rng.gen_range(0..CHARS.len())]))
            .collect();

        Self {
            code_challenge: challenge_for(&code_verifier),
            code_verifier,
            code_challenge_method: "S256".into(),
        }
    }
}

/// S256 challenge for a code verifier
#[must_use]
pub fn challenge_for(code_verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()))
}

/// Random `state` value: 16 bytes, base64url without padding
#[must_use]
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// OAuth 2.0 access token with expiration and refresh capabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2Token {
    /// The access token string
    pub access_token: String,
    /// Token type (usually "Bearer")
    pub token_type: String,
    /// Expiration timestamp (UTC)
    pub expires_at: Option<DateTime<Utc>>,
    /// Optional refresh token for getting new access tokens
    pub refresh_token: Option<String>,
    /// Granted OAuth scopes
    pub scope: Option<String>,
}

impl OAuth2Token {
    /// Tokens in the form persisted on a linked identity
    #[must_use]
    pub fn into_provider_tokens(self) -> ProviderTokens {
        ProviderTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_at,
        }
    }
}

/// Generic `OAuth2` client
#[derive(Debug, Clone)]
pub struct OAuth2Client {
    provider: AuthProvider,
    config: OAuth2Config,
    client: Client,
}

impl OAuth2Client {
    /// Create a new `OAuth2` client
    #[must_use]
    pub const fn new(provider: AuthProvider, config: OAuth2Config, client: Client) -> Self {
        Self {
            provider,
            config,
            client,
        }
    }

    /// Client configuration
    #[must_use]
    pub const fn config(&self) -> &OAuth2Config {
        &self.config
    }

    /// Get authorization `URL`, with a `PKCE` challenge when configured
    ///
    /// # Errors
    ///
    /// Returns an error if the authorization URL is malformed
    pub fn get_authorization_url(
        &self,
        state: &str,
        pkce: Option<&PkceParams>,
    ) -> AppResult<String> {
        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AppError::config(format!("Invalid auth URL: {e}")))?;

        {
            let mut query_pairs = url.query_pairs_mut();
            query_pairs
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", &self.config.redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("scope", &self.config.scopes.join(" "))
                .append_pair("state", state);

            if let Some(pkce) = pkce.filter(|_| self.config.use_pkce) {
                query_pairs
                    .append_pair("code_challenge", &pkce.code_challenge)
                    .append_pair("code_challenge_method", &pkce.code_challenge_method);
            }
        }

        Ok(url.to_string())
    }

    /// Exchange authorization code for tokens
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the provider rejects the code
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> AppResult<OAuth2Token> {
        let mut params = vec![
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        if let Some(verifier) = code_verifier {
            params.push(("code_verifier", verifier));
        }

        debug!(provider = %self.provider, code = %redact(code), "Exchanging authorization code");
        self.token_request(&params).await
    }

    /// Refresh an expired access token
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the provider rejects the refresh token
    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<OAuth2Token> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        self.token_request(&params).await
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> AppResult<OAuth2Token> {
        let response = self
            .client
            .post(&self.config.token_url)
            .header(ACCEPT, "application/json")
            .form(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            AppError::external_service(
                self.provider.as_str(),
                format!("Unreadable token response (HTTP {status}): {e}"),
            )
        })?;

        if let Some(error) = parsed.error {
            warn!(provider = %self.provider, error = %error, "Token endpoint returned an error");
            let description = parsed.error_description.unwrap_or_default();
            return Err(AppError::external_auth_failed(
                self.provider.as_str(),
                format!("{error} {description}").trim().to_owned(),
            ));
        }
        if !status.is_success() {
            return Err(AppError::external_auth_failed(
                self.provider.as_str(),
                format!("Token endpoint returned HTTP {status}"),
            ));
        }

        let access_token = parsed.access_token.filter(|t| !t.is_empty()).ok_or_else(|| {
            AppError::external_service(self.provider.as_str(), "Token response lacks access_token")
        })?;

        Ok(OAuth2Token {
            access_token,
            token_type: parsed.token_type.unwrap_or_else(|| "Bearer".into()),
            expires_at: parsed
                .expires_in
                .as_ref()
                .and_then(seconds_from_value)
                .map(|secs| Utc::now() + Duration::seconds(secs)),
            refresh_token: parsed.refresh_token.filter(|t| !t.is_empty()),
            scope: parsed.scope,
        })
    }
}

/// Token lifetime as a number or a numeric string
pub(crate) fn seconds_from_value(value: &serde_json::Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        .filter(|secs| *secs > 0)
}

/// OAuth 2.0 token response from provider
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<serde_json::Value>,
    refresh_token: Option<String>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(use_pkce: bool) -> OAuth2Client {
        OAuth2Client::new(
            AuthProvider::Google,
            OAuth2Config {
                client_id: "client-123".into(),
                client_secret: "secret".into(),
                auth_url: "https://accounts.example.com/o/oauth2/auth".into(),
                token_url: "https://accounts.example.com/token".into(),
                redirect_uri: "http://localhost:8080/login/oauth2/code/google".into(),
                scopes: vec!["openid".into(), "email".into()],
                use_pkce,
            },
            Client::new(),
        )
    }

    #[test]
    fn test_pkce_challenge_matches_verifier() {
        let pkce = PkceParams::generate();
        assert_eq!(pkce.code_verifier.len(), CODE_VERIFIER_LENGTH);
        assert_eq!(pkce.code_challenge, challenge_for(&pkce.code_verifier));
        assert_eq!(pkce.code_challenge_method, "S256");
        // RFC 7636 appendix B
        assert_eq!(
            challenge_for("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_state_is_url_safe_and_unique() {
        let a = generate_state();
        assert_eq!(a.len(), 22);
        assert!(!a.contains('=') && !a.contains('+') && !a.contains('/'));
        assert_ne!(a, generate_state());
    }

    #[test]
    fn test_authorization_url_with_pkce() {
        let pkce = PkceParams::generate();
        let url = client(true)
            .get_authorization_url("st", Some(&pkce))
            .unwrap();
        let url = Url::parse(&url).unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "client-123");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["scope"], "openid email");
        assert_eq!(pairs["state"], "st");
        assert_eq!(pairs["code_challenge"], pkce.code_challenge);
    }

    #[test]
    fn test_authorization_url_skips_pkce_when_disabled() {
        let pkce = PkceParams::generate();
        let url = client(false).get_authorization_url("st", Some(&pkce)).unwrap();
        assert!(!url.contains("code_challenge"));
    }

    #[test]
    fn test_expires_in_accepts_strings() {
        assert_eq!(seconds_from_value(&serde_json::json!(3600)), Some(3600));
        assert_eq!(seconds_from_value(&serde_json::json!("5183944")), Some(5_183_944));
        assert_eq!(seconds_from_value(&serde_json::json!(0)), None);
    }
}
