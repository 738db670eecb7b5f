// ABOUTME: OAuth configuration types for social login providers
// ABOUTME: Handles Google, Facebook, GitHub and TikTok client credentials and endpoint overrides
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::environment::{env_var_or, parse_scopes};
use crate::constants::endpoints;
use crate::models::AuthProvider;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env;
use tracing::{info, warn};

/// Default scopes requested from each provider
const GOOGLE_DEFAULT_SCOPES: &str = "openid,email,profile";
const FACEBOOK_DEFAULT_SCOPES: &str = "email,public_profile";
const GITHUB_DEFAULT_SCOPES: &str = "read:user,user:email";
const TIKTOK_DEFAULT_SCOPES: &str = "user.info.basic,video.upload";

/// Identity provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OAuthConfig {
    /// Google OAuth configuration
    pub google: OAuthProviderConfig,
    /// Facebook OAuth configuration
    pub facebook: OAuthProviderConfig,
    /// GitHub OAuth configuration
    pub github: OAuthProviderConfig,
    /// TikTok OAuth configuration (`client_id` holds the TikTok client key)
    pub tiktok: OAuthProviderConfig,
    /// GitHub email list endpoint used when the profile hides the email
    pub github_emails_url: String,
    /// TikTok content API base URL
    pub tiktok_api_base: String,
}

impl OAuthConfig {
    /// Load provider configuration from environment
    #[must_use]
    pub fn from_env(base_url: &str) -> Self {
        Self {
            google: OAuthProviderConfig::load(
                "GOOGLE",
                base_url,
                "/login/oauth2/code/google",
                GOOGLE_DEFAULT_SCOPES,
                [
                    endpoints::GOOGLE_AUTH_URL,
                    endpoints::GOOGLE_TOKEN_URL,
                    endpoints::GOOGLE_USERINFO_URL,
                ],
            )
            .with_pkce(),
            facebook: OAuthProviderConfig::load(
                "FACEBOOK",
                base_url,
                "/login/oauth2/code/facebook",
                FACEBOOK_DEFAULT_SCOPES,
                [
                    endpoints::FACEBOOK_AUTH_URL,
                    endpoints::FACEBOOK_TOKEN_URL,
                    endpoints::FACEBOOK_USERINFO_URL,
                ],
            ),
            github: OAuthProviderConfig::load(
                "GITHUB",
                base_url,
                "/login/oauth2/code/github",
                GITHUB_DEFAULT_SCOPES,
                [
                    endpoints::GITHUB_AUTH_URL,
                    endpoints::GITHUB_TOKEN_URL,
                    endpoints::GITHUB_USERINFO_URL,
                ],
            ),
            tiktok: OAuthProviderConfig::load_tiktok(base_url),
            github_emails_url: env_var_or("GITHUB_EMAILS_URL", endpoints::GITHUB_EMAILS_URL),
            tiktok_api_base: env_var_or("TIKTOK_API_BASE", endpoints::TIKTOK_API_BASE)
                .trim_end_matches('/')
                .to_owned(),
        }
    }

    /// Configuration for a social provider, `None` for [`AuthProvider::Local`]
    #[must_use]
    pub const fn provider(&self, provider: AuthProvider) -> Option<&OAuthProviderConfig> {
        match provider {
            AuthProvider::Google => Some(&self.google),
            AuthProvider::Facebook => Some(&self.facebook),
            AuthProvider::Github => Some(&self.github),
            AuthProvider::Tiktok => Some(&self.tiktok),
            AuthProvider::Local => None,
        }
    }

    /// Providers with complete credentials
    #[must_use]
    pub fn enabled_providers(&self) -> Vec<AuthProvider> {
        AuthProvider::SOCIAL
            .into_iter()
            .filter(|p| self.provider(*p).is_some_and(|c| c.enabled))
            .collect()
    }

    /// Log diagnostics for every provider
    pub fn validate_and_log(&self) {
        for provider in AuthProvider::SOCIAL {
            if let Some(config) = self.provider(provider) {
                config.validate_and_log(provider.as_str());
            }
        }
    }
}

/// OAuth provider-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OAuthProviderConfig {
    /// OAuth client ID
    pub client_id: Option<String>,
    /// OAuth client secret
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    /// OAuth redirect URI
    pub redirect_uri: String,
    /// OAuth scopes
    pub scopes: Vec<String>,
    /// Authorization endpoint
    pub auth_url: String,
    /// Token endpoint
    pub token_url: String,
    /// User info endpoint
    pub userinfo_url: String,
    /// Send a PKCE challenge with the authorization request
    pub use_pkce: bool,
    /// Enable this provider
    pub enabled: bool,
}

impl OAuthProviderConfig {
    /// Load a provider from `{PREFIX}_*` environment variables
    ///
    /// `defaults` holds the authorization, token and user info endpoints.
    #[must_use]
    pub fn load(
        prefix: &str,
        base_url: &str,
        callback_path: &str,
        default_scopes: &str,
        defaults: [&str; 3],
    ) -> Self {
        let client_id = non_empty_var(&format!("{prefix}_CLIENT_ID"));
        let client_secret = non_empty_var(&format!("{prefix}_CLIENT_SECRET"));
        let scopes = env::var(format!("{prefix}_SCOPES"))
            .map_or_else(|_| parse_scopes(default_scopes, ','), |s| parse_scopes(&s, ','));

        Self {
            enabled: client_id.is_some() && client_secret.is_some(),
            client_id,
            client_secret,
            redirect_uri: env_var_or(
                &format!("{prefix}_REDIRECT_URI"),
                &format!("{base_url}{callback_path}"),
            ),
            scopes,
            auth_url: env_var_or(&format!("{prefix}_AUTH_URL"), defaults[0]),
            token_url: env_var_or(&format!("{prefix}_TOKEN_URL"), defaults[1]),
            userinfo_url: env_var_or(&format!("{prefix}_USERINFO_URL"), defaults[2]),
            use_pkce: false,
        }
    }

    /// Load TikTok, which names its client id `client_key`
    #[must_use]
    pub fn load_tiktok(base_url: &str) -> Self {
        let client_id = non_empty_var("TIKTOK_CLIENT_KEY");
        let client_secret = non_empty_var("TIKTOK_CLIENT_SECRET");
        let scopes = env::var("TIKTOK_SCOPE").map_or_else(
            |_| parse_scopes(TIKTOK_DEFAULT_SCOPES, ','),
            |s| parse_scopes(&s, ','),
        );

        Self {
            enabled: client_id.is_some() && client_secret.is_some(),
            client_id,
            client_secret,
            redirect_uri: env_var_or(
                "TIKTOK_REDIRECT_URI",
                &format!("{base_url}/auth/tiktok/callback/"),
            ),
            scopes,
            auth_url: env_var_or("TIKTOK_AUTH_URL", endpoints::TIKTOK_AUTH_URL),
            token_url: env_var_or("TIKTOK_TOKEN_URL", endpoints::TIKTOK_TOKEN_URL),
            userinfo_url: env_var_or("TIKTOK_USERINFO_URL", endpoints::TIKTOK_USERINFO_URL),
            use_pkce: false,
        }
    }

    /// Request a PKCE challenge on authorization
    #[must_use]
    pub const fn with_pkce(mut self) -> Self {
        self.use_pkce = true;
        self
    }

    /// Compute SHA256 fingerprint of client secret for debugging (first 8 hex chars)
    #[must_use]
    pub fn secret_fingerprint(&self) -> Option<String> {
        self.client_secret.as_ref().map(|secret| {
            let digest = Sha256::digest(secret.as_bytes());
            hex::encode(digest).chars().take(8).collect()
        })
    }

    /// Validate OAuth credentials and log diagnostics
    ///
    /// Returns true if credentials appear usable or the provider is disabled
    pub fn validate_and_log(&self, provider_name: &str) -> bool {
        if !self.enabled {
            info!("OAuth provider {provider_name} is disabled");
            return true;
        }

        let (Some(client_id), Some(secret)) = (&self.client_id, &self.client_secret) else {
            warn!("OAuth provider {provider_name}: credentials are incomplete");
            return false;
        };

        let fingerprint = self
            .secret_fingerprint()
            .unwrap_or_else(|| "none".to_owned());
        info!(
            "OAuth provider {provider_name}: enabled=true, client_id={client_id}, \
             secret_length={}, secret_fingerprint={fingerprint}, redirect_uri={}",
            secret.len(),
            self.redirect_uri
        );

        if url::Url::parse(&self.redirect_uri).is_err() {
            warn!("OAuth provider {provider_name}: redirect_uri is not an absolute URL");
            return false;
        }
        true
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
