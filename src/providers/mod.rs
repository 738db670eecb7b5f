// ABOUTME: Identity provider profile integrations
// ABOUTME: Normalises Google, Facebook, GitHub and TikTok user info into one profile shape
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Profile providers
//!
//! After a code exchange each provider is asked for the signed-in user's
//! profile. Every provider shapes that payload differently; the
//! implementations here reduce it to a [`ProviderProfile`].

use crate::config::OAuthConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{AuthProvider, ProviderProfile};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde_json::Value;

/// Facebook Graph profile
pub mod facebook;
/// GitHub user and email list
pub mod github;
/// Google OIDC userinfo
pub mod google;
/// TikTok user info
pub mod tiktok;

/// Fetches and normalises the signed-in user's profile
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    /// Provider kind
    fn provider(&self) -> AuthProvider;

    /// Fetch the profile for an access token
    async fn fetch_profile(&self, access_token: &str) -> AppResult<ProviderProfile>;
}

/// Create the profile provider for a social login
///
/// # Errors
///
/// Returns an error for [`AuthProvider::Local`]
pub fn create_profile_provider(
    provider: AuthProvider,
    config: &OAuthConfig,
    client: Client,
) -> AppResult<Box<dyn ProfileProvider>> {
    match provider {
        AuthProvider::Google => Ok(Box::new(google::GoogleProfiles::new(
            client,
            config.google.userinfo_url.clone(),
        ))),
        AuthProvider::Facebook => Ok(Box::new(facebook::FacebookProfiles::new(
            client,
            config.facebook.userinfo_url.clone(),
        ))),
        AuthProvider::Github => Ok(Box::new(github::GithubProfiles::new(
            client,
            config.github.userinfo_url.clone(),
            config.github_emails_url.clone(),
        ))),
        AuthProvider::Tiktok => Ok(Box::new(tiktok::TikTokProfiles::new(
            client,
            config.tiktok.userinfo_url.clone(),
        ))),
        AuthProvider::Local => Err(AppError::invalid_input(
            "Local accounts have no provider profile",
        )),
    }
}

/// GET a JSON document with a bearer token
///
/// # Errors
///
/// Returns an external service error on transport failure or a non-2xx status
pub(crate) async fn get_json(
    client: &Client,
    provider: AuthProvider,
    url: &str,
    access_token: &str,
) -> AppResult<Value> {
    let response = client
        .get(url)
        .bearer_auth(access_token)
        .header(ACCEPT, "application/json")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::external_service(
            provider.as_str(),
            format!("Profile request failed with HTTP {status}: {body}"),
        ));
    }
    Ok(response.json().await?)
}

/// Owned, non-empty string field
pub(crate) fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Subject id that may arrive as a string or a number
pub(crate) fn id_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn missing_subject(provider: AuthProvider, key: &str) -> AppError {
    AppError::external_service(
        provider.as_str(),
        format!("Profile response lacks subject field `{key}`"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_helpers() {
        let value = json!({"id": 583_231, "sub": "abc", "name": "  ", "email": "a@b.c"});
        assert_eq!(id_field(&value, "id").as_deref(), Some("583231"));
        assert_eq!(id_field(&value, "sub").as_deref(), Some("abc"));
        assert_eq!(string_field(&value, "name"), None);
        assert_eq!(string_field(&value, "email").as_deref(), Some("a@b.c"));
        assert_eq!(string_field(&value, "missing"), None);
    }

    #[test]
    fn test_local_has_no_profile_provider() {
        let result = create_profile_provider(
            AuthProvider::Local,
            &OAuthConfig::default(),
            Client::new(),
        );
        assert!(result.is_err());
    }
}
