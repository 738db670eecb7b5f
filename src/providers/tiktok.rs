// ABOUTME: TikTok user info normalisation
// ABOUTME: TikTok never discloses an email, so accounts get an open_id placeholder address

use super::{get_json, missing_subject, string_field, ProfileProvider};
use crate::constants::display::TIKTOK_EMAIL_DOMAIN;
use crate::errors::{AppError, AppResult};
use crate::models::{AuthProvider, ProviderProfile};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

/// TikTok profile source
pub struct TikTokProfiles {
    client: Client,
    userinfo_url: String,
}

impl TikTokProfiles {
    /// Create a TikTok profile source
    #[must_use]
    pub const fn new(client: Client, userinfo_url: String) -> Self {
        Self {
            client,
            userinfo_url,
        }
    }
}

/// Placeholder email for a TikTok account
#[must_use]
pub fn placeholder_email(open_id: &str) -> String {
    format!("{open_id}@{TIKTOK_EMAIL_DOMAIN}")
}

/// Name given to TikTok accounts without a display name
#[must_use]
pub fn fallback_name(open_id: &str) -> String {
    let short: String = open_id.chars().take(8).collect();
    format!("TikTok User {short}")
}

/// Profile built from the token response alone
#[must_use]
pub fn profile_from_open_id(open_id: &str) -> ProviderProfile {
    ProviderProfile {
        provider: AuthProvider::Tiktok,
        provider_id: open_id.to_owned(),
        email: Some(placeholder_email(open_id)),
        name: Some(fallback_name(open_id)),
        photo_url: None,
    }
}

/// Normalise a `/v2/user/info/` document
///
/// # Errors
///
/// Returns an error if TikTok reports an error or `data.user.open_id` is missing
pub fn parse_profile(value: &Value) -> AppResult<ProviderProfile> {
    if let Some(code) = value
        .pointer("/error/code")
        .and_then(Value::as_str)
        .filter(|c| *c != "ok")
    {
        let message = value
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(AppError::external_service(
            AuthProvider::Tiktok.as_str(),
            format!("User info error {code}: {message}"),
        ));
    }

    let user = value
        .pointer("/data/user")
        .ok_or_else(|| missing_subject(AuthProvider::Tiktok, "data.user"))?;
    let open_id = string_field(user, "open_id")
        .ok_or_else(|| missing_subject(AuthProvider::Tiktok, "open_id"))?;

    Ok(ProviderProfile {
        provider: AuthProvider::Tiktok,
        email: Some(placeholder_email(&open_id)),
        name: string_field(user, "display_name").or_else(|| Some(fallback_name(&open_id))),
        photo_url: string_field(user, "avatar_url"),
        provider_id: open_id,
    })
}

#[async_trait]
impl ProfileProvider for TikTokProfiles {
    fn provider(&self) -> AuthProvider {
        AuthProvider::Tiktok
    }

    async fn fetch_profile(&self, access_token: &str) -> AppResult<ProviderProfile> {
        let value = get_json(&self.client, AuthProvider::Tiktok, &self.userinfo_url, access_token)
            .await?;
        parse_profile(&value)
    }
}
