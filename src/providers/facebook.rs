// ABOUTME: Facebook Graph profile normalisation
// ABOUTME: Picture URL is nested under picture.data.url

use super::{get_json, id_field, missing_subject, string_field, ProfileProvider};
use crate::errors::AppResult;
use crate::models::{AuthProvider, ProviderProfile};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

/// Facebook profile source
pub struct FacebookProfiles {
    client: Client,
    userinfo_url: String,
}

impl FacebookProfiles {
    /// Create a Facebook profile source
    #[must_use]
    pub const fn new(client: Client, userinfo_url: String) -> Self {
        Self {
            client,
            userinfo_url,
        }
    }
}

/// Normalise a Graph `/me` document
///
/// # Errors
///
/// Returns an error if `id` is missing
pub fn parse_profile(value: &Value) -> AppResult<ProviderProfile> {
    let provider_id =
        id_field(value, "id").ok_or_else(|| missing_subject(AuthProvider::Facebook, "id"))?;
    let photo_url = value
        .pointer("/picture/data/url")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned);

    Ok(ProviderProfile {
        provider: AuthProvider::Facebook,
        provider_id,
        email: string_field(value, "email"),
        name: string_field(value, "name"),
        photo_url,
    })
}

#[async_trait]
impl ProfileProvider for FacebookProfiles {
    fn provider(&self) -> AuthProvider {
        AuthProvider::Facebook
    }

    async fn fetch_profile(&self, access_token: &str) -> AppResult<ProviderProfile> {
        let value = get_json(
            &self.client,
            AuthProvider::Facebook,
            &self.userinfo_url,
            access_token,
        )
        .await?;
        parse_profile(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_nested_picture() {
        let profile = parse_profile(&json!({
            "id": "10224483921",
            "name": "Bruno Lima",
            "email": "bruno@example.com",
            "picture": {"data": {
                "height": 50,
                "is_silhouette": false,
                "url": "https://platform-lookaside.fbsbx.com/p.jpg"
            }}
        }))
        .unwrap();

        assert_eq!(profile.provider_id, "10224483921");
        assert_eq!(
            profile.photo_url.as_deref(),
            Some("https://platform-lookaside.fbsbx.com/p.jpg")
        );
    }

    #[test]
    fn test_email_may_be_withheld() {
        let profile = parse_profile(&json!({"id": "1", "name": "No Email"})).unwrap();
        assert!(profile.email.is_none());
        assert!(profile.photo_url.is_none());
    }
}
