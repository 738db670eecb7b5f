// ABOUTME: Google OIDC userinfo normalisation
// ABOUTME: Maps sub, email, name and picture claims to a provider profile

use super::{get_json, missing_subject, string_field, ProfileProvider};
use crate::errors::AppResult;
use crate::models::{AuthProvider, ProviderProfile};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

/// Google profile source
pub struct GoogleProfiles {
    client: Client,
    userinfo_url: String,
}

impl GoogleProfiles {
    /// Create a Google profile source
    #[must_use]
    pub const fn new(client: Client, userinfo_url: String) -> Self {
        Self {
            client,
            userinfo_url,
        }
    }
}

/// Normalise an OIDC userinfo document
///
/// # Errors
///
/// Returns an error if `sub` is missing
pub fn parse_profile(value: &Value) -> AppResult<ProviderProfile> {
    let provider_id =
        string_field(value, "sub").ok_or_else(|| missing_subject(AuthProvider::Google, "sub"))?;
    Ok(ProviderProfile {
        provider: AuthProvider::Google,
        provider_id,
        email: string_field(value, "email"),
        name: string_field(value, "name"),
        photo_url: string_field(value, "picture"),
    })
}

#[async_trait]
impl ProfileProvider for GoogleProfiles {
    fn provider(&self) -> AuthProvider {
        AuthProvider::Google
    }

    async fn fetch_profile(&self, access_token: &str) -> AppResult<ProviderProfile> {
        let value = get_json(&self.client, AuthProvider::Google, &self.userinfo_url, access_token)
            .await?;
        parse_profile(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_oidc_claims() {
        let profile = parse_profile(&json!({
            "sub": "110169484474386276334",
            "email": "ana@example.com",
            "email_verified": true,
            "name": "Ana Souza",
            "picture": "https://lh3.googleusercontent.com/a/photo"
        }))
        .unwrap();

        assert_eq!(profile.provider_id, "110169484474386276334");
        assert_eq!(profile.email.as_deref(), Some("ana@example.com"));
        assert_eq!(profile.name.as_deref(), Some("Ana Souza"));
        assert!(profile.photo_url.is_some());
    }

    #[test]
    fn test_missing_sub_is_rejected() {
        assert!(parse_profile(&json!({"email": "ana@example.com"})).is_err());
    }
}
