// ABOUTME: GitHub user normalisation with email-list fallback
// ABOUTME: Private emails are resolved through /user/emails, preferring primary and verified

use super::{get_json, id_field, missing_subject, string_field, ProfileProvider};
use crate::errors::AppResult;
use crate::models::{AuthProvider, ProviderProfile};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// One entry of `GET /user/emails`
#[derive(Debug, Clone, Deserialize)]
pub struct GithubEmail {
    /// Address
    pub email: String,
    /// Primary address of the account
    #[serde(default)]
    pub primary: bool,
    /// Address ownership confirmed
    #[serde(default)]
    pub verified: bool,
}

/// GitHub profile source
pub struct GithubProfiles {
    client: Client,
    userinfo_url: String,
    emails_url: String,
}

impl GithubProfiles {
    /// Create a GitHub profile source
    #[must_use]
    pub const fn new(client: Client, userinfo_url: String, emails_url: String) -> Self {
        Self {
            client,
            userinfo_url,
            emails_url,
        }
    }

    async fn fetch_emails(&self, access_token: &str) -> AppResult<Vec<GithubEmail>> {
        let value = get_json(&self.client, AuthProvider::Github, &self.emails_url, access_token)
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Normalise a `GET /user` document; `name` falls back to `login`
///
/// # Errors
///
/// Returns an error if `id` is missing
pub fn parse_profile(value: &Value) -> AppResult<ProviderProfile> {
    let provider_id =
        id_field(value, "id").ok_or_else(|| missing_subject(AuthProvider::Github, "id"))?;
    Ok(ProviderProfile {
        provider: AuthProvider::Github,
        provider_id,
        email: string_field(value, "email"),
        name: string_field(value, "name").or_else(|| string_field(value, "login")),
        photo_url: string_field(value, "avatar_url"),
    })
}

/// Primary verified address, else the first verified one
#[must_use]
pub fn select_email(emails: &[GithubEmail]) -> Option<String> {
    emails
        .iter()
        .find(|e| e.primary && e.verified)
        .or_else(|| emails.iter().find(|e| e.verified))
        .map(|e| e.email.clone())
}

#[async_trait]
impl ProfileProvider for GithubProfiles {
    fn provider(&self) -> AuthProvider {
        AuthProvider::Github
    }

    async fn fetch_profile(&self, access_token: &str) -> AppResult<ProviderProfile> {
        let value = get_json(&self.client, AuthProvider::Github, &self.userinfo_url, access_token)
            .await?;
        let mut profile = parse_profile(&value)?;

        if profile.email.is_none() {
            debug!(
                github_id = %profile.provider_id,
                "GitHub profile email is private, listing emails"
            );
            match self.fetch_emails(access_token).await {
                Ok(emails) => profile.email = select_email(&emails),
                Err(e) => warn!(error = %e, "Failed to list GitHub emails"),
            }
        }
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn email(address: &str, primary: bool, verified: bool) -> GithubEmail {
        GithubEmail {
            email: address.into(),
            primary,
            verified,
        }
    }

    #[test]
    fn test_parse_numeric_id_and_login_fallback() {
        let profile = parse_profile(&json!({
            "login": "octocat",
            "id": 583_231,
            "name": null,
            "email": null,
            "avatar_url": "https://avatars.githubusercontent.com/u/583231?v=4"
        }))
        .unwrap();

        assert_eq!(profile.provider_id, "583231");
        assert_eq!(profile.name.as_deref(), Some("octocat"));
        assert!(profile.email.is_none());
        assert!(profile.photo_url.is_some());
    }

    #[test]
    fn test_select_email_prefers_primary_verified() {
        let emails = vec![
            email("old@example.com", false, true),
            email("unverified@example.com", true, false),
            email("main@example.com", true, true),
        ];
        assert_eq!(select_email(&emails).as_deref(), Some("main@example.com"));
    }

    #[test]
    fn test_select_email_falls_back_to_first_verified() {
        let emails = vec![
            email("primary@example.com", true, false),
            email("first@example.com", false, true),
            email("second@example.com", false, true),
        ];
        assert_eq!(select_email(&emails).as_deref(), Some("first@example.com"));
        assert_eq!(select_email(&[email("x@example.com", true, false)]), None);
    }
}
