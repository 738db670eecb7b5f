// ABOUTME: Provider identity models linking social accounts to local users
// ABOUTME: AuthProvider kinds, linked identities with token lifecycle, and normalised profiles
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

/// Kind of identity a user can sign in with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthProvider {
    /// Email and password
    Local,
    /// Google (OIDC)
    Google,
    /// Facebook
    Facebook,
    /// GitHub
    Github,
    /// TikTok
    Tiktok,
}

impl AuthProvider {
    /// Providers that sign in through OAuth
    pub const SOCIAL: [Self; 4] = [Self::Google, Self::Facebook, Self::Github, Self::Tiktok];

    /// Stored and serialized name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "LOCAL",
            Self::Google => "GOOGLE",
            Self::Facebook => "FACEBOOK",
            Self::Github => "GITHUB",
            Self::Tiktok => "TIKTOK",
        }
    }

    /// Lowercase id used in URLs (`/oauth2/authorization/github`)
    #[must_use]
    pub const fn registration_id(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Google => "google",
            Self::Facebook => "facebook",
            Self::Github => "github",
            Self::Tiktok => "tiktok",
        }
    }

    /// Whether this provider signs in through OAuth
    #[must_use]
    pub const fn is_oauth(&self) -> bool {
        !matches!(self, Self::Local)
    }
}

impl Display for AuthProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthProvider {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOCAL" => Ok(Self::Local),
            "GOOGLE" => Ok(Self::Google),
            "FACEBOOK" => Ok(Self::Facebook),
            "GITHUB" => Ok(Self::Github),
            "TIKTOK" => Ok(Self::Tiktok),
            other => Err(AppError::invalid_input(format!(
                "Unknown identity provider: {other}"
            ))),
        }
    }
}

/// Tokens issued by a provider for one identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTokens {
    /// Access token
    pub access_token: String,
    /// Refresh token, when the provider issues one
    pub refresh_token: Option<String>,
    /// Access token expiry
    pub expires_at: Option<DateTime<Utc>>,
}

/// A provider identity linked to a local user, with decrypted tokens
#[derive(Debug, Clone)]
pub struct LinkedIdentity {
    /// Row identifier
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Provider kind
    pub provider: AuthProvider,
    /// Subject id at the provider; `None` for [`AuthProvider::Local`]
    pub provider_id: Option<String>,
    /// Current access token
    pub access_token: Option<String>,
    /// Current refresh token
    pub refresh_token: Option<String>,
    /// Access token expiry
    pub token_expires_at: Option<DateTime<Utc>>,
    /// When the identity was linked
    pub linked_at: DateTime<Utc>,
    /// Last login through this identity
    pub last_used_at: DateTime<Utc>,
}

impl LinkedIdentity {
    /// Whether the access token has already expired
    #[must_use]
    pub fn is_token_expired(&self) -> bool {
        self.token_expires_at.is_some_and(|exp| exp <= Utc::now())
    }

    /// Whether the access token expires within `margin`
    #[must_use]
    pub fn expires_within(&self, margin: Duration) -> bool {
        self.token_expires_at
            .is_some_and(|exp| exp <= Utc::now() + margin)
    }

    /// Whether a refresh should be attempted before using the access token
    #[must_use]
    pub fn needs_refresh(&self, margin: Duration) -> bool {
        self.access_token.is_none() || self.expires_within(margin)
    }
}

/// Values for inserting a new identity
#[derive(Debug, Clone)]
pub struct NewIdentity {
    /// Owning user
    pub user_id: Uuid,
    /// Provider kind
    pub provider: AuthProvider,
    /// Subject id at the provider
    pub provider_id: Option<String>,
    /// Initial tokens
    pub tokens: Option<ProviderTokens>,
}

/// A provider's user info normalised to the fields reconciliation needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    /// Provider kind
    pub provider: AuthProvider,
    /// Stable subject id at the provider
    pub provider_id: String,
    /// Email, when the provider disclosed one
    pub email: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Profile picture URL
    pub photo_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(expires_in: Option<i64>) -> LinkedIdentity {
        let now = Utc::now();
        LinkedIdentity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            provider: AuthProvider::Github,
            provider_id: Some("42".into()),
            access_token: Some("token".into()),
            refresh_token: None,
            token_expires_at: expires_in.map(|s| now + Duration::seconds(s)),
            linked_at: now,
            last_used_at: now,
        }
    }

    #[test]
    fn test_provider_parsing_is_case_insensitive() {
        assert_eq!("github".parse::<AuthProvider>().unwrap(), AuthProvider::Github);
        assert_eq!("TikTok".parse::<AuthProvider>().unwrap(), AuthProvider::Tiktok);
        assert!("myspace".parse::<AuthProvider>().is_err());
        assert_eq!(AuthProvider::Facebook.to_string(), "FACEBOOK");
        assert_eq!(AuthProvider::Google.registration_id(), "google");
    }

    #[test]
    fn test_provider_serializes_upper_case() {
        let json = serde_json::to_string(&AuthProvider::Tiktok).unwrap();
        assert_eq!(json, "\"TIKTOK\"");
    }

    #[test]
    fn test_token_expiry_checks() {
        let margin = Duration::minutes(5);
        assert!(!identity(None).is_token_expired());
        assert!(!identity(None).needs_refresh(margin));
        assert!(identity(Some(-10)).is_token_expired());
        assert!(identity(Some(60)).needs_refresh(margin));
        assert!(!identity(Some(3600)).needs_refresh(margin));
    }
}
