// ABOUTME: Account reconciliation for local and social logins
// ABOUTME: Decides whether a login reuses, links to, or creates a user account
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Identity service
//!
//! Every successful provider login lands here. The service looks the identity
//! up by provider subject first, then by email, and only then creates a new
//! account, so that one person signing in through several providers ends up
//! with a single user carrying several linked identities.

use crate::auth::{hash_password, verify_password};
use crate::constants::login_errors::SOCIAL_ACCOUNT;
use crate::constants::oauth::MIN_PASSWORD_LENGTH;
use crate::database::{Database, DatabaseError, DatabaseResult};
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::logging::AppLogger;
use crate::models::{AuthProvider, NewIdentity, ProviderProfile, ProviderTokens, User};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// A completed provider login to reconcile
#[derive(Debug, Clone)]
pub struct OAuthLogin {
    /// Provider that authenticated the user
    pub provider: AuthProvider,
    /// Subject at the provider
    pub provider_id: String,
    /// Email reported by the provider, normalised
    pub email: String,
    /// Display name
    pub name: Option<String>,
    /// Avatar URL
    pub photo_url: Option<String>,
    /// Tokens from the code exchange
    pub tokens: Option<ProviderTokens>,
}

impl OAuthLogin {
    /// Build a login from a normalised profile
    ///
    /// # Errors
    ///
    /// Returns `MISSING_REQUIRED_FIELD` when the profile carries no email
    pub fn from_profile(
        profile: ProviderProfile,
        tokens: Option<ProviderTokens>,
    ) -> AppResult<Self> {
        let email = profile
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AppError::missing_field("email"))?;

        Ok(Self {
            provider: profile.provider,
            provider_id: profile.provider_id,
            email,
            name: profile.name,
            photo_url: profile.photo_url.filter(|p| !p.is_empty()),
            tokens,
        })
    }
}

/// Which reconciliation branch a login took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The identity was already linked
    ExistingIdentity,
    /// A new identity was linked to the user owning the email
    LinkedToExistingUser,
    /// The email owner already has another identity of this provider kind
    ProviderAlreadyLinked,
    /// A new user was created with this identity
    NewUser,
}

impl LinkOutcome {
    /// Outcome name used in logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ExistingIdentity => "existing_identity",
            Self::LinkedToExistingUser => "linked_to_existing_user",
            Self::ProviderAlreadyLinked => "provider_already_linked",
            Self::NewUser => "new_user",
        }
    }
}

impl fmt::Display for LinkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of reconciling a login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// The account the login resolved to
    pub user: User,
    /// Branch taken
    pub outcome: LinkOutcome,
}

/// Trim and lower-case an email address
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Simple structural email check
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    if email.len() <= 5 || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some(at_pos) = email.find('@') else {
        return false;
    };
    if at_pos == 0 || at_pos == email.len() - 1 {
        return false;
    }
    let domain_part = &email[at_pos + 1..];
    !domain_part.contains('@') && domain_part.contains('.')
}

/// Whether a local login failed because the account only has social identities
#[must_use]
pub fn is_social_account_error(error: &AppError) -> bool {
    error.code == ErrorCode::AuthInvalid
        && error
            .context
            .details
            .get("reason")
            .and_then(serde_json::Value::as_str)
            == Some(SOCIAL_ACCOUNT)
}

/// Account reconciliation rules
#[derive(Clone)]
pub struct IdentityService {
    database: Arc<Database>,
    bcrypt_cost: u32,
}

impl IdentityService {
    /// Create the service
    #[must_use]
    pub const fn new(database: Arc<Database>, bcrypt_cost: u32) -> Self {
        Self {
            database,
            bcrypt_cost,
        }
    }

    /// Register a password account
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` for a malformed email or a short password and
    /// `RESOURCE_ALREADY_EXISTS` when the email is taken
    pub async fn register_local(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> AppResult<User> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AppError::invalid_input("Invalid email format"));
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::invalid_input(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
            )));
        }
        if self.database.email_in_use(&email).await? {
            return Err(AppError::already_exists("Email already registered"));
        }

        let password_hash = hash_password(password.to_owned(), self.bcrypt_cost).await?;
        let name = name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_owned);
        let user = User::new(email, name).with_password_hash(password_hash);

        self.database.create_local_user(&user).await.map_err(|e| {
            if e.is_unique_violation() {
                AppError::already_exists("Email already registered")
            } else {
                e.into()
            }
        })?;

        AppLogger::log_auth_event(&user.email, "register", true, None);
        Ok(user)
    }

    /// Check a password login
    ///
    /// # Errors
    ///
    /// Returns `AUTH_INVALID` for an unknown email, a wrong password or an
    /// account without a password
    pub async fn authenticate_local(&self, email: &str, password: &str) -> AppResult<User> {
        let email = normalize_email(email);
        let Some(user) = self.database.get_user_by_email(&email).await? else {
            AppLogger::log_auth_event(&email, "login", false, Some("unknown email"));
            return Err(AppError::auth_invalid("Invalid email or password"));
        };

        let Some(hash) = user.password_hash.clone() else {
            AppLogger::log_auth_event(&email, "login", false, Some("social-only account"));
            return Err(AppError::auth_invalid(
                "This account was created with a social login; sign in with that provider",
            )
            .with_details(serde_json::json!({ "reason": SOCIAL_ACCOUNT })));
        };

        if !verify_password(password.to_owned(), hash).await? {
            AppLogger::log_auth_event(&email, "login", false, Some("wrong password"));
            return Err(AppError::auth_invalid("Invalid email or password"));
        }

        if let Some(local) = self
            .database
            .find_user_identity(user.id, AuthProvider::Local)
            .await?
        {
            self.database.touch_identity(local.id).await?;
        }

        AppLogger::log_auth_event(&email, "login", true, None);
        Ok(user)
    }

    /// Resolve a provider login to an account, linking or creating as needed
    ///
    /// # Errors
    ///
    /// Returns an error if persistence fails twice or the data is inconsistent
    pub async fn find_or_create_oauth_user(&self, login: &OAuthLogin) -> AppResult<LoginOutcome> {
        let result = match self.reconcile(login).await {
            Err(e) if e.is_unique_violation() => {
                warn!(
                    provider = %login.provider,
                    error = %e,
                    "Concurrent first login detected, retrying reconciliation"
                );
                self.reconcile(login).await
            }
            other => other,
        };

        let outcome = result?;
        AppLogger::log_link_event(
            &outcome.user.id.to_string(),
            login.provider.as_str(),
            outcome.outcome.as_str(),
        );
        Ok(outcome)
    }

    async fn reconcile(&self, login: &OAuthLogin) -> DatabaseResult<LoginOutcome> {
        if let Some(identity) = self
            .database
            .find_identity(login.provider, &login.provider_id)
            .await?
        {
            let user = self.database.get_user_required(identity.user_id).await?;
            let user = self.sync_profile(user, login).await?;
            if let Some(tokens) = &login.tokens {
                self.database
                    .update_identity_tokens(identity.id, tokens)
                    .await?;
            } else {
                self.database.touch_identity(identity.id).await?;
            }
            return Ok(LoginOutcome {
                user,
                outcome: LinkOutcome::ExistingIdentity,
            });
        }

        if let Some(mut user) = self.database.get_user_by_email(&login.email).await? {
            if let Some(photo) = &login.photo_url {
                self.database
                    .update_user_profile(user.id, &user.email, user.name.as_deref(), Some(photo))
                    .await?;
                user.photo_url = Some(photo.clone());
            }

            if self
                .database
                .user_has_provider(user.id, login.provider)
                .await?
            {
                info!(
                    user_id = %user.id,
                    provider = %login.provider,
                    "User already has a different identity of this provider, not linking"
                );
                return Ok(LoginOutcome {
                    user,
                    outcome: LinkOutcome::ProviderAlreadyLinked,
                });
            }

            self.database
                .insert_identity(&self.new_identity(user.id, login))
                .await?;
            return Ok(LoginOutcome {
                user,
                outcome: LinkOutcome::LinkedToExistingUser,
            });
        }

        let user = User::new(login.email.clone(), login.name.clone())
            .with_photo_url(login.photo_url.clone());
        self.database
            .create_user_with_identity(&user, &self.new_identity(user.id, login))
            .await?;
        Ok(LoginOutcome {
            user,
            outcome: LinkOutcome::NewUser,
        })
    }

    fn new_identity(&self, user_id: Uuid, login: &OAuthLogin) -> NewIdentity {
        NewIdentity {
            user_id,
            provider: login.provider,
            provider_id: Some(login.provider_id.clone()),
            tokens: login.tokens.clone(),
        }
    }

    /// Bring the stored profile in line with what the provider reported
    async fn sync_profile(&self, mut user: User, login: &OAuthLogin) -> DatabaseResult<User> {
        let mut changed = false;

        if user.email != login.email {
            match self.database.get_user_by_email(&login.email).await? {
                Some(owner) if owner.id != user.id => {
                    warn!(
                        user_id = %user.id,
                        other_user_id = %owner.id,
                        provider = %login.provider,
                        "Provider email belongs to another user, keeping the current email"
                    );
                }
                _ => {
                    user.email.clone_from(&login.email);
                    changed = true;
                }
            }
        }
        if let Some(name) = login.name.as_ref().filter(|n| user.name.as_ref() != Some(*n)) {
            user.name = Some(name.clone());
            changed = true;
        }
        if let Some(photo) = &login.photo_url {
            user.photo_url = Some(photo.clone());
            changed = true;
        }

        if changed {
            self.database
                .update_user_profile(
                    user.id,
                    &user.email,
                    user.name.as_deref(),
                    user.photo_url.as_deref(),
                )
                .await?;
        }
        Ok(user)
    }

    /// User owning an email
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .database
            .get_user_by_email(&normalize_email(email))
            .await?)
    }

    /// User owning a provider identity
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails
    pub async fn find_by_identity(
        &self,
        provider: AuthProvider,
        provider_id: &str,
    ) -> AppResult<Option<User>> {
        match self.database.find_identity(provider, provider_id).await? {
            Some(identity) => Ok(self.database.get_user(identity.user_id).await?),
            None => Ok(None),
        }
    }

    /// User by id
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` if the user does not exist
    pub async fn get_user(&self, user_id: Uuid) -> AppResult<User> {
        self.database
            .get_user_required(user_id)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => AppError::not_found("User"),
                other => other.into(),
            })
    }

    /// Providers linked to a user, oldest link first
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails
    pub async fn linked_providers(&self, user_id: Uuid) -> AppResult<Vec<AuthProvider>> {
        Ok(self
            .database
            .list_identities(user_id)
            .await?
            .into_iter()
            .map(|identity| identity.provider)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalisation_and_validation() {
        assert_eq!(normalize_email("  Ana@Example.COM "), "ana@example.com");
        assert!(is_valid_email("ana@example.com"));
        assert!(!is_valid_email("ana@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ana @example.com"));
        assert!(!is_valid_email("a@b@c.com"));
    }

    #[test]
    fn test_login_requires_email() {
        let profile = ProviderProfile {
            provider: AuthProvider::Github,
            provider_id: "1".into(),
            email: Some("   ".into()),
            name: None,
            photo_url: Some(String::new()),
        };
        let err = OAuthLogin::from_profile(profile.clone(), None).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingRequiredField);

        let login = OAuthLogin::from_profile(
            ProviderProfile {
                email: Some("Dev@Example.com".into()),
                ..profile
            },
            None,
        )
        .unwrap();
        assert_eq!(login.email, "dev@example.com");
        assert!(login.photo_url.is_none());
    }

    #[test]
    fn test_social_account_error_detection() {
        let err = AppError::auth_invalid("x")
            .with_details(serde_json::json!({ "reason": SOCIAL_ACCOUNT }));
        assert!(is_social_account_error(&err));
        assert!(!is_social_account_error(&AppError::auth_invalid("x")));
    }
}
