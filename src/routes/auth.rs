// ABOUTME: User authentication route handlers for registration, password login and logout
// ABOUTME: Login failures redirect back to the login page with a reason code
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Authentication routes for local accounts
//!
//! Handlers are thin wrappers that delegate to the identity service and turn
//! its outcome into cookies and redirects.

use super::{finish_login, login_error_redirect};
use crate::constants::cookies::SESSION_COOKIE;
use crate::constants::login_errors::{INVALID_CREDENTIALS, SOCIAL_ACCOUNT};
use crate::constants::paths::LOGGED_OUT;
use crate::errors::{AppError, ErrorCode};
use crate::models::AuthProvider;
use crate::resources::ServerResources;
use crate::security::cookies::remove_cookie;
use crate::services::identity::is_social_account_error;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// User registration request
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    /// Email, used as the login name
    pub email: String,
    /// Plain password
    pub password: String,
    /// Display name
    pub name: Option<String>,
}

/// User registration response
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// New user id
    pub user_id: String,
    /// Confirmation text
    pub message: String,
}

/// Form posted by the login page
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    /// Email
    pub username: String,
    /// Plain password
    pub password: String,
}

/// Query of `GET /login`
#[derive(Debug, Default, Deserialize)]
pub struct LoginPageQuery {
    /// Failure reason of the previous attempt
    pub error: Option<String>,
    /// Present after a logout
    pub logout: Option<String>,
}

/// A sign-in option shown on the login page
#[derive(Debug, Serialize, Deserialize)]
pub struct ProviderLink {
    /// Provider name, upper case
    pub provider: String,
    /// Path starting the login
    pub url: String,
}

/// Data behind the login page
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginPageResponse {
    /// Failure reason of the previous attempt
    pub error: Option<String>,
    /// Whether the user just logged out
    pub logout: bool,
    /// Form target for password logins
    pub login_url: String,
    /// JSON endpoint for registration
    pub register_url: String,
    /// Enabled social providers
    pub providers: Vec<ProviderLink>,
}

/// Path starting the login flow of `provider`
#[must_use]
pub fn authorization_path(provider: AuthProvider) -> String {
    match provider {
        AuthProvider::Tiktok => "/oauth/tiktok".to_owned(),
        other => format!("/oauth2/authorization/{}", other.registration_id()),
    }
}

/// Authentication routes implementation
pub struct AuthRoutes;

impl AuthRoutes {
    /// Create all local authentication routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/login", get(Self::handle_login_page))
            .route("/api/register", post(Self::handle_register))
            .route("/perform-login", post(Self::handle_login))
            .route("/logout", get(Self::handle_logout).post(Self::handle_logout))
            .with_state(resources)
    }

    async fn handle_login_page(
        State(resources): State<Arc<ServerResources>>,
        Query(query): Query<LoginPageQuery>,
    ) -> Json<LoginPageResponse> {
        let providers = resources
            .oauth
            .enabled_providers()
            .into_iter()
            .map(|p| ProviderLink {
                provider: p.as_str().to_owned(),
                url: authorization_path(p),
            })
            .collect();

        Json(LoginPageResponse {
            error: query.error,
            logout: query.logout.is_some(),
            login_url: "/perform-login".to_owned(),
            register_url: "/api/register".to_owned(),
            providers,
        })
    }

    async fn handle_register(
        State(resources): State<Arc<ServerResources>>,
        Json(request): Json<RegisterRequest>,
    ) -> Result<Json<RegisterResponse>, AppError> {
        let user = resources
            .identity_service()
            .register_local(&request.email, &request.password, request.name.as_deref())
            .await?;

        info!(user_id = %user.id, "Local user registered");
        Ok(Json(RegisterResponse {
            user_id: user.id.to_string(),
            message: "User registered successfully".to_owned(),
        }))
    }

    async fn handle_login(
        State(resources): State<Arc<ServerResources>>,
        jar: CookieJar,
        Form(form): Form<LoginForm>,
    ) -> Result<Response, AppError> {
        let result = resources
            .identity_service()
            .authenticate_local(&form.username, &form.password)
            .await;
        match result {
            Ok(user) => {
                Ok(finish_login(&resources, jar, &user, AuthProvider::Local)?.into_response())
            }
            Err(e) if is_social_account_error(&e) => {
                Ok(login_error_redirect(SOCIAL_ACCOUNT).into_response())
            }
            Err(e) if e.code == ErrorCode::AuthInvalid => {
                Ok(login_error_redirect(INVALID_CREDENTIALS).into_response())
            }
            Err(e) => Err(e),
        }
    }

    async fn handle_logout(jar: CookieJar) -> (CookieJar, Redirect) {
        (remove_cookie(jar, SESSION_COOKIE), Redirect::to(LOGGED_OUT))
    }
}
