// ABOUTME: HTTP route groups for login, OAuth callbacks, profile and uploads
// ABOUTME: Shared helpers for login redirects and session issuance
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Route modules
//!
//! Each group exposes `routes(resources)` returning a stateful `Router`; the
//! server merges them. Handlers are thin and delegate to the service layer.

/// Local registration, password login and logout
pub mod auth;
/// Profile page data
pub mod home;
/// Liveness and readiness
pub mod health;
/// Google, Facebook and GitHub login
pub mod oauth;
/// TikTok login and video upload
pub mod tiktok;

pub use auth::AuthRoutes;
pub use health::HealthRoutes;
pub use home::HomeRoutes;
pub use oauth::OAuthRoutes;
pub use tiktok::TikTokRoutes;

use crate::constants::cookies::OAUTH_STATE_COOKIE;
use crate::constants::paths::{HOME, LOGIN};
use crate::errors::AppResult;
use crate::models::{AuthProvider, User};
use crate::resources::ServerResources;
use crate::security::cookies::{remove_cookie, session_cookie};
use axum::response::Redirect;
use axum_extra::extract::CookieJar;

/// Redirect to the login page with an error reason
pub(crate) fn login_error_redirect(reason: &str) -> Redirect {
    Redirect::to(&format!("{LOGIN}?error={}", urlencoding::encode(reason)))
}

/// Same as [`login_error_redirect`], also dropping the state cookie
pub(crate) fn callback_failure(jar: CookieJar, reason: &str) -> (CookieJar, Redirect) {
    (remove_cookie(jar, OAUTH_STATE_COOKIE), login_error_redirect(reason))
}

/// Issue the session cookie for `user` and send the browser home
pub(crate) fn finish_login(
    resources: &ServerResources,
    jar: CookieJar,
    user: &User,
    provider: AuthProvider,
) -> AppResult<(CookieJar, Redirect)> {
    let token = resources
        .auth_manager
        .generate_session_token(user, provider)?;
    let jar = remove_cookie(jar, OAUTH_STATE_COOKIE)
        .add(session_cookie(token, resources.config.session.cookie_secure));
    Ok((jar, Redirect::to(HOME)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn test_login_error_redirect_encodes_reason() {
        let response = login_error_redirect("access denied").into_response();
        assert_eq!(
            response.headers()["location"],
            "/login?error=access%20denied"
        );
    }
}
