// ABOUTME: Session authentication for browser requests
// ABOUTME: Reads the session cookie and validates it into a SessionUser
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::auth::AuthManager;
use crate::constants::cookies::SESSION_COOKIE;
use crate::errors::{AppError, AppResult};
use crate::models::AuthProvider;
use crate::resources::ServerResources;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use std::sync::Arc;
use uuid::Uuid;

/// Signed-in user of the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    /// User `ID`
    pub user_id: Uuid,
    /// Provider used for this session's login
    pub provider: AuthProvider,
    /// Email recorded at login
    pub email: String,
}

/// Authenticate the session cookie in `jar`
///
/// # Errors
///
/// Returns `AUTH_REQUIRED` when the cookie is missing or its token does not validate
pub fn authenticate_session(jar: &CookieJar, auth_manager: &AuthManager) -> AppResult<SessionUser> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_owned())
        .filter(|v| !v.is_empty())
        .ok_or_else(AppError::auth_required)?;

    let claims = auth_manager.validate_session_token(&token).map_err(|e| {
        tracing::debug!(error = %e, "Session cookie rejected");
        AppError::auth_required()
    })?;

    Ok(SessionUser {
        user_id: claims.user_id().map_err(|_| AppError::auth_required())?,
        provider: claims.provider,
        email: claims.email,
    })
}

#[axum::async_trait]
impl FromRequestParts<Arc<ServerResources>> for SessionUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        resources: &Arc<ServerResources>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        authenticate_session(&jar, &resources.auth_manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use crate::models::User;
    use crate::security::cookies::session_cookie;

    #[test]
    fn test_valid_cookie_yields_session_user() {
        let manager = AuthManager::new(b"secret", 1);
        let user = User::new("bia@example.com".into(), None);
        let token = manager
            .generate_session_token(&user, AuthProvider::Facebook)
            .unwrap();
        let jar = CookieJar::new().add(session_cookie(token, false));

        let session = authenticate_session(&jar, &manager).unwrap();
        assert_eq!(session.user_id, user.id);
        assert_eq!(session.provider, AuthProvider::Facebook);
    }

    #[test]
    fn test_missing_or_forged_cookie_requires_auth() {
        let manager = AuthManager::new(b"secret", 1);
        let err = authenticate_session(&CookieJar::new(), &manager).unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthRequired);

        let jar = CookieJar::new().add(session_cookie("not-a-jwt".into(), false));
        let err = authenticate_session(&jar, &manager).unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthRequired);
    }
}
