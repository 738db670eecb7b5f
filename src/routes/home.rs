// ABOUTME: Profile data for the signed-in user
// ABOUTME: Display name and email rules per login provider plus the linked provider list

use crate::constants::cookies::SESSION_COOKIE;
use crate::constants::display::{DEFAULT_NAME, TIKTOK_DEFAULT_NAME, TIKTOK_DISPLAY_EMAIL};
use crate::constants::paths::LOGIN;
use crate::errors::{AppError, ErrorCode};
use crate::middleware::SessionUser;
use crate::models::{AuthProvider, User};
use crate::resources::ServerResources;
use crate::security::cookies::remove_cookie;
use axum::extract::State;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Data behind the home page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HomeResponse {
    /// Display name
    pub name: String,
    /// Display email
    pub email: String,
    /// Avatar URL
    pub photo_url: Option<String>,
    /// Provider used for this session
    pub current_provider: String,
    /// Linked providers, oldest first
    pub providers: Vec<String>,
}

impl HomeResponse {
    /// Apply the display rules for a session through `provider`
    #[must_use]
    pub fn build(user: User, provider: AuthProvider, providers: &[AuthProvider]) -> Self {
        let (name, email) = if provider == AuthProvider::Tiktok {
            (
                user.name.unwrap_or_else(|| TIKTOK_DEFAULT_NAME.to_owned()),
                TIKTOK_DISPLAY_EMAIL.to_owned(),
            )
        } else {
            (user.name.unwrap_or_else(|| DEFAULT_NAME.to_owned()), user.email)
        };

        Self {
            name,
            email,
            photo_url: user.photo_url,
            current_provider: provider.as_str().to_owned(),
            providers: providers.iter().map(|p| p.as_str().to_owned()).collect(),
        }
    }
}

/// Home routes implementation
pub struct HomeRoutes;

impl HomeRoutes {
    /// Create the home route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/", get(|| async { Redirect::to("/home") }))
            .route("/home", get(Self::handle_home))
            .with_state(resources)
    }

    async fn handle_home(
        State(resources): State<Arc<ServerResources>>,
        session: Option<SessionUser>,
        jar: CookieJar,
    ) -> Result<Response, AppError> {
        let Some(session) = session else {
            return Ok(Redirect::to(LOGIN).into_response());
        };

        let service = resources.identity_service();
        let user = match service.get_user(session.user_id).await {
            Ok(user) => user,
            Err(e) if e.code == ErrorCode::ResourceNotFound => {
                // Session outlived its account
                let jar = remove_cookie(jar, SESSION_COOKIE);
                return Ok((jar, Redirect::to(LOGIN)).into_response());
            }
            Err(e) => return Err(e.with_user_id(session.user_id)),
        };
        let providers = service.linked_providers(user.id).await?;

        Ok(Json(HomeResponse::build(user, session.provider, &providers)).into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiktok_display_rules() {
        let user = User::new("abc@tiktok.user".into(), None);
        let home = HomeResponse::build(user, AuthProvider::Tiktok, &[AuthProvider::Tiktok]);
        assert_eq!(home.name, TIKTOK_DEFAULT_NAME);
        assert_eq!(home.email, TIKTOK_DISPLAY_EMAIL);
        assert_eq!(home.providers, vec!["TIKTOK"]);
    }

    #[test]
    fn test_default_name_and_all_providers() {
        let user = User::new("ana@example.com".into(), None);
        let home = HomeResponse::build(
            user,
            AuthProvider::Local,
            &[AuthProvider::Local, AuthProvider::Google],
        );
        assert_eq!(home.name, DEFAULT_NAME);
        assert_eq!(home.email, "ana@example.com");
        assert_eq!(home.current_provider, "LOCAL");
        assert_eq!(home.providers, vec!["LOCAL", "GOOGLE"]);
    }
}
