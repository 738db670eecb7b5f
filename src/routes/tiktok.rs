// ABOUTME: TikTok login and inbox video upload routes
// ABOUTME: TikTok has its own token exchange shape so it gets dedicated handlers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::{callback_failure, finish_login, login_error_redirect};
use crate::constants::cookies::OAUTH_STATE_COOKIE;
use crate::constants::service::MULTIPART_OVERHEAD_BYTES;
use crate::constants::login_errors::{
    INVALID_STATE, MISSING_PARAMS, PROVIDER_DISABLED, TIKTOK_CALLBACK_FAILED,
    TIKTOK_INVALID_RESPONSE,
};
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::logging::{redact, AppLogger};
use crate::middleware::SessionUser;
use crate::models::{AuthProvider, ProviderProfile};
use crate::oauth2_client::{TikTokOAuthClient, TikTokToken};
use crate::providers::tiktok::profile_from_open_id;
use crate::providers::create_profile_provider;
use crate::resources::ServerResources;
use crate::security::cookies::{get_cookie_value, state_cookie};
use crate::security::state_matches_cookie;
use crate::services::{LoginOutcome, OAuthLogin};
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use axum_extra::extract::CookieJar;
use bytes::Bytes;
use http_body_util::LengthLimitError;
use serde::{Deserialize, Serialize};
use std::error::Error as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Query parameters of the TikTok callback
#[derive(Debug, Default, Deserialize)]
pub struct TikTokCallbackQuery {
    /// Authorization code
    pub code: Option<String>,
    /// CSRF state
    pub state: Option<String>,
    /// Scopes the user granted
    pub scopes: Option<String>,
    /// TikTok error code
    pub error: Option<String>,
    /// TikTok error text
    pub error_description: Option<String>,
}

/// Upload page readiness
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadStatusResponse {
    /// Whether a video can be sent now
    pub upload_ready: bool,
    /// Account name
    pub user_name: Option<String>,
    /// An access token is stored and not expired
    pub has_valid_token: bool,
    /// Why the upload is not possible
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadStatusResponse {
    fn not_ready(error: &str) -> Self {
        Self {
            upload_ready: false,
            user_name: None,
            has_valid_token: false,
            error: Some(error.to_owned()),
        }
    }
}

/// Result of a successful upload
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    /// TikTok publish id
    pub publish_id: String,
    /// Next step for the user
    pub message: String,
}

/// Fields of the upload form
#[derive(Debug, Default)]
struct UploadForm {
    video: Option<(Bytes, String)>,
    title: Option<String>,
    description: Option<String>,
}

/// TikTok routes implementation
pub struct TikTokRoutes;

impl TikTokRoutes {
    /// Create the TikTok login and upload routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        let body_limit = resources
            .config
            .max_upload_bytes
            .saturating_add(MULTIPART_OVERHEAD_BYTES);
        Router::new()
            .route("/oauth/tiktok", get(Self::handle_authorize))
            .route("/auth/tiktok/callback/", get(Self::handle_callback))
            .route(
                "/tiktok/upload",
                get(Self::handle_upload_status)
                    .post(Self::handle_upload)
                    .layer(DefaultBodyLimit::max(body_limit)),
            )
            .with_state(resources)
    }

    fn client(resources: &ServerResources) -> AppResult<TikTokOAuthClient> {
        if !resources.oauth.tiktok.enabled {
            return Err(AppError::config("TikTok login is disabled"));
        }
        TikTokOAuthClient::from_config(&resources.oauth.tiktok, resources.oauth_http.clone())
    }

    async fn handle_authorize(
        State(resources): State<Arc<ServerResources>>,
        jar: CookieJar,
    ) -> Result<Response, AppError> {
        let client = match Self::client(&resources) {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "TikTok login attempted while unavailable");
                return Ok(login_error_redirect(PROVIDER_DISABLED).into_response());
            }
        };

        let state = resources.state_manager.begin(AuthProvider::Tiktok, None);
        let url = client.get_authorization_url(&state)?;
        AppLogger::log_oauth_event(AuthProvider::Tiktok.as_str(), "authorize", true, None);

        let jar = jar.add(state_cookie(state, resources.config.session.cookie_secure));
        Ok((jar, Redirect::to(&url)).into_response())
    }

    async fn handle_callback(
        State(resources): State<Arc<ServerResources>>,
        Query(query): Query<TikTokCallbackQuery>,
        jar: CookieJar,
    ) -> Result<Response, AppError> {
        let provider = AuthProvider::Tiktok;

        if let Some(error) = query.error.as_deref() {
            AppLogger::log_oauth_event(
                provider.as_str(),
                "callback",
                false,
                Some(query.error_description.as_deref().unwrap_or(error)),
            );
            return Ok(callback_failure(jar, error).into_response());
        }

        let (Some(code), Some(state)) = (query.code.as_deref(), query.state.as_deref()) else {
            return Ok(callback_failure(jar, MISSING_PARAMS).into_response());
        };

        let cookie_state = get_cookie_value(&jar, OAUTH_STATE_COOKIE);
        if !state_matches_cookie(state, cookie_state.as_deref()) {
            AppLogger::log_security_event(
                "oauth_state_mismatch",
                "callback state does not match the browser's state cookie",
                Some(provider.as_str()),
            );
            return Ok(callback_failure(jar, INVALID_STATE).into_response());
        }
        if let Err(e) = resources.state_manager.consume(state, provider) {
            AppLogger::log_security_event(
                "oauth_state_rejected",
                &e.message,
                Some(provider.as_str()),
            );
            return Ok(callback_failure(jar, INVALID_STATE).into_response());
        }

        if let Some(scopes) = query.scopes.as_deref() {
            debug!(scopes = %scopes, "TikTok scopes granted");
        }

        match Self::complete_login(&resources, code).await {
            Ok(outcome) => {
                info!(
                    user_id = %outcome.user.id,
                    outcome = %outcome.outcome,
                    "TikTok login completed"
                );
                Ok(finish_login(&resources, jar, &outcome.user, provider)?.into_response())
            }
            Err(reason) => Ok(callback_failure(jar, reason).into_response()),
        }
    }

    async fn complete_login(
        resources: &ServerResources,
        code: &str,
    ) -> Result<LoginOutcome, &'static str> {
        let provider = AuthProvider::Tiktok;
        let fail = |stage: &str, e: &AppError| {
            AppLogger::log_oauth_event(provider.as_str(), stage, false, Some(&e.to_string()));
            TIKTOK_CALLBACK_FAILED
        };

        let client = Self::client(resources).map_err(|e| fail("configure", &e))?;
        let response = client
            .exchange_code(code)
            .await
            .map_err(|e| fail("exchange_code", &e))?;
        let Some(token) = response.into_token() else {
            AppLogger::log_oauth_event(
                provider.as_str(),
                "exchange_code",
                false,
                Some("response lacks access_token or open_id"),
            );
            return Err(TIKTOK_INVALID_RESPONSE);
        };
        debug!(
            open_id = %token.open_id,
            access_token = %redact(&token.access_token),
            "TikTok code exchanged"
        );

        let profile = Self::fetch_profile(resources, &token).await;
        let login = OAuthLogin::from_profile(profile, Some(token.provider_tokens()))
            .map_err(|e| fail("profile", &e))?;

        resources
            .identity_service()
            .find_or_create_oauth_user(&login)
            .await
            .map_err(|e| fail("reconcile", &e))
    }

    /// User info for the token, or a profile built from its `open_id`
    async fn fetch_profile(resources: &ServerResources, token: &TikTokToken) -> ProviderProfile {
        let fetched = match create_profile_provider(
            AuthProvider::Tiktok,
            &resources.oauth,
            resources.oauth_http.clone(),
        ) {
            Ok(profiles) => profiles.fetch_profile(&token.access_token).await,
            Err(e) => Err(e),
        };

        match fetched {
            Ok(profile) if profile.provider_id == token.open_id => profile,
            Ok(profile) => {
                warn!(
                    token_open_id = %token.open_id,
                    profile_open_id = %profile.provider_id,
                    "TikTok user info names another open_id, using the token's"
                );
                profile_from_open_id(&token.open_id)
            }
            Err(e) => {
                warn!(error = %e, "TikTok user info unavailable, using open_id profile");
                profile_from_open_id(&token.open_id)
            }
        }
    }

    async fn handle_upload_status(
        State(resources): State<Arc<ServerResources>>,
        session: Option<SessionUser>,
    ) -> Result<Json<UploadStatusResponse>, AppError> {
        let Some(session) = session else {
            return Ok(Json(UploadStatusResponse::not_ready("TikTok login required")));
        };

        let Some(identity) = resources
            .database
            .find_user_identity(session.user_id, AuthProvider::Tiktok)
            .await?
        else {
            return Ok(Json(UploadStatusResponse::not_ready("TikTok account not linked")));
        };

        let user = resources.identity_service().get_user(session.user_id).await?;
        Ok(Json(UploadStatusResponse {
            upload_ready: true,
            user_name: user.name,
            has_valid_token: identity.access_token.is_some() && !identity.is_token_expired(),
            error: None,
        }))
    }

    async fn handle_upload(
        State(resources): State<Arc<ServerResources>>,
        session: SessionUser,
        multipart: Multipart,
    ) -> Result<Json<UploadResponse>, AppError> {
        let linked = resources
            .database
            .user_has_provider(session.user_id, AuthProvider::Tiktok)
            .await?;
        if !linked {
            return Err(AppError::not_found("Linked TikTok account"));
        }

        let form = read_upload_form(multipart).await?;
        let (video, content_type) = form.video.ok_or_else(|| AppError::missing_field("video"))?;
        if video.is_empty() {
            return Err(AppError::invalid_input("Select a video to upload"));
        }
        if video.len() > resources.config.max_upload_bytes {
            return Err(video_too_large());
        }
        let title = form.title.unwrap_or_default();
        info!(
            user_id = %session.user_id,
            bytes = video.len(),
            title = %title,
            description = form.description.as_deref().unwrap_or_default(),
            "Uploading video to TikTok inbox"
        );

        let access_token = resources
            .token_service()
            .ensure_fresh(session.user_id, AuthProvider::Tiktok)
            .await?;
        let publish_id = resources
            .upload_service()
            .upload_to_inbox(&access_token, video, &content_type)
            .await?;

        Ok(Json(UploadResponse {
            publish_id,
            message: "Video sent to your TikTok inbox. Open TikTok notifications to publish it."
                .to_owned(),
        }))
    }
}

async fn read_upload_form(mut multipart: Multipart) -> AppResult<UploadForm> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("video") => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                let data = field.bytes().await.map_err(multipart_error)?;
                form.video = Some((data, content_type));
            }
            Some("title") => form.title = Some(field.text().await.map_err(multipart_error)?),
            Some("description") => {
                let text = field.text().await.map_err(multipart_error)?;
                form.description = Some(text).filter(|d| !d.trim().is_empty());
            }
            other => debug!(field = ?other, "Ignoring upload form field"),
        }
    }
    Ok(form)
}

fn video_too_large() -> AppError {
    AppError::new(ErrorCode::PayloadTooLarge, "Video exceeds the upload size limit")
}

/// Whether a body length limit cut the stream short
///
/// Nested `Limited` bodies bury the `LengthLimitError` under several boxed
/// errors, so the whole source chain is searched.
fn hit_length_limit(error: &MultipartError) -> bool {
    let mut source = error.source();
    while let Some(inner) = source {
        if inner.is::<LengthLimitError>() {
            return true;
        }
        source = inner.source();
    }
    false
}

fn multipart_error(error: MultipartError) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE || hit_length_limit(&error) {
        video_too_large()
    } else {
        AppError::invalid_input(format!("Malformed upload form: {}", error.body_text()))
    }
}
