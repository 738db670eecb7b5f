// ABOUTME: System-wide constants for the identity linking server
// ABOUTME: Cookie names, redirect targets, login error reasons and provider endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Constants Module
//!
//! Hardcoded values shared by routes, services and configuration defaults.

/// Service identity
pub mod service {
    /// Service name used in logs and health output
    pub const SERVICE_NAME: &str = "idlink-server";

    /// JWT audience for session tokens
    pub const SESSION_AUDIENCE: &str = "idlink";

    /// Default HTTP port
    pub const DEFAULT_HTTP_PORT: u16 = 8080;

    /// Default `SQLite` database location
    pub const DEFAULT_DATABASE_URL: &str = "sqlite:./data/idlink.db";

    /// Default session lifetime in hours
    pub const DEFAULT_SESSION_EXPIRY_HOURS: i64 = 24;

    /// Default request body limit for uploads (64 MiB)
    pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

    /// Headroom for multipart framing around an upload at the size limit
    pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;
}

/// Cookie names
pub mod cookies {
    /// Session token cookie
    pub const SESSION_COOKIE: &str = "idlink_session";

    /// Pending OAuth `state` cookie binding a flow to the browser that started it
    pub const OAUTH_STATE_COOKIE: &str = "idlink_oauth_state";
}

/// Redirect targets used by the login flows
pub mod paths {
    /// Login page
    pub const LOGIN: &str = "/login";

    /// Landing page after a successful login
    pub const HOME: &str = "/home";

    /// Redirect after logout
    pub const LOGGED_OUT: &str = "/login?logout";
}

/// Reasons reported to `/login?error=<reason>`
pub mod login_errors {
    /// Username or password rejected
    pub const INVALID_CREDENTIALS: &str = "invalid_credentials";
    /// Account only has social identities
    pub const SOCIAL_ACCOUNT: &str = "social_account";
    /// Callback without `code` or `state`
    pub const MISSING_PARAMS: &str = "missing_params";
    /// Callback `state` unknown, expired or not bound to this browser
    pub const INVALID_STATE: &str = "invalid_state";
    /// Provider supplied no usable email
    pub const EMAIL_NOT_PROVIDED: &str = "email_not_provided";
    /// Provider is not configured
    pub const PROVIDER_DISABLED: &str = "provider_disabled";
    /// Any other failure during a generic provider callback
    pub const OAUTH_CALLBACK_FAILED: &str = "oauth_callback_failed";
    /// TikTok token response lacked `access_token` or `open_id`
    pub const TIKTOK_INVALID_RESPONSE: &str = "tiktok_invalid_response";
    /// Any other failure during the TikTok callback
    pub const TIKTOK_CALLBACK_FAILED: &str = "tiktok_callback_failed";
}

/// OAuth flow parameters
pub mod oauth {
    /// Lifetime of a pending authorization in seconds
    pub const STATE_TTL_SECS: i64 = 600;

    /// Refresh provider tokens this many seconds before they expire
    pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

    /// Random bytes in a generated `state` value
    pub const STATE_BYTES: usize = 16;

    /// Minimum local password length
    pub const MIN_PASSWORD_LENGTH: usize = 8;
}

/// Public provider endpoints (overridable through configuration)
pub mod endpoints {
    /// Google authorization endpoint
    pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
    /// Google token endpoint
    pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
    /// Google OIDC userinfo endpoint
    pub const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

    /// Facebook authorization endpoint
    pub const FACEBOOK_AUTH_URL: &str = "https://www.facebook.com/v18.0/dialog/oauth";
    /// Facebook token endpoint
    pub const FACEBOOK_TOKEN_URL: &str = "https://graph.facebook.com/v18.0/oauth/access_token";
    /// Facebook profile endpoint
    pub const FACEBOOK_USERINFO_URL: &str =
        "https://graph.facebook.com/me?fields=id,name,email,picture";

    /// GitHub authorization endpoint
    pub const GITHUB_AUTH_URL: &str = "https://github.com/login/oauth/authorize";
    /// GitHub token endpoint
    pub const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
    /// GitHub user endpoint
    pub const GITHUB_USERINFO_URL: &str = "https://api.github.com/user";
    /// GitHub email list endpoint
    pub const GITHUB_EMAILS_URL: &str = "https://api.github.com/user/emails";

    /// TikTok authorization endpoint
    pub const TIKTOK_AUTH_URL: &str = "https://www.tiktok.com/v2/auth/authorize/";
    /// TikTok token endpoint
    pub const TIKTOK_TOKEN_URL: &str = "https://open.tiktokapis.com/v2/oauth/token/";
    /// TikTok user info endpoint
    pub const TIKTOK_USERINFO_URL: &str =
        "https://open.tiktokapis.com/v2/user/info/?fields=open_id,union_id,avatar_url,display_name";
    /// TikTok content API base
    pub const TIKTOK_API_BASE: &str = "https://open.tiktokapis.com";
    /// Inbox upload initialisation path under the content API base
    pub const TIKTOK_INBOX_INIT_PATH: &str = "/v2/post/publish/inbox/video/init/";
}

/// Defaults applied to profiles that lack fields
pub mod display {
    /// Fallback display name
    pub const DEFAULT_NAME: &str = "Usuário";
    /// Fallback display name for TikTok sessions
    pub const TIKTOK_DEFAULT_NAME: &str = "TikTok User";
    /// Email shown for TikTok sessions
    pub const TIKTOK_DISPLAY_EMAIL: &str = "@TikTok";
    /// Domain of placeholder emails given to TikTok accounts
    pub const TIKTOK_EMAIL_DOMAIN: &str = "tiktok.user";
}
