// ABOUTME: Domain service layer for business logic extracted from route handlers
// ABOUTME: Account reconciliation, provider token lifecycle and TikTok uploads

//! Domain service layer
//!
//! Route handlers stay thin and delegate to the services here, so the
//! reconciliation rules are the same whichever provider callback runs them.

/// Local registration and login plus social account reconciliation
pub mod identity;

/// TikTok inbox video upload
pub mod tiktok_upload;

/// Access token refresh for linked identities
pub mod tokens;

pub use identity::{IdentityService, LinkOutcome, LoginOutcome, OAuthLogin};
pub use tiktok_upload::TikTokUploadService;
pub use tokens::TokenService;
