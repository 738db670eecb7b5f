// ABOUTME: Security module root
// ABOUTME: OAuth state protection and cookie handling for the login flows

/// Session and state cookie builders
pub mod cookies;
/// Pending OAuth authorizations and state cookie binding
pub mod oauth_state;

pub use oauth_state::{state_matches_cookie, OAuthStateManager, PendingAuthorization};
