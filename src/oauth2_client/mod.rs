// ABOUTME: OAuth2 client module for social login providers
// ABOUTME: Generic authorization-code client plus the TikTok variant

//! `OAuth2` client implementations

/// Generic `OAuth2` client with PKCE support
pub mod client;
/// TikTok Login Kit client
pub mod tiktok;

pub use client::{generate_state, OAuth2Client, OAuth2Config, OAuth2Token, PkceParams};
pub use tiktok::{TikTokOAuthClient, TikTokToken, TikTokTokenResponse};
