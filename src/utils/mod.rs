// ABOUTME: Utility module root
// ABOUTME: Shared HTTP client helpers

/// Shared HTTP client construction
pub mod http_client;
