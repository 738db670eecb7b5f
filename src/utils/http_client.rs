// ABOUTME: Shared HTTP client construction with timeout configuration
// ABOUTME: Short timeouts for OAuth and profile calls, long ones for video uploads

use crate::constants::service::SERVICE_NAME;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// Create a new HTTP client with custom timeout settings
///
/// Falls back to a default client if the builder fails.
#[must_use]
pub fn create_client_with_timeout(timeout_secs: u64, connect_timeout_secs: u64) -> Client {
    ClientBuilder::new()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .user_agent(user_agent())
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Client for token exchanges and user info lookups
#[must_use]
pub fn oauth_client() -> Client {
    create_client_with_timeout(15, 5)
}

/// Client for content uploads, which can take minutes for large files
#[must_use]
pub fn upload_client() -> Client {
    create_client_with_timeout(300, 10)
}

fn user_agent() -> String {
    format!("{SERVICE_NAME}/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_names_service() {
        assert!(user_agent().starts_with("idlink-server/"));
    }
}
