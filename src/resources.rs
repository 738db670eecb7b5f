// ABOUTME: Shared server resources handed to every route group
// ABOUTME: Database, session auth, OAuth state, configuration and HTTP clients
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::auth::AuthManager;
use crate::config::{OAuthConfig, ServerConfig};
use crate::database::Database;
use crate::security::OAuthStateManager;
use crate::services::{IdentityService, TikTokUploadService, TokenService};
use crate::utils::http_client::{oauth_client, upload_client};
use reqwest::Client;
use std::sync::Arc;

/// Everything a request handler can reach
#[derive(Clone)]
pub struct ServerResources {
    /// Persistence
    pub database: Arc<Database>,
    /// Session token issuer
    pub auth_manager: Arc<AuthManager>,
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Provider settings shared with the token service
    pub oauth: Arc<OAuthConfig>,
    /// Pending `OAuth` authorizations
    pub state_manager: Arc<OAuthStateManager>,
    /// Client for token, profile and refresh calls
    pub oauth_http: Client,
    /// Client for video uploads
    pub upload_http: Client,
    bcrypt_cost: u32,
}

impl ServerResources {
    /// Create new server resources with proper Arc sharing
    #[must_use]
    pub fn new(database: Database, config: Arc<ServerConfig>) -> Self {
        let auth_manager = AuthManager::new(&config.session.secret, config.session.expiry_hours);
        Self {
            database: Arc::new(database),
            auth_manager: Arc::new(auth_manager),
            oauth: Arc::new(config.oauth.clone()),
            config,
            state_manager: Arc::new(OAuthStateManager::new()),
            oauth_http: oauth_client(),
            upload_http: upload_client(),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Replace the password hashing cost
    #[must_use]
    pub const fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    /// Replace the pending authorization store
    #[must_use]
    pub fn with_state_manager(mut self, state_manager: OAuthStateManager) -> Self {
        self.state_manager = Arc::new(state_manager);
        self
    }

    /// Account reconciliation service
    #[must_use]
    pub fn identity_service(&self) -> IdentityService {
        IdentityService::new(self.database.clone(), self.bcrypt_cost)
    }

    /// Token refresh service
    #[must_use]
    pub fn token_service(&self) -> TokenService {
        TokenService::new(self.database.clone(), self.oauth.clone(), self.oauth_http.clone())
    }

    /// TikTok upload service
    #[must_use]
    pub fn upload_service(&self) -> TikTokUploadService {
        TikTokUploadService::new(self.upload_http.clone(), &self.oauth.tiktok_api_base)
    }
}
