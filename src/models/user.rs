// ABOUTME: Local user account model
// ABOUTME: A user owns one email and optionally a password; social identities link to it
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Local account that one or more provider identities resolve to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Unique user identifier
    pub id: Uuid,
    /// Email address (unique across users)
    pub email: String,
    /// Display name
    pub name: Option<String>,
    /// bcrypt hash; `None` for accounts created through a social provider
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// Profile picture URL
    pub photo_url: Option<String>,
    /// When the account was created
    pub created_at: DateTime<Utc>,
    /// Last profile change
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with a fresh id and timestamps
    #[must_use]
    pub fn new(email: String, name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            name,
            password_hash: None,
            photo_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach a password hash
    #[must_use]
    pub fn with_password_hash(mut self, hash: String) -> Self {
        self.password_hash = Some(hash);
        self
    }

    /// Attach a profile picture URL
    #[must_use]
    pub fn with_photo_url(mut self, photo_url: Option<String>) -> Self {
        self.photo_url = photo_url;
        self
    }

    /// Whether the account can sign in with a password
    #[must_use]
    pub fn has_password(&self) -> bool {
        self.password_hash.as_deref().is_some_and(|h| !h.is_empty())
    }
}
