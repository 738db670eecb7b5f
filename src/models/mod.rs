// ABOUTME: Data models for users, provider identities and provider tokens
// ABOUTME: Re-exports the user and identity types used across services and routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Data Models

/// Provider identity models
pub mod identity;
/// Local user account model
pub mod user;

pub use identity::{AuthProvider, LinkedIdentity, NewIdentity, ProviderProfile, ProviderTokens};
pub use user::User;
