// ABOUTME: Database manager for users and linked provider identities
// ABOUTME: Owns the SQLite pool, runs schema migrations and encrypts provider tokens at rest
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Database Management
//!
//! Plain SQL over a `SQLite` pool. Schema is created at startup with
//! `CREATE TABLE IF NOT EXISTS`; there is no ORM layer.

/// Database error types
pub mod errors;
mod user_providers;
mod users;

pub use errors::{DatabaseError, DatabaseResult};

use crate::crypto::TokenCipher;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

/// Database manager for user and identity storage
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
    cipher: TokenCipher,
}

impl Database {
    /// Open (creating if needed) the database and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid, the connection fails or a migration fails
    pub async fn new(database_url: &str, encryption_key: &[u8]) -> DatabaseResult<Self> {
        let cipher = TokenCipher::new(encryption_key)?;
        let in_memory = database_url.contains(":memory:");

        if !in_memory {
            ensure_parent_dir(database_url).await?;
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` is a distinct database
        let max_connections = if in_memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let db = Self { pool, cipher };
        db.migrate().await?;
        Ok(db)
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Run database migrations
    ///
    /// # Errors
    ///
    /// Returns an error if table or index creation fails
    pub async fn migrate(&self) -> DatabaseResult<()> {
        self.migrate_users().await?;
        self.migrate_user_providers().await?;
        Ok(())
    }

    /// Check the pool can serve a query
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable
    pub async fn health_check(&self) -> DatabaseResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

async fn ensure_parent_dir(database_url: &str) -> DatabaseResult<()> {
    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or(path);
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DatabaseError::Sqlx(sqlx::Error::Io(e)))?;
        }
    }
    Ok(())
}

fn parse_uuid(value: &str) -> DatabaseResult<Uuid> {
    Uuid::parse_str(value).map_err(|e| DatabaseError::Corrupt(format!("bad uuid {value}: {e}")))
}
