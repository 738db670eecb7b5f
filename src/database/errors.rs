// ABOUTME: Structured error types for database operations
// ABOUTME: Keeps unique-constraint violations distinguishable from other storage failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use crate::crypto::CryptoError;
use crate::errors::{AppError, ErrorCode};
use thiserror::Error;

/// Database operation failures
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Insert or update collided with a unique constraint
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    /// A referenced row does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },
    /// A stored value could not be decoded
    #[error("corrupt row: {0}")]
    Corrupt(String),
    /// Stored token could not be encrypted or decrypted
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    /// Any other driver error
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),
}

/// Result alias for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

impl DatabaseError {
    /// Whether this error is a unique-constraint violation
    #[must_use]
    pub const fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        if let Some(db_error) = error.as_database_error() {
            if db_error.is_unique_violation() {
                return Self::UniqueViolation(db_error.message().to_owned());
            }
        }
        Self::Sqlx(error)
    }
}

impl From<DatabaseError> for AppError {
    fn from(error: DatabaseError) -> Self {
        match &error {
            DatabaseError::UniqueViolation(_) => {
                Self::new(ErrorCode::ResourceAlreadyExists, error.to_string())
            }
            DatabaseError::NotFound { .. } => {
                Self::new(ErrorCode::ResourceNotFound, error.to_string())
            }
            DatabaseError::Crypto(_) | DatabaseError::Corrupt(_) | DatabaseError::Sqlx(_) => {
                Self::database(error.to_string())
            }
        }
        .with_source(error)
    }
}
