//! Shared auth types and error definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A registered user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub avatar_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A signed-in session.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    /// Bearer token
    pub token: String,
    /// When the token stops being accepted
    pub expires_at: Option<DateTime<Utc>>,
    pub user: User,
}

/// Error types for auth operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid or expired session")]
    InvalidToken,

    #[error("Invalid or expired reset link")]
    InvalidResetToken,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User not found: {0}")]
    NotFound(Uuid),

    #[error("Internal error: {0}")]
    Internal(String),
}
