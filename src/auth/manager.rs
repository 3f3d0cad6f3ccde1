//! Account management: sign-up, sign-in and password flows.

use chrono::{Duration, Utc};
use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::mailer::{EmailMessage, Mailer};
use super::password::{hash_password_with, verify_password, DEFAULT_ITERATIONS, MIN_PASSWORD_LEN};
use super::session::SessionSigner;
use super::types::{AuthError, Session, User};
use crate::storage::database::{parse_timestamp, parse_uuid};

/// How long a password reset link stays valid.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 60;

/// Manager for user accounts.
pub struct AuthManager<'a> {
    conn: &'a Connection,
    signer: &'a SessionSigner,
    iterations: u32,
}

impl<'a> AuthManager<'a> {
    /// Create a new auth manager with a database connection.
    pub fn new(conn: &'a Connection, signer: &'a SessionSigner) -> Self {
        Self {
            conn,
            signer,
            iterations: DEFAULT_ITERATIONS,
        }
    }

    /// Override the PBKDF2 iteration count used for new hashes.
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    /// Register a new account.
    pub fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<User, AuthError> {
        let email = normalize_email(email)?;
        validate_password(password)?;

        let full_name = full_name.trim();
        if full_name.is_empty() {
            return Err(AuthError::ValidationError("Name is required".to_string()));
        }

        if self.find_by_email(&email)?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email,
            full_name: full_name.to_string(),
            avatar_path: None,
            created_at: now,
        };

        self.conn.execute(
            "INSERT INTO users (id, email, password_hash, full_name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                user.id.to_string(),
                user.email,
                hash_password_with(password, self.iterations),
                user.full_name,
                now.to_rfc3339(),
            ],
        )?;

        tracing::info!(user_id = %user.id, "Account created");
        Ok(user)
    }

    /// Sign in with email and password.
    pub fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;

        let Some((user, hash)) = self.find_by_email(&email)? else {
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(password, &hash) {
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        let token = self.signer.issue(user.id, &user.email, now)?;
        let expires_at = self.signer.verify(&token, now)?.expires_at();

        Ok(Session {
            token,
            expires_at,
            user,
        })
    }

    /// Resolve a bearer token to its user.
    pub fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.signer.verify(token, Utc::now())?;
        self.get_user(claims.sub)?.ok_or(AuthError::InvalidToken)
    }

    /// Get a user by ID.
    pub fn get_user(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        self.conn
            .query_row(
                "SELECT id, email, full_name, avatar_path, created_at FROM users WHERE id = ?1",
                params![id.to_string()],
                parse_user_row,
            )
            .optional()
            .map_err(AuthError::from)
    }

    /// Count registered users.
    pub fn count_users(&self) -> Result<i64, AuthError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }

    /// Start a password reset. Unknown emails succeed silently.
    pub fn request_password_reset(
        &self,
        email: &str,
        site_url: &str,
        mailer: &dyn Mailer,
    ) -> Result<(), AuthError> {
        let Ok(email) = normalize_email(email) else {
            return Ok(());
        };
        let Some((user, _)) = self.find_by_email(&email)? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let mut raw = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut raw);
        let token = hex::encode(raw);
        let now = Utc::now();

        self.conn.execute(
            "INSERT INTO password_resets (token_hash, user_id, expires_at, used, created_at)
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![
                hash_reset_token(&token),
                user.id.to_string(),
                (now + Duration::minutes(RESET_TOKEN_TTL_MINUTES)).to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;

        let link = format!(
            "{}/reset-password?token={}",
            site_url.trim_end_matches('/'),
            token
        );
        let message = EmailMessage {
            to: user.email.clone(),
            subject: "Redefinição de senha".to_string(),
            body: format!(
                "Olá {}, use o link a seguir para redefinir sua senha: {}",
                user.full_name, link
            ),
        };
        if let Err(e) = mailer.send(message) {
            tracing::error!(user_id = %user.id, "Failed to send reset email: {}", e);
        }

        Ok(())
    }

    /// Complete a password reset with a token from the reset email.
    pub fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        validate_password(new_password)?;

        let row: Option<(String, String, bool)> = self
            .conn
            .query_row(
                "SELECT user_id, expires_at, used FROM password_resets WHERE token_hash = ?1",
                params![hash_reset_token(token)],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((user_id, expires_at, used)) = row else {
            return Err(AuthError::InvalidResetToken);
        };
        let expires_at = parse_timestamp(1, &expires_at)?;
        if used || expires_at <= Utc::now() {
            return Err(AuthError::InvalidResetToken);
        }

        self.conn.execute(
            "UPDATE password_resets SET used = 1 WHERE token_hash = ?1",
            params![hash_reset_token(token)],
        )?;
        self.set_password(parse_uuid(0, &user_id)?, new_password)
    }

    /// Change the password of a signed-in user.
    pub fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let hash: Option<String> = self
            .conn
            .query_row(
                "SELECT password_hash FROM users WHERE id = ?1",
                params![user_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let hash = hash.ok_or(AuthError::NotFound(user_id))?;

        if !verify_password(current_password, &hash) {
            return Err(AuthError::InvalidCredentials);
        }
        validate_password(new_password)?;
        self.set_password(user_id, new_password)
    }

    fn set_password(&self, user_id: Uuid, password: &str) -> Result<(), AuthError> {
        let updated = self.conn.execute(
            "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                hash_password_with(password, self.iterations),
                Utc::now().to_rfc3339(),
                user_id.to_string(),
            ],
        )?;
        if updated == 0 {
            return Err(AuthError::NotFound(user_id));
        }
        tracing::info!(%user_id, "Password updated");
        Ok(())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<(User, String)>, AuthError> {
        self.conn
            .query_row(
                "SELECT id, email, full_name, avatar_path, created_at, password_hash
                 FROM users WHERE email = ?1",
                params![email],
                |row| Ok((parse_user_row(row)?, row.get::<_, String>(5)?)),
            )
            .optional()
            .map_err(AuthError::from)
    }
}

/// Parse a user from a database row (id, email, full_name, avatar_path, created_at).
pub(crate) fn parse_user_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let created_at: String = row.get(4)?;
    Ok(User {
        id: parse_uuid(0, &id)?,
        email: row.get(1)?,
        full_name: row.get(2)?,
        avatar_path: row.get(3)?,
        created_at: parse_timestamp(4, &created_at)?,
    })
}

/// Trim and lowercase an email, rejecting obviously invalid ones.
pub fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AuthError::ValidationError("Invalid email".to_string())),
    }
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::ValidationError(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
