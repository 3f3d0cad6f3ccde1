//! Avatar image bucket.
//!
//! Files live under `<data_dir>/avatars/<user_id>.<ext>`; the relative
//! file name is recorded on the user row.

use std::path::PathBuf;

use chrono::Utc;
use image::ImageFormat;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

/// Maximum accepted avatar size.
pub const MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;

/// File-backed avatar store.
pub struct AvatarStore<'a> {
    conn: &'a Connection,
    root: PathBuf,
}

/// A stored avatar image.
#[derive(Debug, Clone)]
pub struct Avatar {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

impl<'a> AvatarStore<'a> {
    /// Create a store writing under `root`.
    pub fn new(conn: &'a Connection, root: PathBuf) -> Self {
        Self { conn, root }
    }

    /// Validate and save an avatar, replacing any previous one.
    pub fn save(&self, user_id: Uuid, bytes: &[u8]) -> Result<String, AvatarError> {
        if bytes.is_empty() {
            return Err(AvatarError::Empty);
        }
        if bytes.len() > MAX_AVATAR_BYTES {
            return Err(AvatarError::TooLarge(bytes.len()));
        }

        let format = image::guess_format(bytes).map_err(|_| AvatarError::UnsupportedFormat)?;
        let ext = match format {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            _ => return Err(AvatarError::UnsupportedFormat),
        };

        std::fs::create_dir_all(&self.root)?;

        let previous = self.current_file(user_id)?;
        let file_name = format!("{}.{}", user_id, ext);
        std::fs::write(self.root.join(&file_name), bytes)?;

        let updated = self.conn.execute(
            "UPDATE users SET avatar_path = ?1, updated_at = ?2 WHERE id = ?3",
            params![file_name, Utc::now().to_rfc3339(), user_id.to_string()],
        )?;
        if updated == 0 {
            let _ = std::fs::remove_file(self.root.join(&file_name));
            return Err(AvatarError::UserNotFound(user_id));
        }

        // Only drop the old file once the new one is recorded.
        if let Some(previous) = previous.filter(|p| *p != file_name) {
            if let Err(e) = std::fs::remove_file(self.root.join(&previous)) {
                tracing::warn!(%user_id, file = %previous, "Failed to remove old avatar: {}", e);
            }
        }

        tracing::debug!(%user_id, file = %file_name, "Avatar saved");
        Ok(file_name)
    }

    /// Load the avatar for a user, if one was uploaded.
    pub fn load(&self, user_id: Uuid) -> Result<Option<Avatar>, AvatarError> {
        let Some(file_name) = self.current_file(user_id)? else {
            return Ok(None);
        };

        let content_type = if file_name.ends_with(".png") {
            "image/png"
        } else {
            "image/jpeg"
        };

        match std::fs::read(self.root.join(&file_name)) {
            Ok(bytes) => Ok(Some(Avatar {
                bytes,
                content_type,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn current_file(&self, user_id: Uuid) -> Result<Option<String>, AvatarError> {
        let path: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT avatar_path FROM users WHERE id = ?1",
                params![user_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(path.flatten())
    }
}

/// Avatar errors.
#[derive(Debug, thiserror::Error)]
pub enum AvatarError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Avatar is empty")]
    Empty,

    #[error("Avatar is too large ({0} bytes)")]
    TooLarge(usize),

    #[error("Only PNG and JPEG avatars are supported")]
    UnsupportedFormat,

    #[error("User not found: {0}")]
    UserNotFound(Uuid),
}
