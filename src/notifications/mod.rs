//! User notifications.
//!
//! Rows are created server side (achievements, payments, forum replies)
//! and read, marked or deleted by their owner.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::realtime::{RealtimeHub, Topic};
use crate::storage::database::{parse_timestamp, parse_uuid};

/// Notification kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Achievement,
    Payment,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
            NotificationKind::Achievement => "achievement",
            NotificationKind::Payment => "payment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "info" => Some(NotificationKind::Info),
            "success" => Some(NotificationKind::Success),
            "warning" => Some(NotificationKind::Warning),
            "achievement" => Some(NotificationKind::Achievement),
            "payment" => Some(NotificationKind::Payment),
            _ => None,
        }
    }
}

/// A notification row.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Store for notifications.
pub struct NotificationStore<'a> {
    conn: &'a Connection,
    hub: Option<&'a RealtimeHub>,
}

impl<'a> NotificationStore<'a> {
    /// Create a store without realtime publishing.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn, hub: None }
    }

    /// Publish new rows to the user's notification channel.
    pub fn with_hub(mut self, hub: &'a RealtimeHub) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Create a notification for a user.
    pub fn create(
        &self,
        user_id: Uuid,
        title: &str,
        message: &str,
        kind: NotificationKind,
    ) -> Result<Notification, NotificationError> {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            message: message.to_string(),
            kind,
            read: false,
            created_at: Utc::now(),
        };

        self.conn.execute(
            "INSERT INTO notifications (id, user_id, title, message, kind, read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
            params![
                notification.id.to_string(),
                user_id.to_string(),
                notification.title,
                notification.message,
                kind.as_str(),
                notification.created_at.to_rfc3339(),
            ],
        )?;

        self.announce(&notification)?;
        Ok(notification)
    }

    /// Push a stored notification and the unread count to the hub, if any.
    pub fn announce(&self, notification: &Notification) -> Result<(), NotificationError> {
        if let Some(hub) = self.hub {
            let unread = self.unread_count(notification.user_id)?;
            hub.publish(
                notification.user_id,
                Topic::Notifications,
                serde_json::json!({ "latest": notification, "unread": unread }),
            );
        }
        Ok(())
    }

    /// List a user's notifications, newest first.
    pub fn list(&self, user_id: Uuid, unread_only: bool) -> Result<Vec<Notification>, NotificationError> {
        let sql = if unread_only {
            "SELECT id, user_id, title, message, kind, read, created_at FROM notifications
             WHERE user_id = ?1 AND read = 0 ORDER BY created_at DESC"
        } else {
            "SELECT id, user_id, title, message, kind, read, created_at FROM notifications
             WHERE user_id = ?1 ORDER BY created_at DESC"
        };
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![user_id.to_string()], parse_notification_row)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(NotificationError::from)
    }

    /// Mark one notification as read.
    pub fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<(), NotificationError> {
        let updated = self.conn.execute(
            "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
            params![id.to_string(), user_id.to_string()],
        )?;
        if updated == 0 {
            return Err(NotificationError::NotFound(id));
        }
        Ok(())
    }

    /// Mark all of a user's notifications as read.
    pub fn mark_all_read(&self, user_id: Uuid) -> Result<usize, NotificationError> {
        Ok(self.conn.execute(
            "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
            params![user_id.to_string()],
        )?)
    }

    /// Delete a notification.
    pub fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), NotificationError> {
        let deleted = self.conn.execute(
            "DELETE FROM notifications WHERE id = ?1 AND user_id = ?2",
            params![id.to_string(), user_id.to_string()],
        )?;
        if deleted == 0 {
            return Err(NotificationError::NotFound(id));
        }
        Ok(())
    }

    /// Count unread notifications.
    pub fn unread_count(&self, user_id: Uuid) -> Result<i64, NotificationError> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
            params![user_id.to_string()],
            |row| row.get(0),
        )?)
    }
}

fn parse_notification_row(row: &rusqlite::Row) -> rusqlite::Result<Notification> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let kind: String = row.get(4)?;
    let created_at: String = row.get(6)?;
    Ok(Notification {
        id: parse_uuid(0, &id)?,
        user_id: parse_uuid(1, &user_id)?,
        title: row.get(2)?,
        message: row.get(3)?,
        kind: NotificationKind::from_str(&kind).unwrap_or(NotificationKind::Info),
        read: row.get(5)?,
        created_at: parse_timestamp(6, &created_at)?,
    })
}

/// Notification errors.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Notification not found: {0}")]
    NotFound(Uuid),
}
