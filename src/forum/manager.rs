//! Forum posts, replies and likes.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::types::{Category, ForumError, ForumPost, ForumReply};
use crate::notifications::{NotificationKind, NotificationStore};
use crate::realtime::RealtimeHub;
use crate::storage::database::{parse_timestamp, parse_uuid};

/// Title length bounds, in characters.
pub const TITLE_MIN_CHARS: usize = 3;
pub const TITLE_MAX_CHARS: usize = 200;

/// Content length cap, in characters.
pub const CONTENT_MAX_CHARS: usize = 10_000;

/// Default page size for post listings.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

const POST_COLUMNS: &str = "p.id, p.author_id, u.full_name, p.category, p.title, p.content,
    p.likes_count, p.replies_count,
    EXISTS(SELECT 1 FROM forum_likes l WHERE l.post_id = p.id AND l.user_id = ?1),
    p.created_at";

/// Manager for the community forum.
pub struct ForumManager<'a> {
    conn: &'a Connection,
    hub: Option<&'a RealtimeHub>,
}

impl<'a> ForumManager<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn, hub: None }
    }

    /// Publish reply notifications to the realtime hub.
    pub fn with_hub(mut self, hub: &'a RealtimeHub) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Create a post.
    pub fn create_post(
        &self,
        author_id: Uuid,
        category: Category,
        title: &str,
        content: &str,
    ) -> Result<ForumPost, ForumError> {
        let title = title.trim();
        let content = content.trim();
        let title_len = title.chars().count();
        if !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&title_len) {
            return Err(ForumError::ValidationError(format!(
                "Title must be between {} and {} characters",
                TITLE_MIN_CHARS, TITLE_MAX_CHARS
            )));
        }
        validate_content(content)?;

        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO forum_posts (id, author_id, category, title, content, likes_count, replies_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, ?6)",
            params![
                id.to_string(),
                author_id.to_string(),
                category.as_str(),
                title,
                content,
                Utc::now().to_rfc3339(),
            ],
        )?;
        tracing::info!(post_id = %id, category = category.as_str(), "Forum post created");

        self.get_post(id, Some(author_id))?
            .ok_or(ForumError::PostNotFound(id))
    }

    /// List posts newest first, optionally filtered by category.
    pub fn list_posts(
        &self,
        category: Option<Category>,
        viewer: Option<Uuid>,
        limit: u32,
    ) -> Result<Vec<ForumPost>, ForumError> {
        let viewer = viewer.map(|v| v.to_string()).unwrap_or_default();
        let limit = if limit == 0 { DEFAULT_PAGE_SIZE } else { limit };

        let posts = match category {
            Some(category) => {
                let sql = format!(
                    "SELECT {} FROM forum_posts p JOIN users u ON u.id = p.author_id
                     WHERE p.category = ?2 ORDER BY p.created_at DESC LIMIT ?3",
                    POST_COLUMNS
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![viewer, category.as_str(), limit], parse_post_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM forum_posts p JOIN users u ON u.id = p.author_id
                     ORDER BY p.created_at DESC LIMIT ?2",
                    POST_COLUMNS
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![viewer, limit], parse_post_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(posts)
    }

    /// Get a post by ID.
    pub fn get_post(&self, id: Uuid, viewer: Option<Uuid>) -> Result<Option<ForumPost>, ForumError> {
        let sql = format!(
            "SELECT {} FROM forum_posts p JOIN users u ON u.id = p.author_id WHERE p.id = ?2",
            POST_COLUMNS
        );
        self.conn
            .query_row(
                &sql,
                params![viewer.map(|v| v.to_string()).unwrap_or_default(), id.to_string()],
                parse_post_row,
            )
            .optional()
            .map_err(ForumError::from)
    }

    /// Delete a post. Only its author may do so; replies and likes cascade.
    pub fn delete_post(&self, id: Uuid, user_id: Uuid) -> Result<(), ForumError> {
        let author: Option<String> = self
            .conn
            .query_row(
                "SELECT author_id FROM forum_posts WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match author {
            None => Err(ForumError::PostNotFound(id)),
            Some(author) if author != user_id.to_string() => Err(ForumError::NotAuthor),
            Some(_) => {
                self.conn
                    .execute("DELETE FROM forum_posts WHERE id = ?1", params![id.to_string()])?;
                tracing::info!(post_id = %id, "Forum post deleted");
                Ok(())
            }
        }
    }

    /// Reply to a post, keeping the post's reply counter in step.
    pub fn add_reply(&self, post_id: Uuid, author_id: Uuid, content: &str) -> Result<ForumReply, ForumError> {
        let content = content.trim();
        validate_content(content)?;

        let post = self
            .get_post(post_id, None)?
            .ok_or(ForumError::PostNotFound(post_id))?;

        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO forum_replies (id, post_id, author_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id.to_string(),
                post_id.to_string(),
                author_id.to_string(),
                content,
                created_at.to_rfc3339(),
            ],
        )?;
        tx.execute(
            "UPDATE forum_posts SET replies_count = replies_count + 1 WHERE id = ?1",
            params![post_id.to_string()],
        )?;
        tx.commit()?;

        let author_name: String = self.conn.query_row(
            "SELECT full_name FROM users WHERE id = ?1",
            params![author_id.to_string()],
            |row| row.get(0),
        )?;

        if post.author_id != author_id {
            let mut notifications = NotificationStore::new(self.conn);
            if let Some(hub) = self.hub {
                notifications = notifications.with_hub(hub);
            }
            notifications.create(
                post.author_id,
                "Nova resposta no seu post",
                &format!("{} respondeu \"{}\"", author_name, post.title),
                NotificationKind::Info,
            )?;
        }

        Ok(ForumReply {
            id,
            post_id,
            author_id,
            author_name,
            content: content.to_string(),
            created_at,
        })
    }

    /// Replies to a post, oldest first.
    pub fn list_replies(&self, post_id: Uuid) -> Result<Vec<ForumReply>, ForumError> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, r.post_id, r.author_id, u.full_name, r.content, r.created_at
             FROM forum_replies r JOIN users u ON u.id = r.author_id
             WHERE r.post_id = ?1 ORDER BY r.created_at ASC",
        )?;
        let rows = stmt.query_map(params![post_id.to_string()], |row| {
            let id: String = row.get(0)?;
            let post_id: String = row.get(1)?;
            let author_id: String = row.get(2)?;
            let created_at: String = row.get(5)?;
            Ok(ForumReply {
                id: parse_uuid(0, &id)?,
                post_id: parse_uuid(1, &post_id)?,
                author_id: parse_uuid(2, &author_id)?,
                author_name: row.get(3)?,
                content: row.get(4)?,
                created_at: parse_timestamp(5, &created_at)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(ForumError::from)
    }

    /// Like or unlike a post. Returns whether the user now likes it.
    pub fn toggle_like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, ForumError> {
        let tx = self.conn.unchecked_transaction()?;

        let exists: bool = tx
            .query_row(
                "SELECT 1 FROM forum_posts WHERE id = ?1",
                params![post_id.to_string()],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if !exists {
            return Err(ForumError::PostNotFound(post_id));
        }

        let removed = tx.execute(
            "DELETE FROM forum_likes WHERE post_id = ?1 AND user_id = ?2",
            params![post_id.to_string(), user_id.to_string()],
        )?;

        let liked = if removed > 0 {
            tx.execute(
                "UPDATE forum_posts SET likes_count = MAX(likes_count - 1, 0) WHERE id = ?1",
                params![post_id.to_string()],
            )?;
            false
        } else {
            tx.execute(
                "INSERT INTO forum_likes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                params![post_id.to_string(), user_id.to_string(), Utc::now().to_rfc3339()],
            )?;
            tx.execute(
                "UPDATE forum_posts SET likes_count = likes_count + 1 WHERE id = ?1",
                params![post_id.to_string()],
            )?;
            true
        };

        tx.commit()?;
        Ok(liked)
    }
}

fn validate_content(content: &str) -> Result<(), ForumError> {
    if content.is_empty() {
        return Err(ForumError::ValidationError("Content must not be empty".to_string()));
    }
    if content.chars().count() > CONTENT_MAX_CHARS {
        return Err(ForumError::ValidationError(format!(
            "Content must be at most {} characters",
            CONTENT_MAX_CHARS
        )));
    }
    Ok(())
}

pub(crate) fn parse_post_row(row: &rusqlite::Row) -> rusqlite::Result<ForumPost> {
    let id: String = row.get(0)?;
    let author_id: String = row.get(1)?;
    let category: String = row.get(3)?;
    let created_at: String = row.get(9)?;

    Ok(ForumPost {
        id: parse_uuid(0, &id)?,
        author_id: parse_uuid(1, &author_id)?,
        author_name: row.get(2)?,
        category: Category::from_str(&category).unwrap_or(Category::General),
        title: row.get(4)?,
        content: row.get(5)?,
        likes_count: row.get(6)?,
        replies_count: row.get(7)?,
        liked: row.get(8)?,
        created_at: parse_timestamp(9, &created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    fn insert_user(conn: &Connection, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO users (id, email, password_hash, full_name, created_at, updated_at)
             VALUES (?1, ?2, 'x', ?3, ?4, ?4)",
            params![id.to_string(), format!("{}@test.dev", id), name, now],
        )
        .unwrap();
        id
    }

    #[test]
    fn test_create_and_get_post() {
        let db = Database::open_in_memory().unwrap();
        let forum = ForumManager::new(db.connection());
        let ana = insert_user(db.connection(), "Ana");

        let post = forum
            .create_post(ana, Category::Progress, "  -5kg em 2 meses ", "Valeu pessoal!")
            .unwrap();
        assert_eq!(post.title, "-5kg em 2 meses");
        assert_eq!(post.author_name, "Ana");
        assert_eq!(post.likes_count, 0);
        assert!(!post.liked);

        let fetched = forum.get_post(post.id, None).unwrap().unwrap();
        assert_eq!(fetched.category, Category::Progress);
    }

    #[test]
    fn test_validation() {
        let db = Database::open_in_memory().unwrap();
        let forum = ForumManager::new(db.connection());
        let ana = insert_user(db.connection(), "Ana");

        assert!(matches!(
            forum.create_post(ana, Category::General, "oi", "conteúdo"),
            Err(ForumError::ValidationError(_))
        ));
        assert!(matches!(
            forum.create_post(ana, Category::General, "Título ok", "   "),
            Err(ForumError::ValidationError(_))
        ));
        let long = "x".repeat(TITLE_MAX_CHARS + 1);
        assert!(forum.create_post(ana, Category::General, &long, "c").is_err());
    }

    #[test]
    fn test_list_filters_by_category() {
        let db = Database::open_in_memory().unwrap();
        let forum = ForumManager::new(db.connection());
        let ana = insert_user(db.connection(), "Ana");

        forum.create_post(ana, Category::Nutrition, "Receita fit", "Panqueca de aveia").unwrap();
        forum.create_post(ana, Category::Workouts, "Treino HIIT", "20 minutos").unwrap();

        assert_eq!(forum.list_posts(None, None, 0).unwrap().len(), 2);
        let nutrition = forum.list_posts(Some(Category::Nutrition), None, 10).unwrap();
        assert_eq!(nutrition.len(), 1);
        assert_eq!(nutrition[0].title, "Receita fit");
    }

    #[test]
    fn test_only_author_can_delete() {
        let db = Database::open_in_memory().unwrap();
        let forum = ForumManager::new(db.connection());
        let ana = insert_user(db.connection(), "Ana");
        let bia = insert_user(db.connection(), "Bia");

        let post = forum.create_post(ana, Category::General, "Olá a todos", "Primeiro post").unwrap();
        forum.add_reply(post.id, bia, "Bem-vinda!").unwrap();

        assert!(matches!(forum.delete_post(post.id, bia), Err(ForumError::NotAuthor)));
        forum.delete_post(post.id, ana).unwrap();
        assert!(forum.get_post(post.id, None).unwrap().is_none());
        assert!(forum.list_replies(post.id).unwrap().is_empty());
        assert!(matches!(forum.delete_post(post.id, ana), Err(ForumError::PostNotFound(_))));
    }

    #[test]
    fn test_replies_update_counter_and_notify_author() {
        let db = Database::open_in_memory().unwrap();
        let forum = ForumManager::new(db.connection());
        let ana = insert_user(db.connection(), "Ana");
        let bia = insert_user(db.connection(), "Bia");

        let post = forum.create_post(ana, Category::Motivation, "Bora treinar", "Quem vem?").unwrap();
        forum.add_reply(post.id, bia, "Eu!").unwrap();
        forum.add_reply(post.id, ana, "Boa!").unwrap();

        let post = forum.get_post(post.id, None).unwrap().unwrap();
        assert_eq!(post.replies_count, 2);

        let replies = forum.list_replies(post.id).unwrap();
        assert_eq!(replies[0].author_name, "Bia");

        // Own reply does not notify
        let notes = NotificationStore::new(db.connection()).list(ana, false).unwrap();
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn test_reply_to_missing_post() {
        let db = Database::open_in_memory().unwrap();
        let forum = ForumManager::new(db.connection());
        let ana = insert_user(db.connection(), "Ana");

        assert!(matches!(
            forum.add_reply(Uuid::new_v4(), ana, "oi"),
            Err(ForumError::PostNotFound(_))
        ));
    }

    #[test]
    fn test_toggle_like_keeps_count_in_step() {
        let db = Database::open_in_memory().unwrap();
        let forum = ForumManager::new(db.connection());
        let ana = insert_user(db.connection(), "Ana");
        let bia = insert_user(db.connection(), "Bia");

        let post = forum.create_post(ana, Category::General, "Curtam", "por favor").unwrap();

        assert!(forum.toggle_like(post.id, bia).unwrap());
        assert!(forum.toggle_like(post.id, ana).unwrap());
        let fetched = forum.get_post(post.id, Some(bia)).unwrap().unwrap();
        assert_eq!(fetched.likes_count, 2);
        assert!(fetched.liked);

        assert!(!forum.toggle_like(post.id, bia).unwrap());
        let fetched = forum.get_post(post.id, Some(bia)).unwrap().unwrap();
        assert_eq!(fetched.likes_count, 1);
        assert!(!fetched.liked);

        let rows: u32 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM forum_likes WHERE post_id = ?1", params![post.id.to_string()], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, fetched.likes_count);
    }
}
