//! Transcripts and the chat round trip.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::{params, Connection};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::client::LlmClient;
use super::types::{AssistantError, AssistantKind, ChatMessage, Reply, Role, Turn};
use crate::realtime::{RealtimeHub, Topic};
use crate::storage::database::{parse_timestamp, parse_uuid};
use crate::storage::Database;

/// Longest accepted user message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Persisted chat transcripts.
pub struct TranscriptStore<'a> {
    conn: &'a Connection,
}

impl<'a> TranscriptStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Append a turn to a user's transcript.
    pub fn append(
        &self,
        user_id: Uuid,
        kind: AssistantKind,
        role: Role,
        content: &str,
    ) -> Result<ChatMessage, AssistantError> {
        let message = ChatMessage {
            id: Uuid::new_v4(),
            user_id,
            assistant: kind,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };

        self.conn.execute(
            "INSERT INTO chat_messages (id, user_id, assistant, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.id.to_string(),
                user_id.to_string(),
                kind.as_str(),
                role.as_str(),
                message.content,
                message.created_at.to_rfc3339(),
            ],
        )?;

        Ok(message)
    }

    /// Full transcript, oldest first.
    pub fn history(&self, user_id: Uuid, kind: AssistantKind) -> Result<Vec<ChatMessage>, AssistantError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, assistant, role, content, created_at
             FROM chat_messages WHERE user_id = ?1 AND assistant = ?2
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![user_id.to_string(), kind.as_str()], parse_message_row)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(AssistantError::from)
    }

    /// Delete a transcript, returning the number of removed turns.
    pub fn clear(&self, user_id: Uuid, kind: AssistantKind) -> Result<usize, AssistantError> {
        let removed = self.conn.execute(
            "DELETE FROM chat_messages WHERE user_id = ?1 AND assistant = ?2",
            params![user_id.to_string(), kind.as_str()],
        )?;
        Ok(removed)
    }
}

fn parse_message_row(row: &rusqlite::Row) -> rusqlite::Result<ChatMessage> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let assistant: String = row.get(2)?;
    let role: String = row.get(3)?;
    let created_at: String = row.get(5)?;

    Ok(ChatMessage {
        id: parse_uuid(0, &id)?,
        user_id: parse_uuid(1, &user_id)?,
        assistant: AssistantKind::from_str(&assistant).unwrap_or(AssistantKind::Workout),
        role: Role::from_str(&role).unwrap_or(Role::User),
        content: row.get(4)?,
        created_at: parse_timestamp(5, &created_at)?,
    })
}

/// Chat round trip: persist the user turn, ask the model, persist the reply.
///
/// The database lock is released while the completion request is in flight.
#[derive(Clone)]
pub struct ChatService {
    db: Arc<Mutex<Database>>,
    client: LlmClient,
    hub: Arc<RealtimeHub>,
}

impl ChatService {
    pub fn new(db: Arc<Mutex<Database>>, client: LlmClient, hub: Arc<RealtimeHub>) -> Self {
        Self { db, client, hub }
    }

    /// Send a user message and return the assistant's reply.
    pub async fn send(
        &self,
        user_id: Uuid,
        kind: AssistantKind,
        message: &str,
    ) -> Result<Reply, AssistantError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AssistantError::ValidationError(
                "Message must not be empty".to_string(),
            ));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(AssistantError::ValidationError(format!(
                "Message must be at most {} characters",
                MAX_MESSAGE_CHARS
            )));
        }

        let history: Vec<Turn> = {
            let db = self.db.lock().await;
            let store = TranscriptStore::new(db.connection());
            store.append(user_id, kind, Role::User, message)?;
            store.history(user_id, kind)?.iter().map(Turn::from).collect()
        };

        self.publish_status(user_id, kind, "processing");
        let reply = self.client.complete(kind, &history).await;

        let stored = {
            let db = self.db.lock().await;
            TranscriptStore::new(db.connection()).append(user_id, kind, Role::Assistant, &reply.content)
        };
        self.publish_status(user_id, kind, "idle");
        stored?;

        tracing::debug!(%user_id, assistant = kind.as_str(), source = ?reply.source, "Assistant replied");
        Ok(reply)
    }

    /// Full transcript, oldest first.
    pub async fn history(&self, user_id: Uuid, kind: AssistantKind) -> Result<Vec<ChatMessage>, AssistantError> {
        let db = self.db.lock().await;
        TranscriptStore::new(db.connection()).history(user_id, kind)
    }

    /// Delete a transcript.
    pub async fn clear(&self, user_id: Uuid, kind: AssistantKind) -> Result<usize, AssistantError> {
        let db = self.db.lock().await;
        TranscriptStore::new(db.connection()).clear(user_id, kind)
    }

    fn publish_status(&self, user_id: Uuid, kind: AssistantKind, status: &str) {
        self.hub.publish(
            user_id,
            Topic::Assistant,
            serde_json::json!({ "assistant": kind.as_str(), "status": status }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::prompts::fallback_reply;
    use crate::assistant::types::ReplySource;
    use crate::storage::config::AssistantSettings;

    fn insert_user(conn: &Connection) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO users (id, email, password_hash, full_name, created_at, updated_at)
             VALUES (?1, ?2, 'x', 'Test', ?3, ?3)",
            params![id.to_string(), format!("{}@test.dev", id), now],
        )
        .unwrap();
        id
    }

    fn offline_service() -> (ChatService, Arc<Mutex<Database>>, Arc<RealtimeHub>) {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let hub = Arc::new(RealtimeHub::new());
        let client = LlmClient::from_settings(&AssistantSettings::default()).unwrap();
        (ChatService::new(db.clone(), client, hub.clone()), db, hub)
    }

    #[test]
    fn test_transcripts_are_per_assistant() {
        let db = Database::open_in_memory().unwrap();
        let user = insert_user(db.connection());
        let store = TranscriptStore::new(db.connection());

        store.append(user, AssistantKind::Workout, Role::User, "treino?").unwrap();
        store.append(user, AssistantKind::Workout, Role::Assistant, "agachamento").unwrap();
        store.append(user, AssistantKind::Nutrition, Role::User, "dieta?").unwrap();

        let workout = store.history(user, AssistantKind::Workout).unwrap();
        assert_eq!(workout.len(), 2);
        assert_eq!(workout[0].role, Role::User);
        assert_eq!(workout[1].content, "agachamento");

        assert_eq!(store.clear(user, AssistantKind::Workout).unwrap(), 2);
        assert!(store.history(user, AssistantKind::Workout).unwrap().is_empty());
        assert_eq!(store.history(user, AssistantKind::Nutrition).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_send_without_key_persists_fallback() {
        let (service, db, hub) = offline_service();
        let user = insert_user(db.lock().await.connection());

        let reply = service.send(user, AssistantKind::Workout, "  Monte um treino  ").await.unwrap();
        assert_eq!(reply.source, ReplySource::Fallback);

        let history = service.history(user, AssistantKind::Workout).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "Monte um treino");
        assert_eq!(history[1].content, fallback_reply(AssistantKind::Workout));

        let status = hub.latest(user, Topic::Assistant).unwrap();
        assert_eq!(status.payload["status"], "idle");
    }

    #[tokio::test]
    async fn test_send_rejects_empty_message() {
        let (service, db, _) = offline_service();
        let user = insert_user(db.lock().await.connection());

        let err = service.send(user, AssistantKind::Nutrition, "   ").await.unwrap_err();
        assert!(matches!(err, AssistantError::ValidationError(_)));
        assert!(service.history(user, AssistantKind::Nutrition).await.unwrap().is_empty());
    }
}
