//! Local message and conversation stores
//!
//! Read queries over persisted chat history. The SQLite implementation opens a
//! connection per call so a store can be shared with background workers.

use crate::config::Config;
use crate::error::Result;
use crate::models::{CallEvent, Conversation, LifecycleType, MessageParameters};
use rusqlite::{params, Connection, OpenFlags, Row};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Read access to persisted chat messages
pub trait MessageStore: Send + Sync {
    /// All call lifecycle system messages, newest first
    fn call_events(&self) -> Result<Vec<CallEvent>>;

    /// Call lifecycle messages of one conversation, newest first
    fn messages_for_conversation(&self, conversation_id: &str) -> Result<Vec<CallEvent>>;
}

/// Read access to conversations of an account
pub trait ConversationStore: Send + Sync {
    fn conversation_by_internal_id(&self, account_id: i64, internal_id: &str) -> Result<Option<Conversation>>;

    fn conversation_by_token(&self, account_id: i64, token: &str) -> Result<Option<Conversation>>;

    fn conversations(&self, account_id: i64) -> Result<Vec<Conversation>>;
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    internal_id TEXT PRIMARY KEY,
    account_id INTEGER NOT NULL,
    token TEXT NOT NULL,
    display_name TEXT NOT NULL,
    actor_type TEXT NOT NULL,
    call_recording INTEGER NOT NULL DEFAULT 0,
    has_call INTEGER NOT NULL DEFAULT 0,
    call_flag INTEGER NOT NULL DEFAULT 0,
    call_start_time INTEGER NOT NULL DEFAULT 0,
    unread_messages INTEGER NOT NULL DEFAULT 0,
    unread_mention INTEGER NOT NULL DEFAULT 0,
    last_activity INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS chat_messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    internal_conversation_id TEXT NOT NULL,
    token TEXT NOT NULL,
    system_message_type TEXT NOT NULL DEFAULT '',
    timestamp INTEGER NOT NULL,
    message TEXT,
    message_parameters TEXT,
    message_type TEXT
);
CREATE INDEX IF NOT EXISTS idx_chat_messages_conversation
    ON chat_messages(internal_conversation_id, timestamp);
"#;

const CONVERSATION_COLUMNS: &str = "internal_id, account_id, token, display_name, actor_type, \
     call_recording, has_call, call_flag, call_start_time, unread_messages, unread_mention, last_activity";

/// SQLite-backed message and conversation store
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn new(config: &Config) -> Self {
        Self {
            db_path: config.messages_db.clone(),
        }
    }

    /// Open database connection (read-only to avoid lock contention)
    fn open_db(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(conn)
    }

    fn open_db_rw(&self) -> Result<Connection> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Connection::open(&self.db_path)?)
    }

    /// Create tables if missing
    pub fn initialize(&self) -> Result<()> {
        let conn = self.open_db_rw()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Insert or replace a conversation
    pub fn upsert_conversation(&self, conversation: &Conversation) -> Result<()> {
        let conn = self.open_db_rw()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO conversations ({}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                CONVERSATION_COLUMNS
            ),
            params![
                conversation.internal_id,
                conversation.account_id,
                conversation.token,
                conversation.display_name,
                conversation.actor_type,
                conversation.call_recording,
                conversation.has_call,
                conversation.call_flag,
                conversation.call_start_time,
                conversation.unread_messages,
                conversation.unread_mention,
                conversation.last_activity,
            ],
        )?;
        Ok(())
    }

    /// Insert a call event, returning its row id
    pub fn insert_event(&self, event: &CallEvent) -> Result<i64> {
        let conn = self.open_db_rw()?;
        let parameters = if event.parameters.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&event.parameters)?)
        };
        conn.execute(
            "INSERT INTO chat_messages \
             (internal_conversation_id, token, system_message_type, timestamp, message, message_parameters, message_type) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.conversation_id,
                event.token,
                event.system_message_type,
                event.timestamp,
                event.message,
                parameters,
                event.message_type,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn query_events(&self, conversation_id: Option<&str>) -> Result<Vec<CallEvent>> {
        let conn = self.open_db()?;

        let placeholders = LifecycleType::SYSTEM_MESSAGE_TYPES
            .iter()
            .map(|t| format!("'{}'", t))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!(
            r#"
            SELECT id, internal_conversation_id, token, system_message_type, timestamp,
                   message, message_parameters, message_type
            FROM chat_messages
            WHERE lower(system_message_type) IN ({})
            "#,
            placeholders
        );
        if conversation_id.is_some() {
            sql.push_str(" AND internal_conversation_id = ?1");
        }
        sql.push_str(" ORDER BY timestamp DESC, id DESC");

        let mut stmt = conn.prepare(&sql)?;
        let rows = match conversation_id {
            Some(id) => stmt.query_map([id], raw_event)?.collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt.query_map([], raw_event)?.collect::<rusqlite::Result<Vec<_>>>()?,
        };

        let mut events = Vec::with_capacity(rows.len());
        for raw in rows {
            let lifecycle = match raw.system_message_type.parse::<LifecycleType>() {
                Ok(l) => l,
                Err(_) => continue,
            };
            let parameters = parse_parameters(raw.id, raw.message_parameters.as_deref());

            events.push(CallEvent {
                id: raw.id,
                conversation_id: raw.conversation_id,
                token: raw.token,
                lifecycle,
                system_message_type: raw.system_message_type,
                timestamp: raw.timestamp,
                message: raw.message,
                parameters,
                message_type: raw.message_type,
            });
        }

        debug!(count = events.len(), conversation = ?conversation_id, "Loaded call events");
        Ok(events)
    }

    fn query_conversations(&self, filter: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<Conversation>> {
        let conn = self.open_db()?;
        let sql = format!("SELECT {} FROM conversations WHERE {}", CONVERSATION_COLUMNS, filter);
        let mut stmt = conn.prepare(&sql)?;
        let conversations = stmt
            .query_map(args, conversation_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(conversations)
    }
}

impl MessageStore for SqliteStore {
    fn call_events(&self) -> Result<Vec<CallEvent>> {
        self.query_events(None)
    }

    fn messages_for_conversation(&self, conversation_id: &str) -> Result<Vec<CallEvent>> {
        self.query_events(Some(conversation_id))
    }
}

impl ConversationStore for SqliteStore {
    fn conversation_by_internal_id(&self, account_id: i64, internal_id: &str) -> Result<Option<Conversation>> {
        let mut found = self.query_conversations(
            "account_id = ?1 AND internal_id = ?2",
            &[&account_id, &internal_id],
        )?;
        Ok(found.pop())
    }

    fn conversation_by_token(&self, account_id: i64, token: &str) -> Result<Option<Conversation>> {
        let mut found = self.query_conversations("account_id = ?1 AND token = ?2", &[&account_id, &token])?;
        Ok(found.pop())
    }

    fn conversations(&self, account_id: i64) -> Result<Vec<Conversation>> {
        self.query_conversations("account_id = ?1 ORDER BY last_activity DESC", &[&account_id])
    }
}

/// Row as stored, before lifecycle and parameter parsing
struct RawEvent {
    id: i64,
    conversation_id: String,
    token: String,
    system_message_type: String,
    timestamp: i64,
    message: Option<String>,
    message_parameters: Option<String>,
    message_type: Option<String>,
}

fn raw_event(row: &Row<'_>) -> rusqlite::Result<RawEvent> {
    Ok(RawEvent {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        token: row.get(2)?,
        system_message_type: row.get(3)?,
        timestamp: row.get(4)?,
        message: row.get(5)?,
        message_parameters: row.get(6)?,
        message_type: row.get(7)?,
    })
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        internal_id: row.get(0)?,
        account_id: row.get(1)?,
        token: row.get(2)?,
        display_name: row.get(3)?,
        actor_type: row.get(4)?,
        call_recording: row.get(5)?,
        has_call: row.get::<_, i32>(6)? != 0,
        call_flag: row.get(7)?,
        call_start_time: row.get(8)?,
        unread_messages: row.get(9)?,
        unread_mention: row.get::<_, i32>(10)? != 0,
        last_activity: row.get(11)?,
    })
}

/// Parse the stored parameter JSON; anything unreadable counts as no parameters
fn parse_parameters(message_id: i64, raw: Option<&str>) -> MessageParameters {
    let raw = match raw {
        Some(r) if !r.trim().is_empty() => r,
        _ => return MessageParameters::new(),
    };

    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(groups)) => groups
            .into_iter()
            .filter_map(|(group, value)| match value {
                serde_json::Value::Object(entries) => {
                    let entries = entries
                        .into_iter()
                        .filter_map(|(k, v)| match v {
                            serde_json::Value::String(s) => Some((k, s)),
                            serde_json::Value::Null => None,
                            other => Some((k, other.to_string())),
                        })
                        .collect();
                    Some((group, entries))
                }
                _ => None,
            })
            .collect(),
        Ok(_) => {
            warn!(message_id, "Message parameters are not an object, ignoring");
            MessageParameters::new()
        }
        Err(e) => {
            warn!(message_id, error = %e, "Unparsable message parameters, ignoring");
            MessageParameters::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seeded_store(temp_dir: &TempDir) -> SqliteStore {
        let config = Config::for_test(temp_dir.path());
        let store = SqliteStore::new(&config);
        store.initialize().unwrap();
        store
    }

    #[test]
    fn test_missing_db_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::new(&Config::for_test(temp_dir.path()));
        assert!(store.call_events().is_err());
    }

    #[test]
    fn test_call_events_filters_and_orders() {
        let temp_dir = TempDir::new().unwrap();
        let store = seeded_store(&temp_dir);

        store
            .insert_event(&CallEvent::new("c1", "tok1", LifecycleType::Started, 1000))
            .unwrap();
        store
            .insert_event(&CallEvent::new("c1", "tok1", LifecycleType::Ended, 1125))
            .unwrap();
        let mut comment = CallEvent::new("c1", "tok1", LifecycleType::Started, 1200);
        comment.system_message_type = String::new();
        store.insert_event(&comment).unwrap();

        let events = store.call_events().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].lifecycle, LifecycleType::Ended);
        assert_eq!(events[1].timestamp, 1000);
    }

    #[test]
    fn test_uppercase_types_are_call_events() {
        let temp_dir = TempDir::new().unwrap();
        let store = seeded_store(&temp_dir);

        let mut event = CallEvent::new("c1", "tok1", LifecycleType::Missed, 10);
        event.system_message_type = "CALL_MISSED".to_string();
        store.insert_event(&event).unwrap();

        let events = store.messages_for_conversation("c1").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].lifecycle, LifecycleType::Missed);
        assert_eq!(events[0].system_message_type, "CALL_MISSED");
    }

    #[test]
    fn test_parameters_round_trip_through_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = seeded_store(&temp_dir);

        let event = CallEvent::new("c1", "tok1", LifecycleType::Started, 10)
            .with_parameter("actor", "name", "Alice")
            .with_parameter("call", "callType", "video");
        store.insert_event(&event).unwrap();

        let loaded = store.messages_for_conversation("c1").unwrap();
        assert_eq!(loaded[0].parameters, event.parameters);
        assert!(store.messages_for_conversation("other").unwrap().is_empty());
    }

    #[test]
    fn test_parse_parameters_malformed() {
        assert!(parse_parameters(1, Some("{not json")).is_empty());
        assert!(parse_parameters(1, Some("[1, 2]")).is_empty());
        assert!(parse_parameters(1, None).is_empty());

        let parsed = parse_parameters(1, Some(r#"{"actor": {"id": 42, "name": "Bob", "x": null}, "bad": 3}"#));
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed["actor"]["id"], "42");
        assert_eq!(parsed["actor"]["name"], "Bob");
        assert!(!parsed["actor"].contains_key("x"));
    }

    #[test]
    fn test_conversation_lookups() {
        let temp_dir = TempDir::new().unwrap();
        let store = seeded_store(&temp_dir);

        let mut alice = Conversation::new("c1", 1, "tok1", "Alice", "users");
        alice.last_activity = 50;
        let mut team = Conversation::new("c2", 1, "tok2", "Team", "groups");
        team.last_activity = 100;
        team.unread_mention = true;
        let other_account = Conversation::new("c3", 2, "tok3", "Bob", "users");
        for c in [&alice, &team, &other_account] {
            store.upsert_conversation(c).unwrap();
        }

        assert_eq!(store.conversation_by_internal_id(1, "c1").unwrap(), Some(alice));
        assert_eq!(store.conversation_by_token(1, "tok2").unwrap().unwrap().display_name, "Team");
        assert!(store.conversation_by_internal_id(1, "c3").unwrap().is_none());

        let all = store.conversations(1).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].internal_id, "c2");
        assert!(all[0].unread_mention);
    }
}
