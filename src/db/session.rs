//! Session repository: conversation records per station

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use super::store::{Direction, DocumentStore, FilterOp, Query};
use crate::localtime::{self, TimeFormat};
use crate::station::Station;
use crate::Result;

/// A conversation session as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Document id (not part of the stored body)
    #[serde(skip)]
    pub id: String,
    pub user_id: String,
    /// Session id reported by the conversational platform
    #[serde(default)]
    pub session_id: Option<String>,
    /// Remote assistant thread, created lazily on the first assistant turn
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
    /// Epoch milliseconds of the last recorded message
    pub last_activity: i64,
}

impl Session {
    /// Number of messages sent by the user
    #[must_use]
    pub fn user_message_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .count()
    }

    /// Milliseconds elapsed since the last activity
    #[must_use]
    pub const fn idle_millis(&self, now_ms: i64) -> i64 {
        now_ms - self.last_activity
    }
}

/// A message in a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Session repository
#[derive(Clone)]
pub struct SessionRepo {
    store: DocumentStore,
    timezone: Tz,
}

impl SessionRepo {
    /// Create a new session repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(store: DocumentStore, timezone: Tz) -> Self {
        Self { store, timezone }
    }

    /// Create an empty session for a user
    ///
    /// The document id is the local session timestamp plus a short random
    /// suffix so two users starting in the same second do not collide.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn create(
        &self,
        station: &Station,
        user_id: &str,
        session_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        let label = localtime::format_at(now, TimeFormat::Session, self.timezone);
        let suffix = Uuid::new_v4().simple().to_string();
        let id = format!("{label}-{}", &suffix[..8]);

        let session = Session {
            id,
            user_id: user_id.to_string(),
            session_id: session_id.map(ToString::to_string),
            thread_id: None,
            messages: Vec::new(),
            last_activity: now.timestamp_millis(),
        };

        self.store
            .set(&station.sessions_collection(), &session.id, &session)?;
        Ok(session)
    }

    /// Fetch a session by document id
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails or the body is malformed
    pub fn get(&self, station: &Station, id: &str) -> Result<Option<Session>> {
        self.store
            .get(&station.sessions_collection(), id)?
            .map(|doc| {
                let mut session: Session = doc.parse()?;
                session.id = doc.id;
                Ok(session)
            })
            .transpose()
    }

    /// The user's most recently active session
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails or the body is malformed
    pub fn latest_for_user(&self, station: &Station, user_id: &str) -> Result<Option<Session>> {
        let query = Query::new()
            .filter("userId", FilterOp::Eq, user_id)
            .order_by("lastActivity", Direction::Desc)
            .limit(1);

        self.store
            .query(&station.sessions_collection(), &query)?
            .into_iter()
            .next()
            .map(|doc| {
                let mut session: Session = doc.parse()?;
                session.id = doc.id;
                Ok(session)
            })
            .transpose()
    }

    /// Record the remote thread for a session; `false` if the session is gone
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn set_thread_id(&self, station: &Station, id: &str, thread_id: &str) -> Result<bool> {
        let updated = self
            .store
            .update(&station.sessions_collection(), id, |fields| {
                fields.insert("threadId".to_string(), json!(thread_id));
            })?;
        Ok(updated.is_some())
    }

    /// Append a message and bump `lastActivity`
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails or the body is malformed
    pub fn append_message(
        &self,
        station: &Station,
        id: &str,
        role: MessageRole,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>> {
        let message = serde_json::to_value(StoredMessage {
            role,
            content: content.to_string(),
            timestamp: now,
        })?;

        let updated = self
            .store
            .update(&station.sessions_collection(), id, |fields| {
                match fields.get_mut("messages") {
                    Some(Value::Array(list)) => list.push(message),
                    _ => {
                        fields.insert("messages".to_string(), Value::Array(vec![message]));
                    }
                }
                fields.insert("lastActivity".to_string(), json!(now.timestamp_millis()));
            })?;

        updated
            .map(|doc| {
                let mut session: Session = doc.parse()?;
                session.id = doc.id;
                Ok(session)
            })
            .transpose()
    }

    /// Ids of sessions whose last activity falls in `[start_ms, end_ms)`
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn ids_active_between(
        &self,
        station: &Station,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<String>> {
        let query = Query::new()
            .filter("lastActivity", FilterOp::Gte, start_ms)
            .filter("lastActivity", FilterOp::Lt, end_ms);

        Ok(self
            .store
            .query(&station.sessions_collection(), &query)?
            .into_iter()
            .map(|doc| doc.id)
            .collect())
    }

    /// Delete sessions by id in store-sized batches
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn delete_many(&self, station: &Station, ids: &[String]) -> Result<usize> {
        self.store.delete_many(&station.sessions_collection(), ids)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::db::init_memory;
    use crate::localtime::DEFAULT_TIMEZONE;

    fn repo() -> SessionRepo {
        SessionRepo::new(DocumentStore::new(init_memory().unwrap()), DEFAULT_TIMEZONE)
    }

    fn station() -> Station {
        Station::new("n6", "News On 6", "asst_6")
    }

    #[test]
    fn test_create_uses_local_timestamp_id() {
        let repo = repo();
        let now = DateTime::parse_from_rfc3339("2024-11-29T22:59:10Z")
            .unwrap()
            .with_timezone(&Utc);
        let session = repo.create(&station(), "user-1", Some("wx-1"), now).unwrap();

        assert!(session.id.starts_with("November 29 2024 at 4:59:10 PM-"));
        let loaded = repo.get(&station(), &session.id).unwrap().unwrap();
        assert_eq!(loaded, session);
    }

    #[test]
    fn test_latest_for_user_picks_most_recent() {
        let repo = repo();
        let now = Utc::now();
        let older = repo
            .create(&station(), "user-1", None, now - Duration::hours(2))
            .unwrap();
        let newer = repo.create(&station(), "user-1", None, now).unwrap();
        repo.create(&station(), "user-2", None, now + Duration::minutes(1))
            .unwrap();

        let latest = repo.latest_for_user(&station(), "user-1").unwrap().unwrap();
        assert_eq!(latest.id, newer.id);
        assert_ne!(latest.id, older.id);
        assert!(repo.latest_for_user(&station(), "nobody").unwrap().is_none());
    }

    #[test]
    fn test_append_message_and_thread() {
        let repo = repo();
        let start = Utc::now() - Duration::minutes(5);
        let session = repo.create(&station(), "user-1", None, start).unwrap();

        let now = Utc::now();
        let updated = repo
            .append_message(&station(), &session.id, MessageRole::User, "hello", now)
            .unwrap()
            .unwrap();
        assert_eq!(updated.messages.len(), 1);
        assert_eq!(updated.messages[0].content, "hello");
        assert_eq!(updated.last_activity, now.timestamp_millis());
        assert_eq!(updated.user_message_count(), 1);

        assert!(repo.set_thread_id(&station(), &session.id, "thread_1").unwrap());
        let loaded = repo.get(&station(), &session.id).unwrap().unwrap();
        assert_eq!(loaded.thread_id.as_deref(), Some("thread_1"));

        let missing = repo
            .append_message(&station(), "missing", MessageRole::User, "x", now)
            .unwrap();
        assert!(missing.is_none());
        assert!(!repo.set_thread_id(&station(), "missing", "t").unwrap());
    }

    #[test]
    fn test_stations_do_not_share_sessions() {
        let repo = repo();
        let n9 = Station::new("n9", "News 9", "asst_9");
        repo.create(&station(), "user-1", None, Utc::now()).unwrap();
        assert!(repo.latest_for_user(&n9, "user-1").unwrap().is_none());
    }
}
