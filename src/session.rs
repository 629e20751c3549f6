//! Session lifecycle policy
//!
//! A user keeps talking into their most recent session until it goes idle
//! past the expiry window, at which point a fresh session (and a fresh
//! assistant thread) is started. Once a session holds `max_messages` user
//! messages the user is put on cooldown until the cooldown window has
//! elapsed since their last message.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::db::{MessageRole, Session, SessionRepo};
use crate::station::Station;
use crate::Result;

/// Limits applied to every station's sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Idle time after which a new session is started
    pub expiry: Duration,
    /// How long a user who hit the message cap must wait
    pub cooldown: Duration,
    /// User messages allowed per session
    pub max_messages: usize,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            expiry: Duration::from_secs(10 * 60),
            cooldown: Duration::from_secs(180 * 60),
            max_messages: 20,
        }
    }
}

/// Outcome of resolving a user's session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    /// The session to continue the conversation in
    Active(Session),
    /// The user hit the message cap; no session was created
    Cooldown { remaining: Duration },
}

/// Message count relative to the per-session cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageLimit {
    pub count: usize,
    pub has_reached_limit: bool,
    /// Notice appended to the assistant reply as the cap approaches
    pub warning: Option<&'static str>,
}

const WARNING_TWO_LEFT: &str = "\n\n[2 more responses remaining for the advanced AI.]";
const WARNING_ONE_LEFT: &str = "\n\n[1 more response remaining for the advanced AI.]";
const WARNING_LIMIT: &str =
    "\n\n[Message limit for the advanced AI reached. Reverting to the previous model.]";

/// Applies [`SessionPolicy`] on top of the session repository
#[derive(Clone)]
pub struct SessionManager {
    repo: SessionRepo,
    policy: SessionPolicy,
}

impl SessionManager {
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(repo: SessionRepo, policy: SessionPolicy) -> Self {
        Self { repo, policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Resolve the session a user's next message belongs to
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get_or_create_user_session(
        &self,
        station: &Station,
        user_id: &str,
        session_id: Option<&str>,
    ) -> Result<SessionStatus> {
        self.get_or_create_user_session_at(station, user_id, session_id, Utc::now())
    }

    /// [`Self::get_or_create_user_session`] with an explicit clock
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get_or_create_user_session_at(
        &self,
        station: &Station,
        user_id: &str,
        session_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SessionStatus> {
        let Some(existing) = self.repo.latest_for_user(station, user_id)? else {
            let session = self.repo.create(station, user_id, session_id, now)?;
            tracing::info!(
                station = %station.id,
                user_id,
                doc_id = %session.id,
                "created first user session"
            );
            return Ok(SessionStatus::Active(session));
        };

        let idle_ms = u64::try_from(existing.idle_millis(now.timestamp_millis())).unwrap_or(0);
        let idle = Duration::from_millis(idle_ms);

        if existing.user_message_count() >= self.policy.max_messages && idle <= self.policy.cooldown {
            let remaining = self.policy.cooldown - idle;
            tracing::info!(
                station = %station.id,
                user_id,
                remaining_secs = remaining.as_secs(),
                "user on cooldown"
            );
            return Ok(SessionStatus::Cooldown { remaining });
        }

        if idle > self.policy.expiry {
            let session = self.repo.create(station, user_id, session_id, now)?;
            tracing::info!(
                station = %station.id,
                user_id,
                doc_id = %session.id,
                previous = %existing.id,
                idle_secs = idle.as_secs(),
                "created new session after expiry"
            );
            return Ok(SessionStatus::Active(session));
        }

        Ok(SessionStatus::Active(existing))
    }

    /// Compare a session's user-message count against the cap
    #[must_use]
    pub fn check_message_limit(&self, session: &Session) -> MessageLimit {
        let count = session.user_message_count();
        let max = self.policy.max_messages;

        let warning = if count == max {
            Some(WARNING_LIMIT)
        } else if Some(count) == max.checked_sub(1) {
            Some(WARNING_ONE_LEFT)
        } else if Some(count) == max.checked_sub(2) {
            Some(WARNING_TWO_LEFT)
        } else {
            None
        };

        MessageLimit {
            count,
            has_reached_limit: count > max,
            warning,
        }
    }

    /// Fetch a session by document id
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get_session(&self, station: &Station, doc_id: &str) -> Result<Option<Session>> {
        self.repo.get(station, doc_id)
    }

    /// Record the remote thread backing a session
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn update_thread_id(&self, station: &Station, doc_id: &str, thread_id: &str) -> Result<bool> {
        let updated = self.repo.set_thread_id(station, doc_id, thread_id)?;
        if updated {
            tracing::info!(station = %station.id, doc_id, thread_id, "updated thread for session");
        } else {
            tracing::warn!(station = %station.id, doc_id, "session vanished before thread update");
        }
        Ok(updated)
    }

    /// Append a message to a session
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn add_message(
        &self,
        station: &Station,
        doc_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<Option<Session>> {
        let updated = self
            .repo
            .append_message(station, doc_id, role, content, Utc::now())?;
        tracing::debug!(station = %station.id, doc_id, role = role.as_str(), "added message to session");
        Ok(updated)
    }
}
