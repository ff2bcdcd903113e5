use std::collections::HashMap;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::backend::{BackendError, SessionBackend};
use super::record::SessionRecord;
use crate::types::{SessionId, UserId};

/// In-process session map behind a single reader/writer lock.
///
/// Used as the fallback replica next to the networked cache. Entries are not
/// dropped on their own: the sweeper removes expired ones.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    sessions: RwLock<HashMap<SessionId, SessionRecord>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Session IDs held for `user_id`. Linear scan.
    pub async fn ids_for_user(&self, user_id: UserId) -> Vec<SessionId> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.session_id.clone())
            .collect()
    }

    /// Remove every record expired at `now`. Returns how many were removed.
    pub async fn purge_expired(&self, now: OffsetDateTime) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, r| r.is_valid_at(now));
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl SessionBackend for MemoryBackend {
    async fn get(&self, session_id: &SessionId) -> Result<Option<SessionRecord>, BackendError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn put(&self, record: &SessionRecord, _ttl: Duration) -> Result<(), BackendError> {
        self.sessions
            .write()
            .await
            .insert(record.session_id.clone(), record.clone());
        Ok(())
    }

    async fn replace(&self, record: &SessionRecord, _ttl: Duration) -> Result<(), BackendError> {
        if let Some(existing) = self.sessions.write().await.get_mut(&record.session_id) {
            *existing = record.clone();
        }
        Ok(())
    }

    async fn delete(&self, session_id: &SessionId) -> Result<(), BackendError> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }

    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }
}
