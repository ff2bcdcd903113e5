use std::time::Duration;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::Mutex;

use super::backend::{BackendError, SessionBackend};
use super::record::SessionRecord;
use crate::types::SessionId;

const DEFAULT_KEY_PREFIX: &str = "hostgate:session:";

/// Networked cache backend: one JSON value per session with a native TTL.
///
/// Connects lazily and reconnects on the next call after a failure, so the
/// process starts and serves (from the fallback map) while the cache is down.
pub struct RedisBackend {
    client: redis::Client,
    connection: Mutex<Option<ConnectionManager>>,
    key_prefix: String,
}

impl RedisBackend {
    /// # Errors
    ///
    /// Returns [`BackendError::Cache`] if `url` is not a valid Redis URL.
    /// No connection is attempted here.
    pub fn open(url: &str) -> Result<Self, BackendError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            connection: Mutex::new(None),
            key_prefix: DEFAULT_KEY_PREFIX.into(),
        })
    }

    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn key(&self, session_id: &SessionId) -> String {
        format!("{}{}", self.key_prefix, session_id.as_str())
    }

    async fn connection(&self) -> Result<ConnectionManager, BackendError> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = ConnectionManager::new(self.client.clone()).await?;
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn forget_connection(&self) {
        *self.connection.lock().await = None;
    }

    async fn run<T, F, Fut>(&self, op: F) -> Result<T, BackendError>
    where
        F: FnOnce(ConnectionManager) -> Fut,
        Fut: std::future::Future<Output = Result<T, redis::RedisError>>,
    {
        let conn = self.connection().await?;
        match op(conn).await {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.is_io_error() || e.is_connection_dropped() {
                    self.forget_connection().await;
                }
                Err(e.into())
            }
        }
    }
}

impl SessionBackend for RedisBackend {
    async fn get(&self, session_id: &SessionId) -> Result<Option<SessionRecord>, BackendError> {
        let key = self.key(session_id);
        let raw: Option<String> = self
            .run(|mut conn| async move { conn.get(&key).await })
            .await?;
        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(Into::into)
    }

    async fn put(&self, record: &SessionRecord, ttl: Duration) -> Result<(), BackendError> {
        let key = self.key(&record.session_id);
        let json = serde_json::to_string(record)?;
        let seconds = ttl.as_secs().max(1);
        self.run(|mut conn| async move { conn.set_ex::<_, _, ()>(&key, json, seconds).await })
            .await
    }

    async fn replace(&self, record: &SessionRecord, ttl: Duration) -> Result<(), BackendError> {
        let key = self.key(&record.session_id);
        let json = serde_json::to_string(record)?;
        let seconds = ttl.as_secs().max(1);
        // SET .. XX replies nil when the key is gone.
        self.run(|mut conn| async move {
            let _: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(json)
                .arg("EX")
                .arg(seconds)
                .arg("XX")
                .query_async(&mut conn)
                .await?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, session_id: &SessionId) -> Result<(), BackendError> {
        let key = self.key(session_id);
        self.run(|mut conn| async move { conn.del::<_, ()>(&key).await })
            .await
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.run(|mut conn| async move {
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }
}
