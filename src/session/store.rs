use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;

use super::backend::{BackendError, SessionBackend, SessionBackendDyn};
use super::memory::MemoryBackend;
use super::record::SessionRecord;
use crate::types::{SessionId, UserId};

const DEFAULT_SESSION_LIFETIME: time::Duration = time::Duration::hours(24);
const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_millis(250);

/// Session store with a primary backend and an in-process fallback.
///
/// Reads try the primary first and fall back to the map on a miss or an error.
/// Writes go to both; a failed primary write is logged, never surfaced.
/// The two replicas are not kept in lockstep: a record present and unexpired in
/// either one is a valid session.
pub struct SessionStore {
    primary: Box<dyn SessionBackendDyn>,
    fallback: Arc<MemoryBackend>,
    lifetime: time::Duration,
    cache_timeout: Duration,
}

impl SessionStore {
    /// Compose `primary` with `fallback`. The fallback is shared so the sweeper
    /// can own a handle to it.
    #[must_use]
    pub fn new(primary: impl SessionBackend, fallback: Arc<MemoryBackend>) -> Self {
        Self {
            primary: Box::new(primary),
            fallback,
            lifetime: DEFAULT_SESSION_LIFETIME,
            cache_timeout: DEFAULT_CACHE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_lifetime(mut self, lifetime: time::Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Upper bound on any single primary call before it counts as failed.
    #[must_use]
    pub fn with_cache_timeout(mut self, timeout: Duration) -> Self {
        self.cache_timeout = timeout;
        self
    }

    #[must_use]
    pub fn fallback(&self) -> &Arc<MemoryBackend> {
        &self.fallback
    }

    #[must_use]
    pub fn lifetime(&self) -> time::Duration {
        self.lifetime
    }

    /// Start a session for `user_id`. Always succeeds; login is never blocked
    /// by the cache.
    pub async fn create(
        &self,
        user_id: UserId,
        origin_domain: &str,
        device_tag: &str,
    ) -> SessionRecord {
        let now = OffsetDateTime::now_utc();
        let record = SessionRecord::new(
            SessionId::generate(),
            user_id,
            origin_domain,
            device_tag,
            now,
            self.lifetime,
        );
        let ttl = record.remaining(now).unwrap_or(Duration::from_secs(1));

        if let Err(e) = self.timed(self.primary.put_dyn(&record, ttl)).await {
            tracing::warn!(
                error = %e,
                session = %record.session_id.redacted(),
                "Session cache write failed; kept in fallback map only"
            );
        }
        // Infallible for the in-process map.
        let _ = self.fallback.put(&record, ttl).await;

        tracing::info!(
            user_id = %user_id,
            session = %record.session_id.redacted(),
            origin = %record.origin_domain,
            "Session created"
        );
        record
    }

    /// Look up a session and check that it is still valid right now.
    pub async fn validate(&self, session_id: &SessionId) -> Option<SessionRecord> {
        let now = OffsetDateTime::now_utc();
        match self.timed(self.primary.get_dyn(session_id)).await {
            // Expired in the cache: TTL reaps it, the fallback holds the same expiry.
            Ok(Some(record)) => return record.is_valid_at(now).then_some(record),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    session = %session_id.redacted(),
                    "Session cache read failed; using fallback map"
                );
            }
        }

        self.fallback
            .get(session_id)
            .await
            .ok()
            .flatten()
            .filter(|record| record.is_valid_at(now))
    }

    /// Record activity on a validated session. Best effort; never extends expiry.
    ///
    /// Only records still present are rewritten, so a touch that lands after
    /// a delete does not bring the session back.
    pub async fn touch(&self, record: &SessionRecord) {
        let now = OffsetDateTime::now_utc();
        let Some(ttl) = record.remaining(now) else {
            return;
        };
        let touched = record.touched(now);

        if let Err(e) = self.timed(self.primary.replace_dyn(&touched, ttl)).await {
            tracing::debug!(
                error = %e,
                session = %record.session_id.redacted(),
                "Session touch failed in cache"
            );
        }
        let _ = self.fallback.replace(&touched, ttl).await;
    }

    /// Delete every session known for `user_id` from both stores.
    ///
    /// Sessions are found by scanning the fallback map; the cache has no
    /// per-user index. Returns how many sessions were found.
    pub async fn delete_all_for_user(&self, user_id: UserId) -> usize {
        let ids = self.fallback.ids_for_user(user_id).await;
        for id in &ids {
            if let Err(e) = self.timed(self.primary.delete_dyn(id)).await {
                tracing::warn!(
                    error = %e,
                    session = %id.redacted(),
                    "Session cache delete failed"
                );
            }
            let _ = self.fallback.delete(id).await;
        }
        tracing::info!(user_id = %user_id, count = ids.len(), "Deleted user sessions");
        ids.len()
    }

    /// Delete one session from both stores.
    pub async fn delete(&self, session_id: &SessionId) {
        if let Err(e) = self.timed(self.primary.delete_dyn(session_id)).await {
            tracing::warn!(
                error = %e,
                session = %session_id.redacted(),
                "Session cache delete failed"
            );
        }
        let _ = self.fallback.delete(session_id).await;
    }

    /// Whether the primary answers a ping within the cache timeout.
    pub async fn primary_available(&self) -> bool {
        self.timed(self.primary.ping_dyn()).await.is_ok()
    }

    async fn timed<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, BackendError>>,
    ) -> Result<T, BackendError> {
        tokio::time::timeout(self.cache_timeout, fut)
            .await
            .map_err(|_| BackendError::Timeout)?
    }
}
