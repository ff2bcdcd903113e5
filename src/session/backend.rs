use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use super::record::SessionRecord;
use crate::types::SessionId;

/// Errors from a session backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("malformed session record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache call timed out")]
    Timeout,
}

/// Key/value storage for session records.
///
/// Implementations own their wire format; the store composing them only sees
/// records. Each key is assumed to be updated atomically.
pub trait SessionBackend: Send + Sync + 'static {
    /// Fetch a record. Does not check expiry.
    fn get(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<Option<SessionRecord>, BackendError>> + Send;

    /// Insert or replace a record, to be dropped by the backend after `ttl`.
    fn put(
        &self,
        record: &SessionRecord,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Overwrite a record only if its key is still present. A missing key is
    /// left missing and is not an error.
    fn replace(
        &self,
        record: &SessionRecord,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn delete(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Cheap liveness probe.
    fn ping(&self) -> impl Future<Output = Result<(), BackendError>> + Send;
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe wrapper for SessionBackend (needed for `Box<dyn>`).
pub(super) trait SessionBackendDyn: Send + Sync {
    fn get_dyn<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<SessionRecord>, BackendError>>;

    fn put_dyn<'a>(
        &'a self,
        record: &'a SessionRecord,
        ttl: Duration,
    ) -> BoxFuture<'a, Result<(), BackendError>>;

    fn replace_dyn<'a>(
        &'a self,
        record: &'a SessionRecord,
        ttl: Duration,
    ) -> BoxFuture<'a, Result<(), BackendError>>;

    fn delete_dyn<'a>(&'a self, session_id: &'a SessionId)
    -> BoxFuture<'a, Result<(), BackendError>>;

    fn ping_dyn(&self) -> BoxFuture<'_, Result<(), BackendError>>;
}

impl<T: SessionBackend> SessionBackendDyn for T {
    fn get_dyn<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<SessionRecord>, BackendError>> {
        Box::pin(self.get(session_id))
    }

    fn put_dyn<'a>(
        &'a self,
        record: &'a SessionRecord,
        ttl: Duration,
    ) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(self.put(record, ttl))
    }

    fn replace_dyn<'a>(
        &'a self,
        record: &'a SessionRecord,
        ttl: Duration,
    ) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(self.replace(record, ttl))
    }

    fn delete_dyn<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(self.delete(session_id))
    }

    fn ping_dyn(&self) -> BoxFuture<'_, Result<(), BackendError>> {
        Box::pin(self.ping())
    }
}
