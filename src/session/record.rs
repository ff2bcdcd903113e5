use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::{SessionId, UserId};

/// A persisted login session.
///
/// `expires_at` is fixed at creation. `last_activity_at` moves on use but never
/// extends the lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub user_id: UserId,
    /// Host the session was created on (audit only).
    pub origin_domain: String,
    /// Client fingerprint, usually the `User-Agent` (audit only).
    pub device_tag: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl SessionRecord {
    #[must_use]
    pub fn new(
        session_id: SessionId,
        user_id: UserId,
        origin_domain: impl Into<String>,
        device_tag: impl Into<String>,
        now: OffsetDateTime,
        lifetime: time::Duration,
    ) -> Self {
        Self {
            session_id,
            user_id,
            origin_domain: origin_domain.into(),
            device_tag: device_tag.into(),
            created_at: now,
            last_activity_at: now,
            expires_at: now + lifetime,
        }
    }

    #[must_use]
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        now < self.expires_at
    }

    /// Time left before expiry, `None` once expired.
    #[must_use]
    pub fn remaining(&self, now: OffsetDateTime) -> Option<std::time::Duration> {
        let left = self.expires_at - now;
        if left.is_positive() {
            std::time::Duration::try_from(left).ok()
        } else {
            None
        }
    }

    /// Copy with `last_activity_at` moved to `now`.
    #[must_use]
    pub fn touched(&self, now: OffsetDateTime) -> Self {
        Self {
            last_activity_at: now,
            ..self.clone()
        }
    }
}
