use serde::{Deserialize, Serialize};

use crate::types::{SessionId, UserId};

/// A platform user as reported by the [`UserStore`](super::UserStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Third-party account handed to [`UserStore::link_oauth_account`](super::UserStore::link_oauth_account).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedAccount {
    pub provider: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

#[derive(Deserialize)]
pub(super) struct LoginRequest {
    pub(super) username: String,
    pub(super) password: String,
    #[serde(default)]
    pub(super) redirect: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct LoginResponse {
    #[serde(rename = "sessionID")]
    pub(super) session_id: SessionId,
    pub(super) user: User,
    pub(super) redirect: String,
}

/// Payload posted from the handshake iframe to its parent window.
#[derive(Debug, Serialize)]
pub(super) struct SsoCheckMessage<'a> {
    #[serde(rename = "type")]
    pub(super) kind: &'static str,
    pub(super) authenticated: bool,
    #[serde(rename = "sessionID", skip_serializing_if = "Option::is_none")]
    pub(super) session_id: Option<&'a SessionId>,
}

#[derive(Deserialize)]
pub(super) struct SessionHandoff {
    #[serde(rename = "sessionID")]
    pub(super) session_id: SessionId,
}
