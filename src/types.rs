use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use derive_more::{Display, From, FromStr, Into};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Integer identity of an authenticated principal.
///
/// Owned by the user store; the gateway only carries it around.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr, From, Into,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Opaque session identifier.
///
/// The sole capability token for a session: 32 random bytes, base64url without padding.
/// Travels only in cookies and in one origin-restricted `postMessage` payload.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a fresh identifier from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let random_bytes: [u8; 32] = rand::rng().random();
        Self(URL_SAFE_NO_PAD.encode(random_bytes))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix that is safe to put in logs.
    #[must_use]
    pub fn redacted(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map_or(self.0.len(), |(i, _)| i);
        &self.0[..end]
    }
}

// Keep full identifiers out of `{:?}` output.
impl std::fmt::Debug for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionId({}…)", self.redacted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_length() {
        // 32 bytes → 43 base64url chars without padding
        assert_eq!(SessionId::generate().as_str().len(), 43);
    }

    #[test]
    fn session_id_url_safe() {
        let id = SessionId::generate();
        assert!(
            id.as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "session id should be URL-safe: {}",
            id.as_str()
        );
    }

    #[test]
    fn session_id_uniqueness() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }

    #[test]
    fn debug_output_is_redacted() {
        let id = SessionId::from("abcdefghijklmnopqrstuvwxyz".to_string());
        let debug = format!("{id:?}");
        assert!(debug.contains("abcdefgh"));
        assert!(!debug.contains("ijklmnop"));
    }

    #[test]
    fn user_id_parses_from_string() {
        let id: UserId = "42".parse().unwrap();
        assert_eq!(id, UserId(42));
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn user_id_serde_transparent() {
        let json = serde_json::to_string(&UserId(7)).unwrap();
        assert_eq!(json, "7");
    }
}
