//! Stateless anti-CSRF state for the OAuth account-linking redirect.
//!
//! Token format: `user_<id>_<unix seconds>_<32 hex chars>`. Nothing is stored
//! server-side; a token is accepted for the user it names for ten minutes.
//! It is not single-use within that window.

use rand::Rng;
use time::OffsetDateTime;

use crate::types::UserId;

/// Maximum distance between the token's timestamp and now.
pub const STATE_MAX_AGE_SECS: u64 = 10 * 60;

const RANDOM_HEX_LEN: usize = 32;

/// Rejection for any malformed, foreign or stale state token.
///
/// Carries no detail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid OAuth state")]
pub struct CsrfRejected;

/// Issue a state token for `user_id`.
#[must_use]
pub fn issue_state(user_id: UserId) -> String {
    issue_state_at(user_id, OffsetDateTime::now_utc().unix_timestamp())
}

#[must_use]
pub fn issue_state_at(user_id: UserId, unix_now: i64) -> String {
    let random_bytes: [u8; RANDOM_HEX_LEN / 2] = rand::rng().random();
    format!("user_{user_id}_{unix_now}_{}", hex::encode(random_bytes))
}

/// Check a state token returned by the OAuth provider against the current user.
///
/// # Errors
///
/// [`CsrfRejected`] if any check fails.
pub fn validate_state(token: &str, current_user: UserId) -> Result<(), CsrfRejected> {
    validate_state_at(token, current_user, OffsetDateTime::now_utc().unix_timestamp())
}

pub fn validate_state_at(token: &str, current_user: UserId, unix_now: i64) -> Result<(), CsrfRejected> {
    let prefix = format!("user_{current_user}_");
    if !token.starts_with(&prefix) {
        return Err(CsrfRejected);
    }

    let fields: Vec<&str> = token.split('_').collect();
    let [_, _, timestamp, random] = fields.as_slice() else {
        return Err(CsrfRejected);
    };

    if random.len() != RANDOM_HEX_LEN || !random.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CsrfRejected);
    }

    let issued: i64 = timestamp.parse().map_err(|_| CsrfRejected)?;
    let age = unix_now
        .checked_sub(issued)
        .map(i64::unsigned_abs)
        .ok_or(CsrfRejected)?;
    if age > STATE_MAX_AGE_SECS {
        return Err(CsrfRejected);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_760_000_000;
    const RANDOM: &str = "0123456789abcdef0123456789ABCDEF";

    #[test]
    fn fresh_token_accepted() {
        let token = issue_state_at(UserId(42), NOW);
        assert!(validate_state_at(&token, UserId(42), NOW + 5).is_ok());
    }

    #[test]
    fn issued_token_shape() {
        let token = issue_state(UserId(7));
        let fields: Vec<&str> = token.split('_').collect();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0], "user");
        assert_eq!(fields[1], "7");
        assert_eq!(fields[3].len(), 32);
        assert!(validate_state(&token, UserId(7)).is_ok());
    }

    #[test]
    fn wrong_user_rejected() {
        let token = issue_state_at(UserId(42), NOW);
        assert_eq!(validate_state_at(&token, UserId(4), NOW), Err(CsrfRejected));
        assert_eq!(validate_state_at(&token, UserId(420), NOW), Err(CsrfRejected));
    }

    #[test]
    fn field_count_enforced() {
        for token in [
            format!("user_1_{NOW}"),
            format!("user_1_{NOW}_{RANDOM}_extra"),
            format!("user_1_{NOW}{RANDOM}"),
        ] {
            assert_eq!(validate_state_at(&token, UserId(1), NOW), Err(CsrfRejected), "{token}");
        }
    }

    #[test]
    fn mixed_case_hex_accepted() {
        let token = format!("user_1_{NOW}_{RANDOM}");
        assert!(validate_state_at(&token, UserId(1), NOW).is_ok());
    }

    #[test]
    fn non_hex_random_rejected() {
        let token = format!("user_1_{NOW}_0123456789abcdef0123456789abcdeg");
        assert_eq!(validate_state_at(&token, UserId(1), NOW), Err(CsrfRejected));
        let short = format!("user_1_{NOW}_0123456789abcdef");
        assert_eq!(validate_state_at(&short, UserId(1), NOW), Err(CsrfRejected));
    }

    #[test]
    fn bad_timestamp_rejected() {
        let token = format!("user_1_yesterday_{RANDOM}");
        assert_eq!(validate_state_at(&token, UserId(1), NOW), Err(CsrfRejected));
    }

    #[test]
    fn stale_token_rejected() {
        let token = format!("user_1_{NOW}_{RANDOM}");
        assert!(validate_state_at(&token, UserId(1), NOW + 600).is_ok());
        assert_eq!(validate_state_at(&token, UserId(1), NOW + 601), Err(CsrfRejected));
    }

    #[test]
    fn far_future_token_rejected() {
        let token = format!("user_1_{}_{RANDOM}", NOW + 3600);
        assert_eq!(validate_state_at(&token, UserId(1), NOW), Err(CsrfRejected));
    }

    #[test]
    fn negative_user_ids_round_trip() {
        let token = issue_state_at(UserId(-3), NOW);
        assert!(validate_state_at(&token, UserId(-3), NOW).is_ok());
        assert_eq!(validate_state_at(&token, UserId(3), NOW), Err(CsrfRejected));
    }
}
