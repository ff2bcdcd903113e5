use std::future::Future;
use std::sync::Arc;

use super::types::{LinkedAccount, User};
use crate::types::UserId;

/// Error type returned by collaborator implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Consumer-provided credential store.
///
/// The gateway never sees password hashes; it asks the store to verify.
///
/// # Example
///
/// ```rust,ignore
/// impl UserStore for Accounts {
///     async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, BoxError> {
///         Ok(self.db.find_user(username).await?.map(Into::into))
///     }
///     // ...
/// }
/// ```
pub trait UserStore: Send + Sync + 'static {
    fn get_user_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<User>, BoxError>> + Send;

    fn get_user_by_id(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<User>, BoxError>> + Send;

    /// Check `password` for `user`. `Ok(false)` for a wrong password.
    fn verify_password(
        &self,
        user: &User,
        password: &str,
    ) -> impl Future<Output = Result<bool, BoxError>> + Send;

    /// Do the work of a failed [`verify_password`](Self::verify_password) for
    /// a username with no account, so both rejections take the same time.
    fn verify_unknown_password(&self, password: &str) -> impl Future<Output = ()> + Send;

    /// Persist a third-party account linked through the OAuth flow.
    fn link_oauth_account(
        &self,
        user_id: UserId,
        account: LinkedAccount,
    ) -> impl Future<Output = Result<(), BoxError>> + Send;
}

/// Consumer-provided application settings.
pub trait AppSettings: Send + Sync + 'static {
    /// Whether `app` serves every request without authentication.
    fn is_app_public(&self, app: &str) -> impl Future<Output = Result<bool, BoxError>> + Send;
}

/// Consumer-provided custom-domain registry.
pub trait DomainRegistry: Send + Sync + 'static {
    /// Application that owns `host`, matched as an exact string.
    fn resolve_owner(
        &self,
        host: &str,
    ) -> impl Future<Output = Result<Option<String>, BoxError>> + Send;
}

// Lets one shared collaborator fill several roles.
impl<T: UserStore> UserStore for Arc<T> {
    fn get_user_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<User>, BoxError>> + Send {
        (**self).get_user_by_username(username)
    }

    fn get_user_by_id(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<User>, BoxError>> + Send {
        (**self).get_user_by_id(user_id)
    }

    fn verify_password(
        &self,
        user: &User,
        password: &str,
    ) -> impl Future<Output = Result<bool, BoxError>> + Send {
        (**self).verify_password(user, password)
    }

    fn verify_unknown_password(&self, password: &str) -> impl Future<Output = ()> + Send {
        (**self).verify_unknown_password(password)
    }

    fn link_oauth_account(
        &self,
        user_id: UserId,
        account: LinkedAccount,
    ) -> impl Future<Output = Result<(), BoxError>> + Send {
        (**self).link_oauth_account(user_id, account)
    }
}

impl<T: AppSettings> AppSettings for Arc<T> {
    fn is_app_public(&self, app: &str) -> impl Future<Output = Result<bool, BoxError>> + Send {
        (**self).is_app_public(app)
    }
}

impl<T: DomainRegistry> DomainRegistry for Arc<T> {
    fn resolve_owner(
        &self,
        host: &str,
    ) -> impl Future<Output = Result<Option<String>, BoxError>> + Send {
        (**self).resolve_owner(host)
    }
}
