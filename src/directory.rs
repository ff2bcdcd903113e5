//! In-memory collaborator tables.
//!
//! [`StaticDirectory`] serves users, public-app flags and the custom-domain
//! registry from a fixed set loaded at startup. Passwords are stored as
//! Argon2id PHC strings only.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::Rng;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::domain;
use crate::error::Error;
use crate::gateway::{AppSettings, BoxError, DomainRegistry, LinkedAccount, User, UserStore};
use crate::types::UserId;

/// Hash `password` as an Argon2id PHC string with the library's default parameters.
///
/// # Errors
///
/// Returns [`Error::Directory`] if hashing fails.
pub fn hash_password(password: &str) -> Result<String, Error> {
    hash_password_with(password, Params::default())
}

/// Hash `password` with explicit Argon2id cost parameters.
///
/// # Errors
///
/// Returns [`Error::Directory`] if the parameters are rejected or hashing fails.
pub fn hash_password_with(password: &str, params: Params) -> Result<String, Error> {
    let salt_bytes: [u8; 16] = rand::rng().random();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| Error::Directory(format!("salt encoding failed: {e}")))?;
    let hash = Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::Directory(format!("hashing failed: {e}")))?;
    Ok(hash.to_string())
}

/// Hash checked against when no account matches, at the default cost.
static DECOY_HASH: LazyLock<Option<String>> = LazyLock::new(|| hash_password("decoy").ok());

/// Check `password` against a PHC string. Malformed hashes never match.
fn verify_hash(password: &str, phc: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(phc) else {
        tracing::warn!("Stored password hash is not a PHC string");
        return false;
    };
    // Cost parameters come from the PHC string itself.
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[derive(Debug, Clone)]
struct Account {
    user: User,
    password_hash: String,
}

/// File layout read by [`StaticDirectory::from_json_file`].
#[derive(Debug, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    users: Vec<UserEntry>,
    #[serde(default)]
    public_apps: Vec<String>,
    #[serde(default)]
    custom_domains: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct UserEntry {
    id: UserId,
    username: String,
    #[serde(default)]
    display_name: Option<String>,
    password_hash: String,
}

/// Fixed user, app and domain tables implementing every gateway collaborator.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    accounts: HashMap<String, Account>,
    public_apps: HashSet<String>,
    custom_domains: HashMap<String, String>,
    links: RwLock<Vec<(UserId, LinkedAccount)>>,
}

impl StaticDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load tables from a JSON file.
    ///
    /// ```json
    /// {
    ///   "users": [{ "id": 1, "username": "alice", "password_hash": "$argon2id$..." }],
    ///   "public_apps": ["docs"],
    ///   "custom_domains": { "shop.customer.com": "shop" }
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Directory`]
    /// if it is not valid.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// # Errors
    ///
    /// Returns [`Error::Directory`] if `raw` is not a valid directory document.
    pub fn from_json_str(raw: &str) -> Result<Self, Error> {
        let file: DirectoryFile =
            serde_json::from_str(raw).map_err(|e| Error::Directory(e.to_string()))?;

        let mut directory = Self::new();
        for entry in file.users {
            if PasswordHash::new(&entry.password_hash).is_err() {
                return Err(Error::Directory(format!(
                    "user {} has a malformed password hash",
                    entry.username
                )));
            }
            let user = User {
                id: entry.id,
                username: entry.username,
                display_name: entry.display_name,
            };
            directory = directory.with_user(user, entry.password_hash);
        }
        for app in file.public_apps {
            directory = directory.with_public_app(app);
        }
        for (host, app) in file.custom_domains {
            directory = directory.with_custom_domain(&host, app);
        }
        Ok(directory)
    }

    #[must_use]
    pub fn with_user(mut self, user: User, password_hash: impl Into<String>) -> Self {
        self.accounts.insert(
            user.username.clone(),
            Account {
                user,
                password_hash: password_hash.into(),
            },
        );
        self
    }

    #[must_use]
    pub fn with_public_app(mut self, app: impl Into<String>) -> Self {
        self.public_apps.insert(app.into());
        self
    }

    /// Register `host` as owned by `app`. The host is normalized first.
    #[must_use]
    pub fn with_custom_domain(mut self, host: &str, app: impl Into<String>) -> Self {
        self.custom_domains
            .insert(domain::normalize_host(host), app.into());
        self
    }

    /// Accounts linked so far for `user_id`.
    pub async fn linked_accounts(&self, user_id: UserId) -> Vec<LinkedAccount> {
        self.links
            .read()
            .await
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, account)| account.clone())
            .collect()
    }
}

impl UserStore for StaticDirectory {
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, BoxError> {
        Ok(self.accounts.get(username).map(|a| a.user.clone()))
    }

    async fn get_user_by_id(&self, user_id: UserId) -> Result<Option<User>, BoxError> {
        Ok(self
            .accounts
            .values()
            .find(|a| a.user.id == user_id)
            .map(|a| a.user.clone()))
    }

    async fn verify_password(&self, user: &User, password: &str) -> Result<bool, BoxError> {
        let Some(account) = self.accounts.get(&user.username) else {
            return Ok(false);
        };
        if account.user.id != user.id {
            return Ok(false);
        }
        let phc = account.password_hash.clone();
        let password = password.to_string();
        // Argon2 is deliberately slow; keep it off the async workers.
        let matched = tokio::task::spawn_blocking(move || verify_hash(&password, &phc)).await?;
        Ok(matched)
    }

    async fn verify_unknown_password(&self, password: &str) {
        let password = password.to_string();
        let checked = tokio::task::spawn_blocking(move || {
            DECOY_HASH
                .as_deref()
                .map(|phc| verify_hash(&password, phc))
        })
        .await;
        if !matches!(checked, Ok(Some(_))) {
            tracing::warn!("Decoy password check did not run");
        }
    }

    async fn link_oauth_account(
        &self,
        user_id: UserId,
        account: LinkedAccount,
    ) -> Result<(), BoxError> {
        let mut links = self.links.write().await;
        links.retain(|(owner, existing)| !(*owner == user_id && existing.provider == account.provider));
        links.push((user_id, account));
        Ok(())
    }
}

impl AppSettings for StaticDirectory {
    async fn is_app_public(&self, app: &str) -> Result<bool, BoxError> {
        Ok(self.public_apps.contains(app))
    }
}

impl DomainRegistry for StaticDirectory {
    async fn resolve_owner(&self, host: &str) -> Result<Option<String>, BoxError> {
        Ok(self.custom_domains.get(host).cloned())
    }
}
