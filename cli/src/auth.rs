//! User accounts and credential checks.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

use fxhub_common::{now, storage, HubError, Timestamp};
use fxhub_ledger::{Portfolio, PortfolioStore};

/// Minimum accepted password length.
const MIN_PASSWORD_LEN: usize = 4;
/// Salt size in raw bytes; stored hex-encoded.
const SALT_BYTES: usize = 8;

/// Errors from the account layer.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Username cannot be empty")]
    EmptyUsername,

    #[error("Password must be at least 4 characters")]
    PasswordTooShort,

    #[error("Username '{0}' is already taken")]
    UsernameTaken(String),

    #[error("User '{0}' not found")]
    UserNotFound(String),

    #[error("Invalid password")]
    InvalidPassword,

    #[error(transparent)]
    Storage(#[from] HubError),
}

/// One stored account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: i64,
    pub username: String,
    /// Hex-encoded salted SHA-256 of the password.
    pub hashed_password: String,
    /// Hex-encoded salt appended to the password before hashing.
    pub salt: String,
    pub registration_date: Timestamp,
}

/// File-backed store for user accounts.
#[derive(Debug, Clone)]
pub struct UserStore {
    path: PathBuf,
}

impl UserStore {
    /// Store over the given account file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read every account. A missing file is an empty list.
    pub fn read_all(&self) -> Result<Vec<UserRecord>, HubError> {
        storage::read_json_or_default(&self.path)
    }

    /// Find an account by username.
    pub fn find(&self, username: &str) -> Result<Option<UserRecord>, HubError> {
        Ok(self
            .read_all()?
            .into_iter()
            .find(|u| u.username == username))
    }

    fn write_all(&self, users: &[UserRecord]) -> Result<(), HubError> {
        storage::write_json_atomic(&self.path, users)
    }
}

/// Create an account and seed its empty portfolio.
pub fn register(
    users: &UserStore,
    portfolios: &PortfolioStore,
    username: &str,
    password: &str,
) -> Result<UserRecord, AuthError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AuthError::EmptyUsername);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::PasswordTooShort);
    }

    let mut all = users.read_all()?;
    if all.iter().any(|u| u.username == username) {
        return Err(AuthError::UsernameTaken(username.to_string()));
    }

    let user_id = all.iter().map(|u| u.user_id).max().unwrap_or(0) + 1;
    let salt = random_salt();
    let record = UserRecord {
        user_id,
        username: username.to_string(),
        hashed_password: hash_password(password, &salt),
        salt,
        registration_date: now(),
    };

    all.push(record.clone());
    users.write_all(&all)?;
    portfolios.upsert(&Portfolio::new(user_id))?;

    info!(user_id, username, "User registered");
    Ok(record)
}

/// Verify credentials and return the account.
pub fn login(users: &UserStore, username: &str, password: &str) -> Result<UserRecord, AuthError> {
    let username = username.trim();
    let record = users
        .find(username)?
        .ok_or_else(|| AuthError::UserNotFound(username.to_string()))?;

    if record.hashed_password != hash_password(password, &record.salt) {
        return Err(AuthError::InvalidPassword);
    }

    info!(user_id = record.user_id, username, "User logged in");
    Ok(record)
}

fn random_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Salted SHA-256, hex-encoded. The salt is appended to the password.
fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    let hash = hasher.finalize();
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}
