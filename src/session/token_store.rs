//! Token storage
//!
//! Durable holder of the access/refresh pair. The session client is the only
//! writer: login overwrites, logout and the 401 handler clear. No expiry is
//! tracked locally; an expired token is discovered by a rejected request.
//!
//! Every backend treats `clear()` on an empty store as success so concurrent
//! 401 handlers can race without erroring.

use std::fs;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::warn;

use crate::models::SessionTokens;

/// Fixed key for the access token entry
pub const ACCESS_TOKEN_KEY: &str = "accessToken";
/// Fixed key for the refresh token entry
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("token storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("token storage is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("secure credential storage failed: {0}")]
    Keyring(String),
    #[error("could not determine config directory")]
    NoConfigDir,
}

pub trait TokenStore: Send + Sync {
    /// Current pair, if both entries are present
    fn get(&self) -> Option<SessionTokens>;

    /// Overwrite any stored pair
    fn set(&self, tokens: &SessionTokens) -> Result<(), TokenStoreError>;

    /// Remove both entries. Succeeds when nothing is stored.
    fn clear(&self) -> Result<(), TokenStoreError>;

    fn access_token(&self) -> Option<String> {
        self.get().map(|t| t.access)
    }
}

fn acquire_read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned: PoisonError<RwLockReadGuard<'_, T>>| {
        warn!("Token lock was poisoned on read, recovering inner value");
        poisoned.into_inner()
    })
}

fn acquire_write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned: PoisonError<RwLockWriteGuard<'_, T>>| {
        warn!("Token lock was poisoned on write, recovering inner value");
        poisoned.into_inner()
    })
}

/// In-process store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<Option<SessionTokens>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: SessionTokens) -> Self {
        Self {
            tokens: RwLock::new(Some(tokens)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<SessionTokens> {
        acquire_read_lock(&self.tokens).clone()
    }

    fn set(&self, tokens: &SessionTokens) -> Result<(), TokenStoreError> {
        *acquire_write_lock(&self.tokens) = Some(tokens.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        acquire_write_lock(&self.tokens).take();
        Ok(())
    }
}

/// JSON file store (`<config>/docmanage/session.json`).
///
/// The file holds both keys side by side; a file missing either key reads as
/// no session.
pub struct FileTokenStore {
    path: PathBuf,
    // Serializes read-modify-write against this process only.
    lock: RwLock<()>,
}

impl FileTokenStore {
    const FILE_NAME: &'static str = "session.json";

    /// Store under the platform config directory
    pub fn new() -> Result<Self, TokenStoreError> {
        let dir = dirs::config_dir()
            .ok_or(TokenStoreError::NoConfigDir)?
            .join("docmanage");
        Ok(Self::with_dir(dir))
    }

    /// Store under a custom directory (for testing)
    pub fn with_dir(dir: PathBuf) -> Self {
        Self {
            path: dir.join(Self::FILE_NAME),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn read_entries(&self) -> Result<Option<serde_json::Map<String, serde_json::Value>>, TokenStoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        Ok(value.as_object().cloned())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<SessionTokens> {
        let _guard = acquire_read_lock(&self.lock);
        let entries = match self.read_entries() {
            Ok(entries) => entries?,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Unreadable token file, treating as no session");
                return None;
            }
        };
        let access = entries.get(ACCESS_TOKEN_KEY)?.as_str()?;
        let refresh = entries.get(REFRESH_TOKEN_KEY)?.as_str()?;
        Some(SessionTokens::new(access, refresh))
    }

    fn set(&self, tokens: &SessionTokens) -> Result<(), TokenStoreError> {
        let _guard = acquire_write_lock(&self.lock);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&serde_json::json!({
            ACCESS_TOKEN_KEY: tokens.access,
            REFRESH_TOKEN_KEY: tokens.refresh,
        }))?;

        // Write to temp file then rename so a crash never leaves half a pair
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content)?;
        restrict_to_owner(&temp_path)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        let _guard = acquire_write_lock(&self.lock);
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Tokens are bearer credentials: owner read/write only
#[cfg(unix)]
fn restrict_to_owner(path: &std::path::Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &std::path::Path) -> std::io::Result<()> {
    Ok(())
}
