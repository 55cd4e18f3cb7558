use base64::{engine::general_purpose::STANDARD, Engine};
use keyring::Entry;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use super::token_store::{TokenStore, TokenStoreError, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::models::SessionTokens;

const SERVICE_NAME: &str = "com.docmanage.client";

/// Token store backed by the OS keychain / credential manager.
///
/// Each token lives in its own entry under a fixed key. In debug builds a
/// base64-obfuscated file per key is used when the keychain is unavailable.
pub struct KeyringTokenStore {
    service: String,
    #[cfg_attr(not(debug_assertions), allow(dead_code))]
    fallback_dir: Option<PathBuf>,
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
            fallback_dir: dirs::config_dir().map(|dir| dir.join("docmanage")),
        }
    }

    /// Use a custom service name and fallback directory (for testing)
    pub fn with_service(service: &str, fallback_dir: Option<PathBuf>) -> Self {
        Self {
            service: service.to_string(),
            fallback_dir,
        }
    }

    #[cfg(debug_assertions)]
    fn fallback_path(&self, key: &str) -> Option<PathBuf> {
        self.fallback_dir.as_ref().map(|dir| dir.join(format!("{}_token", key)))
    }

    fn read_entry(&self, key: &str) -> Option<String> {
        if let Ok(entry) = Entry::new(&self.service, key) {
            if let Ok(value) = entry.get_password() {
                return Some(value);
            }
        }

        #[cfg(debug_assertions)]
        {
            let path = self.fallback_path(key)?;
            if path.exists() {
                let encoded = fs::read_to_string(&path).ok()?;
                let bytes = STANDARD.decode(encoded.trim()).ok()?;
                debug!(key, "DEV MODE: read token from fallback file");
                return String::from_utf8(bytes).ok();
            }
        }

        None
    }

    fn write_entry(&self, key: &str, value: &str) -> Result<(), TokenStoreError> {
        match Entry::new(&self.service, key) {
            Ok(entry) => {
                if entry.set_password(value).is_ok() {
                    return Ok(());
                }
            }
            Err(e) => {
                debug!(error = %e, "Keychain unavailable");
            }
        }

        #[cfg(debug_assertions)]
        {
            let path = self
                .fallback_path(key)
                .ok_or(TokenStoreError::NoConfigDir)?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, STANDARD.encode(value.as_bytes()))?;
            tracing::warn!(path = %path.display(), "DEV MODE: stored token in fallback file");
            Ok(())
        }

        #[cfg(not(debug_assertions))]
        {
            Err(TokenStoreError::Keyring(
                "Secure credential storage (Keychain) unavailable".to_string(),
            ))
        }
    }

    fn delete_entry(&self, key: &str) -> Result<(), TokenStoreError> {
        let keychain = match Entry::new(&self.service, key) {
            Ok(entry) => {
                let deleted = entry.delete_credential();
                settle_delete(deleted, entry.get_password().is_ok())
            }
            Err(_) => Ok(()),
        };

        #[cfg(debug_assertions)]
        {
            if let Some(path) = self.fallback_path(key) {
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        keychain
    }
}

/// A failed delete only matters if the token can still be read back; an
/// unreachable keychain holds nothing to clear.
fn settle_delete(
    deleted: keyring::Result<()>,
    still_readable: bool,
) -> Result<(), TokenStoreError> {
    match deleted {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) if still_readable => Err(TokenStoreError::Keyring(e.to_string())),
        Err(e) => {
            debug!(error = %e, "Keychain delete failed with nothing stored");
            Ok(())
        }
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self) -> Option<SessionTokens> {
        let access = self.read_entry(ACCESS_TOKEN_KEY)?;
        let refresh = self.read_entry(REFRESH_TOKEN_KEY)?;
        Some(SessionTokens { access, refresh })
    }

    fn set(&self, tokens: &SessionTokens) -> Result<(), TokenStoreError> {
        self.write_entry(ACCESS_TOKEN_KEY, &tokens.access)?;
        self.write_entry(REFRESH_TOKEN_KEY, &tokens.refresh)
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        // Attempt both deletes even if the first fails
        let access = self.delete_entry(ACCESS_TOKEN_KEY);
        let refresh = self.delete_entry(REFRESH_TOKEN_KEY);
        access.and(refresh)
    }
}
