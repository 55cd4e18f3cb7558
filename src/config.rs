//! Client configuration
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file in the working directory or its parent. Unparsable numbers fall back
//! to defaults with a warning; an unparsable API URL is an error.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;
use tracing::warn;

pub const ENV_API_URL: &str = "DOCMANAGE_API_URL";
pub const ENV_REQUEST_TIMEOUT: &str = "DOCMANAGE_REQUEST_TIMEOUT_SECS";
pub const ENV_IMAGE_TIMEOUT: &str = "DOCMANAGE_IMAGE_TIMEOUT_SECS";
pub const ENV_LOGOUT_TIMEOUT: &str = "DOCMANAGE_LOGOUT_TIMEOUT_SECS";
pub const ENV_LOGIN_PATH: &str = "DOCMANAGE_LOGIN_PATH";
pub const ENV_EXPORT_DIR: &str = "DOCMANAGE_EXPORT_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid API base URL {url:?}: {reason}")]
    InvalidApiUrl { url: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API origin plus base path, e.g. `http://localhost:8000/api`
    pub api_base_url: Url,
    pub request_timeout: Duration,
    pub image_timeout: Duration,
    /// Upper bound on the best-effort server logout call
    pub logout_timeout: Duration,
    /// Entry point the host navigates to after a session is invalidated
    pub login_path: String,
    /// Where exported reports are written; `None` means the download dir
    pub export_dir: Option<PathBuf>,
}

impl ClientConfig {
    pub const DEFAULT_API_URL: &'static str = "http://localhost:8000/api";
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
    pub const DEFAULT_IMAGE_TIMEOUT_SECS: u64 = 60;
    pub const DEFAULT_LOGOUT_TIMEOUT_SECS: u64 = 5;
    pub const DEFAULT_LOGIN_PATH: &'static str = "/login";

    /// Load configuration from the environment (after reading `.env`)
    pub fn from_env() -> Result<Self, ConfigError> {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_path("../.env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_url = lookup(ENV_API_URL).unwrap_or_else(|| Self::DEFAULT_API_URL.to_string());
        let api_base_url = parse_api_url(&raw_url)?;

        let secs = |key: &str, default: u64| -> Duration {
            let value = match lookup(key) {
                Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
                    warn!(key, value = %raw, default, "Invalid duration, using default");
                    default
                }),
                None => default,
            };
            Duration::from_secs(value)
        };

        Ok(Self {
            api_base_url,
            request_timeout: secs(ENV_REQUEST_TIMEOUT, Self::DEFAULT_REQUEST_TIMEOUT_SECS),
            image_timeout: secs(ENV_IMAGE_TIMEOUT, Self::DEFAULT_IMAGE_TIMEOUT_SECS),
            logout_timeout: secs(ENV_LOGOUT_TIMEOUT, Self::DEFAULT_LOGOUT_TIMEOUT_SECS),
            login_path: lookup(ENV_LOGIN_PATH)
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| Self::DEFAULT_LOGIN_PATH.to_string()),
            export_dir: lookup(ENV_EXPORT_DIR)
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// Config pointing at a custom API base URL, all else default
    pub fn with_api_url(url: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.api_base_url = parse_api_url(url)?;
        Ok(config)
    }

    /// Path component of the API base without the trailing slash (`/api`)
    pub fn api_base_path(&self) -> &str {
        self.api_base_url.path().trim_end_matches('/')
    }

    /// Join an API-relative path (`/documents/?x=1`) onto the base URL
    pub fn endpoint(&self, path: &str) -> String {
        let base = self.api_base_url.as_str().trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }

    /// Directory exports are written to
    pub fn resolved_export_dir(&self) -> PathBuf {
        self.export_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse(Self::DEFAULT_API_URL).expect("default API URL is valid"),
            request_timeout: Duration::from_secs(Self::DEFAULT_REQUEST_TIMEOUT_SECS),
            image_timeout: Duration::from_secs(Self::DEFAULT_IMAGE_TIMEOUT_SECS),
            logout_timeout: Duration::from_secs(Self::DEFAULT_LOGOUT_TIMEOUT_SECS),
            login_path: Self::DEFAULT_LOGIN_PATH.to_string(),
            export_dir: None,
        }
    }
}

fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidApiUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidApiUrl {
            url: raw.to_string(),
            reason: "expected an http(s) URL".to_string(),
        });
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.api_base_url.as_str(), "http://localhost:8000/api");
        assert_eq!(config.api_base_path(), "/api");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.login_path, "/login");
        assert!(config.export_dir.is_none());
    }

    #[test]
    fn test_overrides_and_bad_numbers() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            (ENV_API_URL, "https://docs.example.com/api/"),
            (ENV_REQUEST_TIMEOUT, "12"),
            (ENV_IMAGE_TIMEOUT, "soon"),
            (ENV_EXPORT_DIR, "/tmp/reports"),
        ]))
        .unwrap();

        assert_eq!(config.api_base_path(), "/api");
        assert_eq!(config.request_timeout, Duration::from_secs(12));
        assert_eq!(config.image_timeout, Duration::from_secs(60));
        assert_eq!(config.resolved_export_dir(), PathBuf::from("/tmp/reports"));
    }

    #[test]
    fn test_invalid_url_is_error() {
        let result = ClientConfig::from_lookup(lookup_from(&[(ENV_API_URL, "not a url")]));
        assert!(matches!(result, Err(ConfigError::InvalidApiUrl { .. })));

        let result = ClientConfig::from_lookup(lookup_from(&[(ENV_API_URL, "ftp://host/api")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let config = ClientConfig::with_api_url("http://localhost:8000/api/").unwrap();
        assert_eq!(
            config.endpoint("/documents/?cursor=abc"),
            "http://localhost:8000/api/documents/?cursor=abc"
        );
        assert_eq!(config.endpoint("auth/me/"), "http://localhost:8000/api/auth/me/");
    }
}
