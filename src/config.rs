//! Configuration file parser for ~/.config/tweetfeed/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::auth::Credentials;

/// Environment variable overriding `api_key`.
pub const API_KEY_ENV: &str = "TWITTER_API_KEY";
/// Environment variable overriding `api_secret`.
pub const API_SECRET_ENV: &str = "TWITTER_API_SECRET";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A base URL did not parse or used a scheme other than http(s).
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
///
/// Custom Debug impl masks the API credentials to prevent secret leakage
/// in logs, error messages, and debug output.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API consumer key (alternative to TWITTER_API_KEY env var).
    /// Env var takes precedence over config file.
    pub api_key: Option<String>,

    /// API consumer secret (alternative to TWITTER_API_SECRET env var).
    /// Env var takes precedence over config file.
    pub api_secret: Option<String>,

    /// Base URL for the token and timeline endpoints.
    pub api_base_url: String,

    /// Base URL for permalinks, hashtag links and the account link.
    pub web_base_url: String,

    /// Upper bound for each HTTP request, in seconds.
    pub request_timeout_secs: u64,

    /// SQLite file holding the cached bearer token.
    /// Defaults to `token-cache.db` next to the config file.
    pub cache_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            api_base_url: Endpoints::DEFAULT_API.to_string(),
            web_base_url: Endpoints::DEFAULT_WEB.to_string(),
            request_timeout_secs: 30,
            cache_path: None,
        }
    }
}

/// Mask credentials in Debug output to prevent secret leakage.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "[REDACTED]"))
            .field("api_base_url", &self.api_base_url)
            .field("web_base_url", &self.web_base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("cache_path", &self.cache_path)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "api_key",
        "api_secret",
        "api_base_url",
        "web_base_url",
        "request_timeout_secs",
        "cache_path",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to prevent memory exhaustion
        // from a maliciously large or corrupted config file.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse the TOML content first as a raw table to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            api_base_url = %config.api_base_url,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// API credentials, with `TWITTER_API_KEY` / `TWITTER_API_SECRET` taking
    /// precedence over the file.
    pub fn credentials(&self) -> Credentials {
        self.credentials_from(|name| std::env::var(name).ok())
    }

    fn credentials_from(&self, env: impl Fn(&str) -> Option<String>) -> Credentials {
        let pick = |var: &str, file: &Option<String>| {
            env(var)
                .filter(|v| !v.is_empty())
                .or_else(|| file.clone())
        };
        Credentials::new(
            pick(API_KEY_ENV, &self.api_key),
            pick(API_SECRET_ENV, &self.api_secret),
        )
    }

    /// Validated endpoint set built from the configured base URLs.
    pub fn endpoints(&self) -> Result<Endpoints, ConfigError> {
        Endpoints::new(&self.api_base_url, &self.web_base_url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

// ============================================================================
// Endpoints
// ============================================================================

/// Base URLs for the API and for the public web links placed in the feed.
///
/// Both bases are stored with a trailing `/` so paths can be appended directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    api: String,
    web: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api: Self::DEFAULT_API.to_string(),
            web: Self::DEFAULT_WEB.to_string(),
        }
    }
}

impl Endpoints {
    pub const DEFAULT_API: &'static str = "https://api.twitter.com/";
    pub const DEFAULT_WEB: &'static str = "https://twitter.com/";

    pub fn new(api: &str, web: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api: normalize_base(api)?,
            web: normalize_base(web)?,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api
    }

    /// Client-credentials exchange endpoint.
    pub fn token_url(&self) -> String {
        format!("{}oauth2/token", self.api)
    }

    /// Timeline endpoint, without query parameters.
    pub fn timeline_url(&self) -> String {
        format!("{}1.1/statuses/user_timeline.json", self.api)
    }

    /// Permalink of a single status.
    pub fn status_link(&self, id_str: &str) -> String {
        format!("{}i/web/status/{}", self.web, id_str)
    }

    /// Prefix for hashtag listing links; the tag is appended as-is.
    pub fn hashtag_base(&self) -> String {
        format!("{}hashtag/", self.web)
    }

    /// Public page of an account.
    pub fn account_link(&self, screen_name: &str) -> String {
        format!("{}{}", self.web, screen_name)
    }
}

fn normalize_base(raw: &str) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(invalid(format!("unsupported scheme {scheme}"))),
    }

    let mut base = url.to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    Ok(base)
}

// ============================================================================
// Tests
// ============================================================================
