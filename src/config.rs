//! Configuration file parser for ~/.config/atomizer/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
//!
//! Settings are resolved once at startup into a [`Settings`] value with this
//! precedence: command-line flag, config file, `RSS_USER_AGENT`, `USER_AGENT`,
//! then built-in defaults.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::HttpSettings;

/// User agent sent when neither the command line, the config file nor the
/// environment names one.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/115.0";

/// Number of article pages fetched at once.
pub const DEFAULT_CONCURRENCY: usize = 3;

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
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Contents of the config file.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
///
/// Custom Debug impl masks a password embedded in the proxy URL.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// User agent override. Takes precedence over the environment.
    pub user_agent: Option<String>,

    /// Proxy URL for both HTTP and HTTPS, e.g. `socks5://127.0.0.1:9050`.
    pub proxy: Option<String>,

    /// Concurrent article fetches during enrichment.
    pub concurrency: usize,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Retries for the top-level feed fetch on 429/5xx.
    pub feed_retries: u32,

    /// Indent the emitted Atom document.
    pub pretty: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: None,
            proxy: None,
            concurrency: DEFAULT_CONCURRENCY,
            timeout_secs: 30,
            feed_retries: 2,
            pretty: false,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("user_agent", &self.user_agent)
            .field("proxy", &self.proxy.as_deref().map(redact_proxy))
            .field("concurrency", &self.concurrency)
            .field("timeout_secs", &self.timeout_secs)
            .field("feed_retries", &self.feed_retries)
            .field("pretty", &self.pretty)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "user_agent",
        "proxy",
        "concurrency",
        "timeout_secs",
        "feed_retries",
        "pretty",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
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
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), config = ?config, "Loaded configuration");
        Ok(config)
    }
}

/// `$XDG_CONFIG_HOME/atomizer/config.toml`, else `~/.config/atomizer/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    default_config_path_with(|key| std::env::var(key).ok())
}

fn default_config_path_with(lookup: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    let base = match lookup("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => PathBuf::from(lookup("HOME").filter(|v| !v.is_empty())?).join(".config"),
    };
    Some(base.join("atomizer").join("config.toml"))
}

// ============================================================================
// Resolved Settings
// ============================================================================

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub pretty: bool,
    pub max_age_days: Option<u32>,
}

/// Everything a run needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub http: HttpSettings,
    pub concurrency: usize,
    pub pretty: bool,
    /// Entries older than this many days are dropped before enrichment. 0 = keep all.
    pub max_age_days: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            http: HttpSettings::default(),
            concurrency: DEFAULT_CONCURRENCY,
            pretty: false,
            max_age_days: 0,
        }
    }
}

impl Settings {
    /// Resolves settings against the process environment.
    pub fn resolve(overrides: &Overrides, config: &Config) -> Self {
        Self::resolve_with(overrides, config, |key| std::env::var(key).ok())
    }

    /// Resolves settings with an injectable environment lookup.
    pub fn resolve_with(
        overrides: &Overrides,
        config: &Config,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let explicit = overrides
            .user_agent
            .as_deref()
            .filter(|ua| !ua.trim().is_empty())
            .or(config.user_agent.as_deref());
        let user_agent = resolve_user_agent_with(explicit, lookup);

        let mut concurrency = overrides.concurrency.unwrap_or(config.concurrency);
        if concurrency == 0 {
            tracing::warn!("Concurrency of 0 requested, using 1");
            concurrency = 1;
        }

        let timeout_secs = overrides.timeout_secs.unwrap_or(config.timeout_secs).max(1);

        Self {
            http: HttpSettings {
                user_agent,
                proxy: overrides.proxy.clone().or_else(|| config.proxy.clone()),
                timeout: Duration::from_secs(timeout_secs),
                feed_retries: config.feed_retries,
                ..HttpSettings::default()
            },
            concurrency,
            pretty: overrides.pretty || config.pretty,
            max_age_days: overrides.max_age_days.unwrap_or(0),
        }
    }
}

/// Picks the user agent: `explicit`, then `RSS_USER_AGENT`, then `USER_AGENT`,
/// then [`DEFAULT_USER_AGENT`]. Empty values count as unset.
pub fn resolve_user_agent_with(
    explicit: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> String {
    let set = |ua: &String| !ua.trim().is_empty();
    explicit
        .map(str::to_string)
        .filter(set)
        .or_else(|| lookup("RSS_USER_AGENT").filter(set))
        .or_else(|| lookup("USER_AGENT").filter(set))
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
}

fn redact_proxy(proxy: &str) -> String {
    match url::Url::parse(proxy) {
        Ok(mut url) if url.password().is_some() => {
            let _ = url.set_password(Some("[REDACTED]"));
            url.to_string()
        }
        _ => proxy.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
