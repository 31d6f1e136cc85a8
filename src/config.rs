//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. the `--config` flag
//! 2. `$LOOKOUT_CONFIG` (environment variable)
//! 3. `~/.config/lookout/config.toml` (Linux/macOS)
//!    `%APPDATA%\lookout\config.toml` (Windows)
//! 4. Built-in defaults
//!
//! Command-line flags and their environment variables (`LOOKOUT_WEBHOOK`,
//! `LOOKOUT_STAMPS`, ...) are applied on top by the binary. The resulting
//! value is never mutated after startup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LookoutError, Result};
use crate::parser::stamps::StampFilter;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where notifications are delivered.
    pub webhook: WebhookConfig,
    /// Which task mails are forwarded.
    pub filter: FilterConfig,
    /// The mail drop.
    pub watch: WatchConfig,
    /// The Phabricator instance that sends the mail.
    pub tracker: TrackerConfig,
    /// Logging.
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Execute-webhook URL. Required.
    pub url: Option<String>,
    /// Display name override for posted messages.
    pub username: Option<String>,
    /// Avatar override for posted messages.
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Literal substrings of the stamp header, e.g. `tag(#ultraviolet)`.
    /// Empty forwards every Maniphest mail.
    pub stamps: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory new mail files are delivered into.
    pub mail_dir: PathBuf,
    /// Upper bound on concurrently processed mails (unset = unbounded).
    pub max_in_flight: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Base URL used for task, profile and footer matching.
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: String,
    /// Also write logs (without ANSI colors) to this file.
    pub file: Option<PathBuf>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            mail_dir: PathBuf::from("/mail"),
            max_in_flight: None,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://phabricator.wikimedia.org".to_string(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// The webhook URL, or the fatal startup error for its absence.
    pub fn webhook_url(&self) -> Result<&str> {
        match self.webhook.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(LookoutError::InvalidConfig {
                option: "LOOKOUT_WEBHOOK",
                reason: "no webhook URL configured".to_string(),
            }),
        }
    }

    pub fn stamp_filter(&self) -> StampFilter {
        StampFilter::new(self.filter.stamps.iter().map(String::as_str))
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration from `explicit`, or else from the standard location.
///
/// A missing file yields the defaults; a file that exists but cannot be read
/// or parsed is an error.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match config_file_path() {
            Some(p) if p.exists() => p,
            _ => return Ok(Config::default()),
        },
    };

    let contents = std::fs::read_to_string(&path).map_err(|e| LookoutError::ConfigFile {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    toml::from_str::<Config>(&contents).map_err(|e| LookoutError::ConfigFile {
        path,
        reason: e.to_string(),
    })
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("LOOKOUT_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("lookout").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.watch.mail_dir, PathBuf::from("/mail"));
        assert_eq!(cfg.watch.max_in_flight, None);
        assert_eq!(cfg.tracker.base_url, "https://phabricator.wikimedia.org");
        assert_eq!(cfg.log.level, "info");
        assert!(cfg.stamp_filter().is_empty());
    }

    #[test]
    fn test_missing_webhook_is_invalid_config() {
        let cfg = Config::default();
        let err = cfg.webhook_url().unwrap_err();
        assert_eq!(err.tag(), "invalid_config");

        let mut cfg = Config::default();
        cfg.webhook.url = Some("   ".into());
        assert!(cfg.webhook_url().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[webhook]
url = "https://discord.com/api/webhooks/1/abc"

[filter]
stamps = ["tag(#ultraviolet)", "tag(#twinkle)"]
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(
            cfg.webhook_url().unwrap(),
            "https://discord.com/api/webhooks/1/abc"
        );
        assert!(cfg.stamp_filter().matches("tag(#twinkle)"));
        assert_eq!(cfg.watch.mail_dir, PathBuf::from("/mail"));
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[watch]\nmail_dir = \"/srv/mail\"\nmax_in_flight = 8\n").unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.watch.mail_dir, PathBuf::from("/srv/mail"));
        assert_eq!(cfg.watch.max_in_flight, Some(8));
    }

    #[test]
    fn test_load_broken_or_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[watch\n").unwrap();
        assert!(matches!(
            load_config(Some(&path)),
            Err(LookoutError::ConfigFile { .. })
        ));
        assert!(load_config(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
