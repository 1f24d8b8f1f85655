use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::browser::{Limit, TimeFrame};

const DEFAULT_ENV_PREFIX: &str = "PENTYFLIX";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub ui: UIConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:5000/api/".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_user_agent() -> String {
    format!("pentyflix/{}", crate::VERSION)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_delay", with = "humantime_serde")]
    pub batch_delay: Duration,
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay: default_batch_delay(),
            search_limit: default_search_limit(),
        }
    }
}

fn default_batch_size() -> usize {
    2
}

fn default_batch_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_search_limit() -> u32 {
    25
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BrowserConfig {
    #[serde(default)]
    pub default_time_frame: TimeFrame,
    #[serde(default)]
    pub default_limit: Limit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_toast_ttl", with = "humantime_serde")]
    pub toast_ttl: Duration,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            toast_ttl: default_toast_ttl(),
        }
    }
}

fn default_theme() -> String {
    "default".into()
}

fn default_toast_ttl() -> Duration {
    Duration::from_secs(3)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_file() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("pentyflix").join("pentyflix.log"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    cfg.api.base_url = normalize_base_url(&cfg.api.base_url);
    if cfg.feed.batch_size == 0 {
        cfg.feed.batch_size = default_batch_size();
    }

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.api.base_url.is_empty() {
        base.api.base_url = other.api.base_url;
    }
    if !other.api.timeout.is_zero() {
        base.api.timeout = other.api.timeout;
    }
    if !other.api.user_agent.is_empty() {
        base.api.user_agent = other.api.user_agent;
    }

    if other.feed.batch_size != 0 {
        base.feed.batch_size = other.feed.batch_size;
    }
    base.feed.batch_delay = other.feed.batch_delay;
    if other.feed.search_limit != 0 {
        base.feed.search_limit = other.feed.search_limit;
    }

    base.browser = other.browser;

    if !other.ui.theme.is_empty() {
        base.ui.theme = other.ui.theme;
    }
    if !other.ui.toast_ttl.is_zero() {
        base.ui.toast_ttl = other.ui.toast_ttl;
    }

    if !other.log.level.is_empty() {
        base.log.level = other.log.level;
    }
    if other.log.file.is_some() {
        base.log.file = other.log.file;
    }

    if other.storage.path.is_some() {
        base.storage.path = other.storage.path;
    }

    base
}

fn apply_env(cfg: &mut Config, prefix: &str) {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(cfg, &key, value);
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "api.base_url" => cfg.api.base_url = value,
        "api.user_agent" => cfg.api.user_agent = value,
        "api.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.api.timeout = duration;
            }
        }
        "feed.batch_size" => {
            if let Ok(parsed) = value.parse::<usize>() {
                if parsed > 0 {
                    cfg.feed.batch_size = parsed;
                }
            }
        }
        "feed.batch_delay" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.feed.batch_delay = duration;
            }
        }
        "feed.search_limit" => {
            if let Ok(parsed) = value.parse::<u32>() {
                cfg.feed.search_limit = parsed;
            }
        }
        "browser.default_time_frame" => {
            if let Some(frame) = TimeFrame::from_key(&value) {
                cfg.browser.default_time_frame = frame;
            }
        }
        "browser.default_limit" => {
            if let Some(limit) = value.parse::<u32>().ok().and_then(Limit::from_count) {
                cfg.browser.default_limit = limit;
            }
        }
        "ui.theme" => cfg.ui.theme = value,
        "ui.toast_ttl" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.ui.toast_ttl = duration;
            }
        }
        "log.level" => cfg.log.level = value,
        "log.file" => cfg.log.file = Some(PathBuf::from(value)),
        "storage.path" => cfg.storage.path = Some(PathBuf::from(value)),
        _ => {}
    }
}

pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return default_base_url();
    }
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pentyflix").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn isolated(prefix: &str) -> LoadOptions {
        let dir = tempdir().unwrap();
        LoadOptions {
            config_file: Some(dir.path().join("missing.yaml")),
            env_prefix: Some(prefix.to_string()),
        }
    }

    #[test]
    fn load_defaults_without_files() {
        let cfg = load(isolated("PENTYFLIX_TEST_DEFAULTS")).unwrap();
        assert_eq!(cfg.ui.theme, "default");
        assert_eq!(cfg.feed.batch_size, 2);
        assert_eq!(cfg.feed.batch_delay, Duration::from_millis(500));
        assert_eq!(cfg.browser.default_time_frame, TimeFrame::Week);
        assert_eq!(cfg.browser.default_limit, Limit::TwentyFive);
        assert!(cfg.api.base_url.ends_with('/'));
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "api:\n  base_url: https://api.example.test/v1\nfeed:\n  batch_size: 4\n  batch_delay: 1s\nbrowser:\n  default_time_frame: month\n  default_limit: 50\n",
        )
        .unwrap();
        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("PENTYFLIX_TEST_FILE".into()),
        })
        .unwrap();
        assert_eq!(cfg.api.base_url, "https://api.example.test/v1/");
        assert_eq!(cfg.feed.batch_size, 4);
        assert_eq!(cfg.feed.batch_delay, Duration::from_secs(1));
        assert_eq!(cfg.browser.default_time_frame, TimeFrame::Month);
        assert_eq!(cfg.browser.default_limit, Limit::Fifty);
    }

    #[test]
    fn env_overrides() {
        env::set_var("PENTYFLIX_TEST_ENV_UI__THEME", "dracula");
        env::set_var("PENTYFLIX_TEST_ENV_FEED__BATCH_SIZE", "0");
        let cfg = load(isolated("PENTYFLIX_TEST_ENV")).unwrap();
        assert_eq!(cfg.ui.theme, "dracula");
        assert_eq!(cfg.feed.batch_size, 2);
        env::remove_var("PENTYFLIX_TEST_ENV_UI__THEME");
        env::remove_var("PENTYFLIX_TEST_ENV_FEED__BATCH_SIZE");
    }
}
