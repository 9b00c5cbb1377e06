use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::{self, SortOption};
use crate::session::Settings;

const DEFAULT_ENV_PREFIX: &str = "MOLTBOOK";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub ui: UIConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_wait", with = "humantime_serde")]
    pub retry_wait: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
            retries: default_retries(),
            retry_wait: default_retry_wait(),
        }
    }
}

fn default_base_url() -> String {
    api::DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    format!("moltbook-tui/{}", crate::VERSION)
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_retries() -> u32 {
    3
}

fn default_retry_wait() -> Duration {
    Duration::from_secs(1)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_preload_threshold")]
    pub preload_threshold: usize,
    #[serde(default)]
    pub sort: SortOption,
    #[serde(default = "default_pagination_retry_delay", with = "humantime_serde")]
    pub pagination_retry_delay: Duration,
    #[serde(default = "default_pagination_retry_limit")]
    pub pagination_retry_limit: u32,
    #[serde(default = "default_community")]
    pub community: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            preload_threshold: default_preload_threshold(),
            sort: SortOption::default(),
            pagination_retry_delay: default_pagination_retry_delay(),
            pagination_retry_limit: default_pagination_retry_limit(),
            community: default_community(),
        }
    }
}

fn default_page_size() -> usize {
    20
}

fn default_preload_threshold() -> usize {
    2
}

fn default_pagination_retry_delay() -> Duration {
    Duration::from_secs(3)
}

fn default_pagination_retry_limit() -> u32 {
    3
}

fn default_community() -> String {
    "general".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_tick_rate", with = "humantime_serde")]
    pub tick_rate: Duration,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            tick_rate: default_tick_rate(),
        }
    }
}

fn default_tick_rate() -> Duration {
    Duration::from_millis(120)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            level: default_log_level(),
        }
    }
}

fn default_log_file() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("moltbook").join("moltbook-tui.log"))
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    pub fn client_config(&self, api_key: Option<String>) -> api::ClientConfig {
        api::ClientConfig {
            base_url: self.api.base_url.clone(),
            user_agent: self.api.user_agent.clone(),
            api_key,
            timeout: self.api.timeout,
            retries: self.api.retries,
            retry_wait: self.api.retry_wait,
            http_client: None,
        }
    }

    pub fn session_settings(&self) -> Settings {
        Settings {
            page_size: self.feed.page_size.max(1),
            preload_threshold: self.feed.preload_threshold,
            sort: self.feed.sort,
            pagination_retry_delay: self.feed.pagination_retry_delay,
            pagination_retry_limit: self.feed.pagination_retry_limit,
            community: self.feed.community.clone(),
        }
    }
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
            cfg = read_config_file(path)?;
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            cfg = read_config_file(&default_path)?;
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    if data.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn apply_env(cfg: &mut Config, prefix: &str) {
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            apply_env_value(cfg, &normalized, value);
        }
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
        "api.retries" => {
            if let Ok(parsed) = value.parse::<u32>() {
                cfg.api.retries = parsed;
            }
        }
        "api.retry_wait" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.api.retry_wait = duration;
            }
        }
        "feed.page_size" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.feed.page_size = parsed;
            }
        }
        "feed.preload_threshold" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.feed.preload_threshold = parsed;
            }
        }
        "feed.sort" => {
            if let Some(sort) = SortOption::parse(&value) {
                cfg.feed.sort = sort;
            }
        }
        "feed.pagination_retry_delay" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.feed.pagination_retry_delay = duration;
            }
        }
        "feed.pagination_retry_limit" => {
            if let Ok(parsed) = value.parse::<u32>() {
                cfg.feed.pagination_retry_limit = parsed;
            }
        }
        "feed.community" => cfg.feed.community = value,
        "ui.tick_rate" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.ui.tick_rate = duration;
            }
        }
        "log.file" => cfg.log.file = Some(PathBuf::from(value)),
        "log.level" => cfg.log.level = value,
        _ => {}
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("moltbook").join("config.yaml"))
}
