//! Configuration management module

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::backend::{BackendConfig, BackendType};

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub limits: LimitSettings,

    #[serde(default)]
    pub admin: AdminSettings,

    #[serde(default)]
    pub usage: UsageSettings,

    #[serde(default)]
    pub http: HttpSettings,

    /// Resolver backends in fallback order
    #[serde(default)]
    pub backends: Vec<BackendConfig>,

    #[serde(skip)]
    config_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Take the client address from X-Forwarded-For and friends.
    /// Only enable behind a reverse proxy that sets them.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

/// Per-client daily download limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_video_limit")]
    pub video_per_day: u32,

    #[serde(default = "default_audio_limit")]
    pub audio_per_day: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminSettings {
    /// Static admin password; admin endpoints are closed while unset
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSettings {
    /// Record downloads for the admin stats
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Number of log entries returned to the admin view (at most 50)
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Per-request timeout for upstream calls
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/vidgrab.db")
}

fn default_true() -> bool {
    true
}

fn default_video_limit() -> u32 {
    4
}

fn default_audio_limit() -> u32 {
    10
}

fn default_recent_limit() -> usize {
    50
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("vidgrab/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            trust_proxy_headers: false,
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            video_per_day: default_video_limit(),
            audio_per_day: default_audio_limit(),
        }
    }
}

impl Default for UsageSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            recent_limit: default_recent_limit(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            database: DatabaseSettings::default(),
            limits: LimitSettings::default(),
            admin: AdminSettings::default(),
            usage: UsageSettings::default(),
            http: HttpSettings::default(),
            backends: Vec::new(),
            config_file: None,
        }
    }
}

impl Settings {
    /// Load settings from environment and config file
    pub fn load() -> Result<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        // Try to find config file
        let mut config_paths = vec![
            PathBuf::from("config.toml"),
            PathBuf::from("./data/config.toml"),
        ];
        if let Some(path) = dirs_config_path() {
            config_paths.push(path);
        }

        let mut settings = Settings::default();

        for path in config_paths.iter() {
            if path.exists() {
                settings = Self::load_from_file(path)?;
                settings.config_file = Some(path.clone());
                break;
            }
        }

        if settings.backends.is_empty() {
            settings.backends.push(BackendConfig::default_cobalt());
        }

        // Override with environment variables
        settings.apply_env_overrides();

        // Ensure data directory exists
        if let Some(parent) = settings.database.path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create data directory")?;
        }

        Ok(settings)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::parse(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("VIDGRAB_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("VIDGRAB_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(value) = std::env::var("VIDGRAB_TRUST_PROXY") {
            self.server.trust_proxy_headers = parse_flag(&value);
        }
        if let Ok(path) = std::env::var("VIDGRAB_DATA_DIR") {
            self.database.path = PathBuf::from(path).join("vidgrab.db");
        }
        if let Ok(path) = std::env::var("VIDGRAB_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Ok(password) = std::env::var("VIDGRAB_ADMIN_PASSWORD") {
            self.admin.password = Some(password).filter(|p| !p.is_empty());
        }
        if let Ok(limit) = std::env::var("VIDGRAB_VIDEO_LIMIT") {
            if let Ok(limit) = limit.parse() {
                self.limits.video_per_day = limit;
            }
        }
        if let Ok(limit) = std::env::var("VIDGRAB_AUDIO_LIMIT") {
            if let Ok(limit) = limit.parse() {
                self.limits.audio_per_day = limit;
            }
        }
        if let Ok(key) = std::env::var("VIDGRAB_RAPIDAPI_KEY") {
            self.apply_rapidapi_key(&key);
        }
        if let Ok(list) = std::env::var("VIDGRAB_COBALT_INSTANCES") {
            self.apply_cobalt_instances(&list);
        }
    }

    /// Fill the key of every RapidAPI-hosted backend that has none
    fn apply_rapidapi_key(&mut self, key: &str) {
        if key.is_empty() {
            return;
        }
        for backend in self.backends.iter_mut() {
            let keyed = backend.backend_type == BackendType::RapidApi
                || (backend.backend_type == BackendType::Converter && backend.host.is_some());
            if keyed && backend.api_key.is_none() {
                backend.api_key = Some(key.to_string());
            }
        }
    }

    /// Replace the instance list of every Cobalt backend
    fn apply_cobalt_instances(&mut self, list: &str) {
        let instances = parse_list(list);
        if instances.is_empty() {
            return;
        }
        for backend in self.backends.iter_mut() {
            if backend.backend_type == BackendType::Cobalt {
                backend.instances = instances.clone();
            }
        }
    }

    /// Get the path to the config file (if loaded from file)
    pub fn config_path(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Get platform-specific config directory
fn dirs_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
            .map(|p| p.join("vidgrab/config.toml"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/vidgrab/config.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA")
            .ok()
            .map(|p| PathBuf::from(p).join("vidgrab/config.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        None
    }
}
