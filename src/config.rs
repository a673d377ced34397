use dotenv::dotenv;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Native,
    Magick,
}

/// Runtime settings, read from `RENAMER_*` environment variables (and `.env`).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory offered when a request leaves it empty; the working directory if unset.
    #[serde(default)]
    pub default_directory: Option<PathBuf>,
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_magick_binary")]
    pub magick_binary: String,
    #[serde(default = "default_identify_binary")]
    pub identify_binary: String,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

fn default_magick_binary() -> String {
    "magick".to_string()
}

fn default_identify_binary() -> String {
    "identify".to_string()
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_command_timeout_secs() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_directory: None,
            backend: BackendKind::default(),
            magick_binary: default_magick_binary(),
            identify_binary: default_identify_binary(),
            probe_timeout_secs: default_probe_timeout_secs(),
            command_timeout_secs: default_command_timeout_secs(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenv().ok();
        match envy::prefixed("RENAMER_").from_env::<AppConfig>() {
            Ok(config) => config,
            Err(err) => {
                warn!("Ignoring invalid RENAMER_* settings: {}", err);
                AppConfig::default()
            }
        }
    }

    /// Directory used when a request does not name one.
    pub fn fallback_directory(&self) -> String {
        self.default_directory
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .map(|path| path.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".".to_string())
    }
}

pub static APP_CONFIG: LazyLock<AppConfig> = LazyLock::new(|| {
    let config = AppConfig::from_env();
    info!("Loaded config: {:?}", config);
    config
});
