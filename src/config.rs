use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::protocol::{DEFAULT_SETTING_VALUE, QuerySettings};
use crate::theme::{ColorsToml, Theme};

pub const DEFAULT_CONFIG_FILE: &str = "research-console.toml";
pub const DEFAULT_ORIGIN: &str = "http://localhost:8000";
pub const DEFAULT_ENDPOINT_PATH: &str = "/ws";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientVariant {
    #[default]
    Report,
    Transcript,
}

impl ClientVariant {
    pub fn label(self) -> &'static str {
        match self {
            Self::Report => "report",
            Self::Transcript => "transcript",
        }
    }
}

impl FromStr for ClientVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "report" => Ok(Self::Report),
            "transcript" | "chat" => Ok(Self::Transcript),
            other => Err(ConfigError::UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub origin: String,
    pub endpoint_path: String,
    /// `None` uses the variant's own delay.
    pub reconnect_delay: Option<Duration>,
    pub connect_timeout: Duration,
    pub settings: QuerySettings,
    pub variant: ClientVariant,
    pub download_dir: PathBuf,
    pub log_file: Option<PathBuf>,
    pub log_level: String,
    pub theme: Theme,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            endpoint_path: DEFAULT_ENDPOINT_PATH.to_string(),
            reconnect_delay: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            settings: QuerySettings::default(),
            variant: ClientVariant::default(),
            download_dir: PathBuf::from("."),
            log_file: None,
            log_level: "info".to_string(),
            theme: Theme::default(),
        }
    }
}

impl ClientConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!(
                    "Failed to load config '{}': {err}. Using defaults.",
                    path.display()
                );
                Self::default()
            }
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: ConfigToml = toml::from_str(s)?;
        let defaults = Self::default();
        let variant = match cfg.ui.variant.as_deref() {
            Some(raw) => raw.parse()?,
            None => defaults.variant,
        };
        Ok(Self {
            origin: cfg.connection.origin.unwrap_or(defaults.origin),
            endpoint_path: cfg
                .connection
                .endpoint_path
                .unwrap_or(defaults.endpoint_path),
            reconnect_delay: cfg.connection.reconnect_delay_ms.map(Duration::from_millis),
            connect_timeout: cfg
                .connection
                .connect_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            settings: QuerySettings {
                num_searches: positive_or_default(cfg.research.num_searches),
                num_rewordings: positive_or_default(cfg.research.num_rewordings),
            },
            variant,
            download_dir: cfg.ui.download_dir.unwrap_or(defaults.download_dir),
            log_file: cfg.logging.file,
            log_level: cfg.logging.level.unwrap_or(defaults.log_level),
            theme: Theme::with_overrides(cfg.colors.as_ref()),
        })
    }
}

fn positive_or_default(value: Option<u32>) -> u32 {
    value.filter(|v| *v > 0).unwrap_or(DEFAULT_SETTING_VALUE)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigToml {
    connection: ConnectionToml,
    research: ResearchToml,
    ui: UiToml,
    logging: LoggingToml,
    colors: Option<ColorsToml>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConnectionToml {
    origin: Option<String>,
    endpoint_path: Option<String>,
    reconnect_delay_ms: Option<u64>,
    connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResearchToml {
    num_searches: Option<u32>,
    num_rewordings: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UiToml {
    variant: Option<String>,
    download_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoggingToml {
    file: Option<PathBuf>,
    level: Option<String>,
}
