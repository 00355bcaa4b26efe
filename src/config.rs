//! Configuration file handling for storyreel.
//!
//! Loads configuration from `<config dir>/storyreel/config.toml` or a custom
//! path. Every field has a default, so a missing file or a partial file is
//! fine. The API key is never stored here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fal::{
    AspectRatio, ClipDuration, FalClient, FalError, Resolution, DEFAULT_GENERATION_TIMEOUT,
    DEFAULT_MODEL, DEFAULT_POLL_INTERVAL, DEFAULT_REFERENCE_MODEL, FAL_API_BASE_URL,
};
use crate::media::{FfmpegTool, TransitionKind};
use crate::storyboard::{DEFAULT_CONCURRENCY, DEFAULT_MUSIC_VOLUME, DEFAULT_TRANSITION_DURATION};

/// Configuration file structure for storyreel.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub fal: FalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub assembly: AssemblyConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FalConfig {
    pub base_url: String,
    pub model: String,
    pub reference_model: String,
    pub poll_interval_secs: u64,
    pub generation_timeout_secs: u64,
}

impl Default for FalConfig {
    fn default() -> Self {
        Self {
            base_url: FAL_API_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            reference_model: DEFAULT_REFERENCE_MODEL.to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            generation_timeout_secs: DEFAULT_GENERATION_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
    pub duration: ClipDuration,
    pub generate_audio: bool,
    pub concurrency: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::default(),
            resolution: Resolution::default(),
            duration: ClipDuration::default(),
            generate_audio: true,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AssemblyConfig {
    pub transition: TransitionKind,
    pub transition_duration: f64,
    pub music_volume: f64,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    /// Parent of per-run workspaces. Defaults to the system temp dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            transition: TransitionKind::default(),
            transition_duration: DEFAULT_TRANSITION_DURATION,
            music_volume: f64::from(DEFAULT_MUSIC_VOLUME),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            work_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })?;
            Self::parse(&content, &path)
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
            Ok(Config::default())
        }
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate().map_err(|message| ConfigError::InvalidValue {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.fal.poll_interval_secs == 0 {
            return Err("fal.poll_interval_secs must be at least 1".to_string());
        }
        if self.fal.generation_timeout_secs == 0 {
            return Err("fal.generation_timeout_secs must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeError)
    }

    /// Write the default configuration to `path`, refusing to overwrite.
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }
        let content = Config::default().to_toml()?;
        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)
        };
        write().map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Build a fal client from the `[fal]` section with an explicit key.
    pub fn fal_client(&self, api_key: String) -> Result<FalClient, FalError> {
        Ok(FalClient::with_base_url(api_key, self.fal.base_url.clone())?
            .with_models(&self.fal.model, &self.fal.reference_model)
            .with_poll_interval(Duration::from_secs(self.fal.poll_interval_secs))
            .with_generation_timeout(Duration::from_secs(self.fal.generation_timeout_secs)))
    }

    pub fn media_tool(&self) -> FfmpegTool {
        FfmpegTool::new(&self.assembly.ffmpeg_path, &self.assembly.ffprobe_path)
    }

    pub fn work_dir(&self) -> PathBuf {
        self.assembly
            .work_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Errors that can occur when loading or writing configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    InvalidValue {
        path: PathBuf,
        message: String,
    },
    SerializeError(toml::ser::Error),
    AlreadyExists(PathBuf),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to access config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::InvalidValue { path, message } => {
                write!(f, "Invalid config file '{}': {}", path.display(), message)
            }
            ConfigError::SerializeError(source) => {
                write!(f, "Failed to serialize config: {}", source)
            }
            ConfigError::AlreadyExists(path) => {
                write!(f, "Config file already exists: '{}'", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::SerializeError(source) => Some(source),
            ConfigError::InvalidValue { .. } | ConfigError::AlreadyExists(_) => None,
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("storyreel").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/storyreel/config.toml")
        })
}
