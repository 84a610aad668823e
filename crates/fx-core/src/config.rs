// ABOUTME: Application configuration handling.
// ABOUTME: Loads starting effect and post-process options from a TOML config file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::effects::{EffectKind, EffectSettings};
use crate::options::OptionError;
use crate::post::PostProcessOptions;

/// Font used to rasterize the ASCII atlas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSettings {
    /// TTF/OTF file. When unset, the first monospace font found on the system is used.
    pub path: Option<PathBuf>,
    /// Rasterization size in pixels (atlas glyph cell height)
    pub pixel_size: f32,
}

impl Default for FontSettings {
    fn default() -> Self {
        Self {
            path: None,
            pixel_size: 32.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Window dimensions
    pub window_width: u32,
    pub window_height: u32,

    /// Image shown at startup (overridden by the command line)
    pub input: Option<PathBuf>,

    pub font: FontSettings,

    /// Effect selected at startup
    pub active_effect: EffectKind,

    /// Starting options per effect
    pub effects: EffectSettings,

    /// Post-process chain
    pub post: PostProcessOptions,

    /// Where F12 captures and text exports are written (defaults to the working directory)
    pub capture_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            input: None,
            font: FontSettings::default(),
            active_effect: EffectKind::default(),
            effects: EffectSettings::default(),
            post: PostProcessOptions::default(),
            capture_dir: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(#[from] OptionError),
}

impl Config {
    /// Get the default config file path (~/.config/fxdeck/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("fxdeck").join("config.toml"))
    }

    /// Load config from a path
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.effects.ascii.validate()?;
        Ok(config)
    }

    /// Pretty TOML, used to print a starting config file
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn capture_dir(&self) -> PathBuf {
        self.capture_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}
