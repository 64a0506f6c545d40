use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

static DEFAULT_CONFIG: &str = include_str!("default_config.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    Read {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    Parse {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub page: PageConfig,
    pub notebook: NotebookConfig,
    pub layout: LayoutConfig,
    pub math: MathConfig,
    pub html: HtmlConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    pub numbers: bool,
    pub paper: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            numbers: false,
            paper: "a4".to_string(),
        }
    }
}

/// Text printed around the document body.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct NotebookConfig {
    /// Line under the topic title. Empty disables it.
    pub subtitle: String,
    /// Print footer. Empty disables it.
    pub footer: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Vertical space emitted for each blank source line.
    pub blank_line_spacing: String,
    /// Keep a heading on the same page as the block after it.
    pub keep_heading_with_next: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            blank_line_spacing: "0.6em".to_string(),
            keep_heading_with_next: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MathConfig {
    /// Colour of math that could not be rendered and is shown as source.
    pub error_color: String,
}

impl Default for MathConfig {
    fn default() -> Self {
        Self {
            error_color: "#ef4444".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HtmlConfig {
    /// Base URL of the KaTeX `dist` directory.
    pub katex_base_url: String,
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self {
            katex_base_url: "https://cdn.jsdelivr.net/npm/katex@0.16.11/dist".to_string(),
        }
    }
}

impl Config {
    /// The bundled default config. Validated as TOML by the build script.
    pub fn compiled_default() -> Self {
        toml::from_str(DEFAULT_CONFIG).unwrap_or_default()
    }

    /// Load config from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            config_path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            config_path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
