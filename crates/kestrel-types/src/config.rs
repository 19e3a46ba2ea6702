//! Render configuration loaded from TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{KestrelError, Result};

/// Which graphics backend the application should build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Software,
    #[serde(alias = "gl")]
    OpenGl,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub fullscreen: bool,
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fullscreen: false,
            title: default_title(),
        }
    }
}

/// `[logging]` section. `filter` uses `env_logger` filter syntax.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub filter: Option<String>,
}

/// Top-level render configuration (`kestrel.toml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub depth_buffer: bool,
    /// Seconds a dynamic texture may stay unused before it is unloaded.
    /// Zero disables idle eviction.
    #[serde(default)]
    pub idle_texture_unload_time: f32,
    #[serde(default = "default_async_workers")]
    pub async_workers: usize,
    #[serde(default = "default_resource_dir")]
    pub resource_dir: PathBuf,
    /// Tried in order when a texture name has no extension.
    #[serde(default = "default_texture_extensions")]
    pub texture_extensions: Vec<String>,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub logging: LoggingSection,
}

fn default_width() -> u32 {
    800
}
fn default_height() -> u32 {
    600
}
fn default_title() -> String {
    "kestrel".to_string()
}
fn default_async_workers() -> usize {
    2
}
fn default_resource_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_texture_extensions() -> Vec<String> {
    vec![".png".to_string()]
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            depth_buffer: false,
            idle_texture_unload_time: 0.0,
            async_workers: default_async_workers(),
            resource_dir: default_resource_dir(),
            texture_extensions: default_texture_extensions(),
            window: WindowConfig::default(),
            logging: LoggingSection::default(),
        }
    }
}

impl RenderConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: RenderConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        log::debug!("loaded render config from {}", path.display());
        Self::from_toml_str(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<()> {
        if self.idle_texture_unload_time < 0.0 || !self.idle_texture_unload_time.is_finite() {
            return Err(KestrelError::Config(format!(
                "idle_texture_unload_time must be finite and >= 0, got {}",
                self.idle_texture_unload_time
            )));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(KestrelError::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        Ok(())
    }
}
