//! User configuration and preferences

use crate::error::{RawPickError, Result};
use crate::fileops::ExportMode;
use crate::raw::EngineSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Thumbnails wider than this are downscaled
    pub thumbnail_max_width: u32,
    /// JPEG quality (1-100) of filmstrip thumbnails
    pub thumbnail_quality: u8,
    /// JPEG quality (1-100) of the main viewer image
    pub full_quality: u8,
    pub default_export_mode: ExportMode,
    /// Log filter used when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        let engine = EngineSettings::default();
        Self {
            thumbnail_max_width: engine.thumbnail_max_width,
            thumbnail_quality: engine.thumbnail_quality,
            full_quality: engine.full_quality,
            default_export_mode: ExportMode::Both,
            log_filter: "warn".to_string(),
        }
    }
}

impl UserConfig {
    /// Get the config file path (~/.config/rawpick/config.json)
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rawpick").join("config.json"))
    }

    /// Load config from file, or create default if doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path().ok_or_else(|| {
            RawPickError::ConfigError("Could not determine config directory".to_string())
        })?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            RawPickError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            RawPickError::ConfigError(format!("Failed to parse config file: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().ok_or_else(|| {
            RawPickError::ConfigError("Could not determine config directory".to_string())
        })?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                RawPickError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let contents = serde_json::to_string_pretty(self).map_err(|e| {
            RawPickError::ConfigError(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, contents).map_err(|e| {
            RawPickError::ConfigError(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.thumbnail_max_width == 0 {
            return Err(RawPickError::ConfigError(
                "thumbnail_max_width must be greater than 0".to_string(),
            ));
        }
        for (name, quality) in [
            ("thumbnail_quality", self.thumbnail_quality),
            ("full_quality", self.full_quality),
        ] {
            if !(1..=100).contains(&quality) {
                return Err(RawPickError::ConfigError(format!(
                    "{} must be between 1 and 100, got {}",
                    name, quality
                )));
            }
        }
        Ok(())
    }

    /// Decode engine tuning derived from this config
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            thumbnail_max_width: self.thumbnail_max_width,
            thumbnail_quality: self.thumbnail_quality,
            full_quality: self.full_quality,
        }
    }
}
