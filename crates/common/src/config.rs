//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{StoryreelError, StoryreelResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory where downloaded artifacts are written.
    pub output_dir: PathBuf,

    /// Default export settings.
    #[serde(default)]
    pub export: ExportDefaults,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Letterbox background colour as `#rrggbb`.
    pub background: String,

    /// Capture frame rate of the video backend.
    pub video_fps: u32,

    /// How the video backend holds each frame.
    pub video_pacing: VideoPacing,

    /// Folder inside the ZIP archive that holds the frame images.
    pub archive_folder: String,
}

/// Timing model of the video backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoPacing {
    /// Hold each frame on the capture surface for its duration in wall-clock time.
    #[default]
    Realtime,
    /// Feed the same samples without waiting.
    Offline,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "storyreel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            export: ExportDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            background: "#ffffff".to_string(),
            video_fps: 30,
            video_pacing: VideoPacing::Realtime,
            archive_folder: "frames".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl ExportDefaults {
    /// Parse the configured background colour into RGB components.
    pub fn background_rgb(&self) -> StoryreelResult<[u8; 3]> {
        parse_hex_rgb(&self.background)
    }
}

impl AppConfig {
    /// Standard config file location.
    pub fn path() -> PathBuf {
        let base = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".config")
            });
        base.join("storyreel").join("config.json")
    }

    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from `config_path`, falling back to defaults.
    pub fn load_from(config_path: &Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&Self::path())
    }

    /// Save config to `config_path`, creating parent directories.
    pub fn save_to(&self, config_path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Parse `#rrggbb` (leading `#` optional).
pub fn parse_hex_rgb(value: &str) -> StoryreelResult<[u8; 3]> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(StoryreelError::config(format!(
            "Expected colour as #rrggbb, got {value:?}"
        )));
    }

    let mut rgb = [0u8; 3];
    for (i, channel) in rgb.iter_mut().enumerate() {
        *channel = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|e| {
            StoryreelError::config(format!("Invalid colour component in {value:?}: {e}"))
        })?;
    }
    Ok(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_rgb() {
        assert_eq!(parse_hex_rgb("#ffffff").unwrap(), [255, 255, 255]);
        assert_eq!(parse_hex_rgb("1a2B3c").unwrap(), [0x1a, 0x2b, 0x3c]);
        assert!(parse_hex_rgb("#fff").is_err());
        assert!(parse_hex_rgb("#gggggg").is_err());
    }

    #[test]
    fn test_export_defaults() {
        let defaults = ExportDefaults::default();
        assert_eq!(defaults.background_rgb().unwrap(), [255, 255, 255]);
        assert_eq!(defaults.video_fps, 30);
        assert_eq!(defaults.video_pacing, VideoPacing::Realtime);
        assert_eq!(defaults.archive_folder, "frames");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"output_dir":"/tmp/out","export":{"video_pacing":"offline"}}"#)
                .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.export.video_pacing, VideoPacing::Offline);
        assert_eq!(config.export.video_fps, 30);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = std::env::temp_dir().join("storyreel_test_config");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.output_dir = PathBuf::from("/tmp/reels");
        config.export.video_fps = 24;
        config.export.video_pacing = VideoPacing::Offline;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.output_dir, PathBuf::from("/tmp/reels"));
        assert_eq!(loaded.export.video_fps, 24);
        assert_eq!(loaded.export.video_pacing, VideoPacing::Offline);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unreadable_config_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join("storyreel_test_bad_config");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.output_dir, PathBuf::from("."));
        assert_eq!(loaded.export.video_fps, 30);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_path_ends_in_storyreel_dir() {
        assert!(AppConfig::path().ends_with("storyreel/config.json"));
    }
}
