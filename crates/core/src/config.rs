//! Frame configuration from the command line and TOML files.
//!
//! Values are resolved in three layers: built-in defaults, an optional TOML
//! file, then command-line flags, each overriding the previous one.
//!
//! # Example
//!
//! ```no_run
//! use clap::Parser;
//! use lava_core::{FrameArgs, FrameConfig};
//!
//! let args = FrameArgs::parse();
//! let config = FrameConfig::resolve(&args).expect("invalid configuration");
//! println!("{} running with v-sync {}", config.app_name, config.v_sync);
//! ```

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Configuration errors.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),
}

/// Command-line flags understood by every frame-driven application.
#[derive(Parser, Debug, Clone, Default, PartialEq)]
#[command(author, version, about, long_about = None)]
pub struct FrameArgs {
    /// Enable validation layers
    #[arg(short, long)]
    pub debug: bool,

    /// Enable debug utils labels and object names
    #[arg(short, long)]
    pub utils: bool,

    /// Log filter directive, e.g. `debug` or `info,lava_frame=trace`
    #[arg(short, long, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Force v-sync on
    #[arg(long)]
    pub v_sync: bool,

    /// TOML file to load before applying flags
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Window settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "lava".to_string(),
            width: 1280,
            height: 720,
            resizable: true,
        }
    }
}

/// Settings consumed by the frame, the render target and the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub app_name: String,
    /// Enables the Khronos validation layer.
    pub debug: bool,
    /// Enables the debug utils extension without validation.
    pub utils: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    pub v_sync: bool,
    pub triple_buffer: bool,
    /// Block on the event queue instead of polling while iconified.
    pub wait_for_events: bool,
    pub clear_color: [f32; 3],
    pub window: WindowConfig,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            app_name: "lava".to_string(),
            debug: false,
            utils: false,
            log_level: None,
            v_sync: false,
            triple_buffer: true,
            wait_for_events: true,
            clear_color: [0.0, 0.0, 0.0],
            window: WindowConfig::default(),
        }
    }
}

impl FrameConfig {
    /// Parses a configuration from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Loads a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid TOML for this type.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        debug!("Loaded frame config from {}", path.display());
        Ok(config)
    }

    /// Writes the configuration as pretty TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Applies command-line flags on top of the current values.
    ///
    /// Boolean flags only switch features on; an absent flag keeps the value
    /// from the file.
    pub fn apply_args(&mut self, args: &FrameArgs) {
        self.debug |= args.debug;
        self.utils |= args.utils;
        self.v_sync |= args.v_sync;
        if let Some(level) = &args.log {
            self.log_level = Some(level.clone());
        }
    }

    /// Builds the effective configuration for `args`.
    ///
    /// A `--config` path that does not exist is reported and ignored so a
    /// fresh checkout still starts with defaults.
    pub fn resolve(args: &FrameArgs) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) if path.exists() => Self::load(path)?,
            Some(path) => {
                warn!("Config file {} not found, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_args(args);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_parse_short_and_long() {
        let args = FrameArgs::try_parse_from(["demo", "-d", "-u", "-l", "trace", "--v-sync"])
            .expect("flags should parse");
        assert!(args.debug);
        assert!(args.utils);
        assert!(args.v_sync);
        assert_eq!(args.log.as_deref(), Some("trace"));
        assert!(args.config.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = FrameConfig::from_toml_str(
            r#"
            app_name = "triangle"
            v_sync = true

            [window]
            width = 800
            "#,
        )
        .expect("valid toml");

        assert_eq!(config.app_name, "triangle");
        assert!(config.v_sync);
        assert!(config.triple_buffer);
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 720);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let result = FrameConfig::from_toml_str("v_sync = \"maybe\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_args_override_file_values() {
        let mut config = FrameConfig {
            log_level: Some("warn".to_string()),
            ..Default::default()
        };
        let args = FrameArgs {
            debug: true,
            log: Some("debug".to_string()),
            ..Default::default()
        };

        config.apply_args(&args);

        assert!(config.debug);
        assert!(!config.v_sync);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_missing_config_file_falls_back_to_defaults() {
        let args = FrameArgs {
            config: Some(PathBuf::from("./does/not/exist/lava.toml")),
            v_sync: true,
            ..Default::default()
        };

        let config = FrameConfig::resolve(&args).expect("missing file is not an error");
        assert!(config.v_sync);
        assert_eq!(config.app_name, "lava");
    }
}
