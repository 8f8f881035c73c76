//! Configuration loading for Quodlibet.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/quodlibet/config.toml` (system)
//! 2. `~/.config/quodlibet/config.toml` (user)
//! 3. `./quodlibet.toml` (local override, or a path given on the command line)
//! 4. Environment variables (`QUODLIBET_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! pieces_dir = "~/music/pieces"
//! export_dir = "~/music/exports"
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;
pub mod settings;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use settings::{PathsConfig, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete Quodlibet configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuodConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl QuodConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, with `config_path` standing in for
    /// `./quodlibet.toml`. System and user configs still load first.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and report where values came from.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = QuodConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            loader::load_from_file(&path, &mut config)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# Quodlibet Configuration\n\n");

        output.push_str("[paths]\n");
        output.push_str(&format!(
            "pieces_dir = \"{}\"\n",
            self.paths.pieces_dir.display()
        ));
        output.push_str(&format!(
            "export_dir = \"{}\"\n",
            self.paths.export_dir.display()
        ));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = QuodConfig::default();
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.paths.export_dir.ends_with("quodlibet/exports"));
    }

    #[test]
    fn test_to_toml_reads_back() {
        let mut config = QuodConfig::default();
        config.paths.pieces_dir = PathBuf::from("/srv/pieces");
        config.telemetry.log_level = "debug".to_string();

        let rendered = config.to_toml();
        assert!(rendered.contains("[paths]"));
        assert!(rendered.contains("[telemetry]"));

        let parsed: QuodConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_file_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quodlibet.toml");
        std::fs::write(&path, "[paths]\nexport_dir = \"/out\"\n").unwrap();

        let mut config = QuodConfig::default();
        loader::load_from_file(&path, &mut config).unwrap();
        assert_eq!(config.paths.export_dir, PathBuf::from("/out"));
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = QuodConfig::default();
        let err = loader::load_from_file(&dir.path().join("absent.toml"), &mut config)
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }
}
