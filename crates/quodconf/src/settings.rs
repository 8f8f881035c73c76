//! Settings that are fixed for the life of the process.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where pieces are read from and exports are written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root holding one directory per piece.
    /// Default: ~/.local/share/quodlibet/pieces
    #[serde(default = "PathsConfig::default_pieces_dir")]
    pub pieces_dir: PathBuf,

    /// Exported compositions land here as `<id>.mid`.
    /// Default: ~/.local/share/quodlibet/exports
    #[serde(default = "PathsConfig::default_export_dir")]
    pub export_dir: PathBuf,
}

impl PathsConfig {
    fn default_pieces_dir() -> PathBuf {
        data_dir().join("pieces")
    }

    fn default_export_dir() -> PathBuf {
        data_dir().join("exports")
    }
}

fn data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.data_dir().join("quodlibet"))
        .unwrap_or_else(|| PathBuf::from(".local/share/quodlibet"))
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            pieces_dir: Self::default_pieces_dir(),
            export_dir: Self::default_export_dir(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Filter directive for the log subscriber (`info`, `quodlibet=debug`, ...).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
