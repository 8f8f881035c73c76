//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, QuodConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local). Only returns files
/// that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/quodlibet/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("quodlibet/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("quodlibet.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file and lay its values over `config`.
pub fn load_from_file(path: &Path, config: &mut QuodConfig) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    overlay_toml(&contents, path, config)
}

/// Lay the keys present in `contents` over `config`. Absent keys keep their
/// current value, so a later file only needs to name what it changes.
pub(crate) fn overlay_toml(
    contents: &str,
    path: &Path,
    config: &mut QuodConfig,
) -> Result<(), ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if let Some(paths) = section(&table, "paths", path)? {
        if let Some(v) = string_key(paths, "pieces_dir", path)? {
            config.paths.pieces_dir = expand_path(v);
        }
        if let Some(v) = string_key(paths, "export_dir", path)? {
            config.paths.export_dir = expand_path(v);
        }
    }

    if let Some(telemetry) = section(&table, "telemetry", path)? {
        if let Some(v) = string_key(telemetry, "log_level", path)? {
            config.telemetry.log_level = v.to_string();
        }
    }

    Ok(())
}

fn section<'a>(
    table: &'a toml::Table,
    name: &str,
    path: &Path,
) -> Result<Option<&'a toml::Table>, ConfigError> {
    match table.get(name) {
        None => Ok(None),
        Some(value) => value.as_table().map(Some).ok_or_else(|| ConfigError::Parse {
            path: path.to_path_buf(),
            message: format!("[{name}] must be a table"),
        }),
    }
}

fn string_key<'a>(
    table: &'a toml::Table,
    key: &str,
    path: &Path,
) -> Result<Option<&'a str>, ConfigError> {
    match table.get(key) {
        None => Ok(None),
        Some(value) => value.as_str().map(Some).ok_or_else(|| ConfigError::Parse {
            path: path.to_path_buf(),
            message: format!("{key} must be a string"),
        }),
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut QuodConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Apply overrides from any variable lookup. `RUST_LOG` wins over
/// `QUODLIBET_LOG_LEVEL` when both are set.
pub fn apply_overrides_from(
    config: &mut QuodConfig,
    sources: &mut ConfigSources,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = lookup("QUODLIBET_PIECES_DIR") {
        config.paths.pieces_dir = expand_path(&v);
        sources.env_overrides.push("QUODLIBET_PIECES_DIR".to_string());
    }
    if let Some(v) = lookup("QUODLIBET_EXPORT_DIR") {
        config.paths.export_dir = expand_path(&v);
        sources.env_overrides.push("QUODLIBET_EXPORT_DIR".to_string());
    }
    if let Some(v) = lookup("QUODLIBET_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("QUODLIBET_LOG_LEVEL".to_string());
    }
    if let Some(v) = lookup("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

/// Expand `~/` and a leading `$VAR` in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        return directories::BaseDirs::new()
            .map(|d| d.home_dir().join(stripped))
            .unwrap_or_else(|| PathBuf::from(path));
    }

    if let Some(stripped) = path.strip_prefix('$') {
        let (var_name, rest) = match stripped.find('/') {
            Some(slash) => (&stripped[..slash], Some(&stripped[slash + 1..])),
            None => (stripped, None),
        };
        return match (env::var(var_name), rest) {
            (Ok(value), Some(rest)) => PathBuf::from(value).join(rest),
            (Ok(value), None) => PathBuf::from(value),
            (Err(_), _) => PathBuf::from(path),
        };
    }

    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/pieces/canon");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().ends_with("pieces/canon"));
    }

    #[test]
    fn test_expand_path_absolute() {
        assert_eq!(expand_path("/srv/pieces"), PathBuf::from("/srv/pieces"));
    }

    #[test]
    fn test_overlay_keeps_unnamed_keys() {
        let mut config = QuodConfig::default();
        let toml = r#"
[paths]
export_dir = "/tmp/exports"
"#;
        overlay_toml(toml, Path::new("test.toml"), &mut config).unwrap();

        assert_eq!(config.paths.export_dir, PathBuf::from("/tmp/exports"));
        assert_eq!(config.paths.pieces_dir, QuodConfig::default().paths.pieces_dir);
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn test_overlay_rejects_wrong_types() {
        let mut config = QuodConfig::default();
        let err = overlay_toml("[paths]\npieces_dir = 3\n", Path::new("bad.toml"), &mut config)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let err = overlay_toml("paths = \"nope\"\n", Path::new("bad.toml"), &mut config)
            .unwrap_err();
        assert!(err.to_string().contains("[paths] must be a table"));
    }

    #[test]
    fn test_overlay_rejects_invalid_toml() {
        let mut config = QuodConfig::default();
        let err = overlay_toml("[paths\n", Path::new("broken.toml"), &mut config).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_env_overrides_record_their_source() {
        let vars: HashMap<&str, &str> = [
            ("QUODLIBET_PIECES_DIR", "/data/pieces"),
            ("QUODLIBET_LOG_LEVEL", "debug"),
            ("RUST_LOG", "quodlibet=trace"),
        ]
        .into_iter()
        .collect();

        let mut config = QuodConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(&mut config, &mut sources, |k| {
            vars.get(k).map(|v| v.to_string())
        });

        assert_eq!(config.paths.pieces_dir, PathBuf::from("/data/pieces"));
        assert_eq!(config.telemetry.log_level, "quodlibet=trace");
        assert_eq!(
            sources.env_overrides,
            vec!["QUODLIBET_PIECES_DIR", "QUODLIBET_LOG_LEVEL", "RUST_LOG"]
        );
    }

    #[test]
    fn test_cli_override_replaces_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[telemetry]\nlog_level = \"warn\"\n").unwrap();

        let files = discover_config_files_with_override(Some(&path));
        assert_eq!(files.last(), Some(&path));
    }
}
