//! Bot configuration.
//!
//! Optional config file at `~/.config/gavel/bot.toml`. Command-line flags
//! and environment variables take precedence over it; built-in defaults
//! fill whatever is left.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default command prefix.
pub const DEFAULT_PREFIX: &str = "!";
/// Default directory for the truth-bullet catalogs.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Settings read from `bot.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    /// Command prefix. Default: `!`
    pub prefix: Option<String>,
    /// Directory for per-guild catalog files. Default: `data`
    pub data_dir: Option<PathBuf>,
}

pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gavel")
        .join("bot.toml")
}

impl FileConfig {
    /// Load `path`. A missing file yields the defaults; an unreadable or
    /// malformed one is reported and ignored.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(s) => match toml::from_str(&s) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("Bad config file {}: {e}", path.display()),
            },
            Err(e) => tracing::warn!("Can't read {}: {e}", path.display()),
        }
        Self::default()
    }
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub token: String,
    pub prefix: String,
    pub data_dir: PathBuf,
}

impl Settings {
    /// Merge explicit values (flags or environment) over the file.
    pub fn resolve(
        token: String,
        prefix: Option<String>,
        data_dir: Option<PathBuf>,
        file: FileConfig,
    ) -> Self {
        Self {
            token,
            prefix: prefix
                .or(file.prefix)
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            data_dir: data_dir
                .or(file.data_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_values_beat_the_file() {
        let file = FileConfig {
            prefix: Some("?".into()),
            data_dir: Some("/var/lib/gavel".into()),
        };
        let settings = Settings::resolve("t".into(), Some("$".into()), None, file);
        assert_eq!(settings.prefix, "$");
        assert_eq!(settings.data_dir, PathBuf::from("/var/lib/gavel"));
    }

    #[test]
    fn defaults_fill_the_gaps() {
        let settings = Settings::resolve("t".into(), None, None, FileConfig::default());
        assert_eq!(settings.prefix, DEFAULT_PREFIX);
        assert_eq!(settings.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
    }

    #[test]
    fn blank_prefix_falls_back() {
        let settings = Settings::resolve("t".into(), Some("  ".into()), None, FileConfig::default());
        assert_eq!(settings.prefix, DEFAULT_PREFIX);
    }

    #[test]
    fn file_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.toml");
        std::fs::write(&path, "prefix = \"?\"\ndata_dir = \"trial-data\"\n").unwrap();
        assert_eq!(
            FileConfig::load(&path),
            FileConfig {
                prefix: Some("?".into()),
                data_dir: Some("trial-data".into()),
            }
        );
    }

    #[test]
    fn missing_or_malformed_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(FileConfig::load(&dir.path().join("absent.toml")), FileConfig::default());

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "prefix = [").unwrap();
        assert_eq!(FileConfig::load(&bad), FileConfig::default());
    }
}
