//! Application settings and paths.
//!
//! Settings live in a JSON file under the XDG config directory. Every field
//! has a default, so a partial (or missing) file is always usable.

use crate::error::{ConfigError, ConfigResult};
use crate::resolver::{DEFAULT_LOOKUP_TIMEOUT, LOOKUP_TIMEOUT_MS};
use crate::scanner::ScanParams;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/portsweep)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Locate the platform configuration directory.
    pub fn discover() -> ConfigResult<Self> {
        let project = ProjectDirs::from("org", "portsweep", "portsweep")
            .ok_or(ConfigError::DirectoryNotFound)?;
        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Application-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Scan parameters used when a flag is not given.
    pub scan: ScanParams,
    /// Default output format (plain, json, csv).
    pub default_output_format: String,
    /// Reverse DNS timeout in milliseconds.
    pub lookup_timeout_ms: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            scan: ScanParams::default(),
            default_output_format: "plain".to_string(),
            lookup_timeout_ms: DEFAULT_LOOKUP_TIMEOUT.as_millis() as u64,
        }
    }
}

impl AppSettings {
    /// Load settings from the default location, or defaults if there is no file.
    pub fn load() -> ConfigResult<Self> {
        let file = Paths::discover()?.settings_file();
        if !file.exists() {
            tracing::debug!(path = %file.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let settings: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Save settings to the default location.
    pub fn save(&self) -> ConfigResult<PathBuf> {
        let paths = Paths::discover()?;
        fs::create_dir_all(&paths.config_dir)?;
        let file = paths.settings_file();
        self.save_to(&file)?;
        Ok(file)
    }

    /// Save settings to a specific file.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Reverse DNS timeout, clamped to 50-500ms.
    pub fn lookup_timeout(&self) -> Duration {
        let ms = self
            .lookup_timeout_ms
            .clamp(*LOOKUP_TIMEOUT_MS.start(), *LOOKUP_TIMEOUT_MS.end());
        if ms != self.lookup_timeout_ms {
            tracing::warn!(
                configured = self.lookup_timeout_ms,
                used = ms,
                "lookup_timeout_ms out of range"
            );
        }
        Duration::from_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();
        assert_eq!(settings.scan.start_ip, "192.168.1.1");
        assert_eq!(settings.scan.end_ip, "192.168.1.255");
        assert_eq!(settings.scan.ports, "80,139,440-445");
        assert_eq!(settings.scan.timeout_ms, 1000);
        assert_eq!(settings.scan.max_concurrency, 10);
        assert_eq!(settings.lookup_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_lookup_timeout_is_clamped() {
        let mut settings = AppSettings::default();
        settings.lookup_timeout_ms = 0;
        assert_eq!(settings.lookup_timeout(), Duration::from_millis(50));
        settings.lookup_timeout_ms = 60_000;
        assert_eq!(settings.lookup_timeout(), Duration::from_millis(500));
        settings.lookup_timeout_ms = 200;
        assert_eq!(settings.lookup_timeout(), Duration::from_millis(200));
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = AppSettings::default();
        settings.scan.ports = "22,443".to_string();
        settings.scan.max_concurrency = 64;
        settings.default_output_format = "json".to_string();
        settings.save_to(&path).unwrap();

        assert_eq!(AppSettings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"scan": {"ports": "8080"}}"#).unwrap();

        let settings = AppSettings::load_from(&path).unwrap();
        assert_eq!(settings.scan.ports, "8080");
        assert_eq!(settings.scan.timeout_ms, 1000);
        assert_eq!(settings.default_output_format, "plain");
    }

    #[test]
    fn test_invalid_file_reports_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            AppSettings::load_from(&path),
            Err(ConfigError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_missing_file_reports_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(matches!(
            AppSettings::load_from(&path),
            Err(ConfigError::ReadFailed { .. })
        ));
    }
}
