use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::session::{MIN_DISTANCE_METERS, MIN_FIXES};

pub const SETTINGS_ENV: &str = "RECORDER_SETTINGS";
pub const DEBUG_ENV: &str = "RECORDER_DEBUG";
pub const TICK_ENV: &str = "RECORDER_TICK_MS";

const DEFAULT_SETTINGS_FILE: &str = "recorder-settings.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderSettings {
    pub tick_interval_ms: u64,
    pub min_fixes: usize,
    pub min_distance_meters: f64,
    pub debug: bool,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            min_fixes: MIN_FIXES,
            min_distance_meters: MIN_DISTANCE_METERS,
            debug: false,
        }
    }
}

impl RecorderSettings {
    /// Reads settings from `path`. A missing file yields defaults; a file
    /// that exists but doesn't parse is reported and replaced by defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        Ok(serde_json::from_str(&contents).unwrap_or_else(|err| {
            warn!("Ignoring malformed settings in {}: {err}", path.display());
            Self::default()
        }))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }

    /// Applies `RECORDER_DEBUG` and `RECORDER_TICK_MS` on top of the file.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(DEBUG_ENV).ok().as_deref(),
            std::env::var(TICK_ENV).ok().as_deref(),
        )
    }

    fn with_overrides(mut self, debug: Option<&str>, tick_ms: Option<&str>) -> Self {
        if let Some(value) = debug {
            self.debug = value == "1" || value.eq_ignore_ascii_case("true");
        }
        if let Some(value) = tick_ms {
            match value.parse::<u64>() {
                Ok(ms) if ms > 0 => self.tick_interval_ms = ms,
                _ => warn!("Ignoring invalid {TICK_ENV}={value}"),
            }
        }
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

/// Settings file location: `$RECORDER_SETTINGS`, else the working directory.
pub fn settings_path() -> PathBuf {
    std::env::var_os(SETTINGS_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = RecorderSettings::load(dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, RecorderSettings::default());
        assert_eq!(settings.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = RecorderSettings {
            min_distance_meters: 25.0,
            debug: true,
            ..Default::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(RecorderSettings::load(&path).unwrap(), settings);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "minFixes": 5 }"#).unwrap();

        let settings = RecorderSettings::load(&path).unwrap();
        assert_eq!(settings.min_fixes, 5);
        assert_eq!(settings.tick_interval_ms, 1_000);
    }

    #[test]
    fn malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(RecorderSettings::load(&path).unwrap(), RecorderSettings::default());
    }

    #[test]
    fn overrides() {
        let settings = RecorderSettings::default().with_overrides(Some("TRUE"), Some("250"));
        assert!(settings.debug);
        assert_eq!(settings.tick_interval(), Duration::from_millis(250));

        let settings = RecorderSettings::default().with_overrides(Some("0"), Some("zero"));
        assert!(!settings.debug);
        assert_eq!(settings.tick_interval_ms, 1_000);
    }
}
