use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::monitor::ScreenshotConfig;

/// Everything the settings surface persists: the capture configuration and
/// the user's exclusion list. The monitor never reads this file itself; the
/// command layer loads it at startup and writes it back on every change.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorSettings {
    pub config: ScreenshotConfig,
    pub excluded_apps: Vec<String>,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<MonitorSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            MonitorSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn monitor(&self) -> MonitorSettings {
        self.data.read().unwrap().clone()
    }

    pub fn update_config(&self, config: ScreenshotConfig) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        guard.config = config;
        self.persist(&guard)
    }

    pub fn update_excluded_apps(&self, excluded: Vec<String>) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        guard.excluded_apps = excluded;
        self.persist(&guard)
    }

    fn persist(&self, data: &MonitorSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();

        let settings = store.monitor();
        assert_eq!(settings.config, ScreenshotConfig::default());
        assert!(settings.excluded_apps.is_empty());
    }

    #[test]
    fn settings_survive_a_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).unwrap();
        store
            .update_config(ScreenshotConfig {
                capture_interval_ms: 12_000,
                auto_save: true,
                ..Default::default()
            })
            .unwrap();
        store
            .update_excluded_apps(vec!["game.exe".into()])
            .unwrap();

        let reloaded = SettingsStore::new(path).unwrap().monitor();
        assert_eq!(reloaded.config.capture_interval_ms, 12_000);
        assert!(reloaded.config.auto_save);
        assert_eq!(reloaded.excluded_apps, vec!["game.exe"]);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.monitor().config, ScreenshotConfig::default());
    }
}
