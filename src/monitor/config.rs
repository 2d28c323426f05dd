use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Detection poll period. Fixed; only the capture period is configurable.
pub const DETECTION_INTERVAL_MS: u64 = 1000;

const MIN_CAPTURE_INTERVAL_MS: u64 = 100;

/// Snapshot of everything the monitor needs to know about capturing.
/// Applied atomically; the running loop picks up a new snapshot on its next
/// tick without restarting the detection timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScreenshotConfig {
    /// Capture timer period in milliseconds.
    pub capture_interval_ms: u64,
    /// Write every accepted screenshot to disk.
    pub auto_save: bool,
    /// Directory screenshots are saved under.
    pub save_path: PathBuf,
    /// JPEG quality, 1-100.
    pub image_quality: u8,
    /// Upper bound on per-app cache entries.
    pub max_cache_entries: usize,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            capture_interval_ms: 5000,
            auto_save: false,
            save_path: PathBuf::from("./screenshots"),
            image_quality: 85,
            max_cache_entries: 100,
        }
    }
}

impl ScreenshotConfig {
    /// Clamp out-of-range values instead of rejecting them. The settings
    /// surface may hand us anything a user managed to type.
    pub fn sanitized(mut self) -> Self {
        self.capture_interval_ms = self.capture_interval_ms.max(MIN_CAPTURE_INTERVAL_MS);
        self.image_quality = self.image_quality.clamp(1, 100);
        self.max_cache_entries = self.max_cache_entries.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ScreenshotConfig::default();
        assert_eq!(config.capture_interval_ms, 5000);
        assert!(!config.auto_save);
        assert_eq!(config.image_quality, 85);
        assert_eq!(config.max_cache_entries, 100);
        assert_eq!(config, config.clone().sanitized());
    }

    #[test]
    fn sanitize_clamps_extremes() {
        let config = ScreenshotConfig {
            capture_interval_ms: 0,
            image_quality: 0,
            max_cache_entries: 0,
            ..Default::default()
        }
        .sanitized();

        assert_eq!(config.capture_interval_ms, MIN_CAPTURE_INTERVAL_MS);
        assert_eq!(config.image_quality, 1);
        assert_eq!(config.max_cache_entries, 1);

        let config = ScreenshotConfig {
            image_quality: 200,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(config.image_quality, 100);
    }

    #[test]
    fn camel_case_round_trip() {
        let json = r#"{"captureIntervalMs":10000,"autoSave":true,"savePath":"/tmp/shots","imageQuality":70,"maxCacheEntries":5}"#;
        let config: ScreenshotConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.capture_interval_ms, 10000);
        assert!(config.auto_save);
        assert_eq!(config.max_cache_entries, 5);

        let back = serde_json::to_string(&config).unwrap();
        assert!(back.contains("captureIntervalMs"));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: ScreenshotConfig = serde_json::from_str(r#"{"autoSave":true}"#).unwrap();
        assert!(config.auto_save);
        assert_eq!(config.capture_interval_ms, 5000);
    }
}
