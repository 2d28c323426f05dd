use chrono::{DateTime, Utc};
use image::RgbaImage;
use std::collections::HashMap;

/// Last-known metadata and screenshot for one application. Owned by the
/// cache; everything handed out is a clone.
#[derive(Debug, Clone)]
pub struct AppInfo {
    pub identifier: String,
    pub window_title: String,
    pub executable_path: String,
    pub process_id: u32,
    pub is_system_app: bool,
    pub version: String,
    pub icon: Option<RgbaImage>,
    pub last_screenshot: Option<RgbaImage>,
    pub last_capture_time: DateTime<Utc>,
}

impl AppInfo {
    fn new(identifier: &str, now: DateTime<Utc>) -> Self {
        Self {
            identifier: identifier.to_string(),
            window_title: String::new(),
            executable_path: String::new(),
            process_id: 0,
            is_system_app: false,
            version: String::new(),
            icon: None,
            last_screenshot: None,
            last_capture_time: now,
        }
    }
}

/// Bounded key-value store of per-application info with
/// least-recently-captured eviction.
#[derive(Debug, Default)]
pub struct AppInfoCache {
    entries: HashMap<String, AppInfo>,
}

impl AppInfoCache {
    /// Insert or update the entry for `identifier`, creating a blank one if
    /// this is the first observation. `last_capture_time` is stamped with
    /// `now` on every call. An existing screenshot survives a metadata-only
    /// update.
    pub fn upsert_with<F>(&mut self, identifier: &str, now: DateTime<Utc>, update: F)
    where
        F: FnOnce(&mut AppInfo),
    {
        let info = self
            .entries
            .entry(identifier.to_string())
            .or_insert_with(|| AppInfo::new(identifier, now));
        update(info);
        info.last_capture_time = now;
    }

    /// Stash a fresh screenshot for `identifier`, creating a bare entry when
    /// the detection tick has not populated metadata yet.
    pub fn record_screenshot(&mut self, identifier: &str, screenshot: RgbaImage, now: DateTime<Utc>) {
        self.upsert_with(identifier, now, |info| {
            info.last_screenshot = Some(screenshot);
        });
    }

    pub fn get(&self, identifier: &str) -> Option<AppInfo> {
        self.entries.get(identifier).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop the single entry with the oldest `last_capture_time` when the
    /// cache has grown past `max_entries`. Ties go to the lexicographically
    /// smallest identifier so eviction is deterministic. Returns the evicted
    /// identifier, if any.
    pub fn evict_if_over_capacity(&mut self, max_entries: usize) -> Option<String> {
        if self.entries.len() <= max_entries {
            return None;
        }

        let oldest = self
            .entries
            .values()
            .min_by(|a, b| {
                a.last_capture_time
                    .cmp(&b.last_capture_time)
                    .then_with(|| a.identifier.cmp(&b.identifier))
            })
            .map(|info| info.identifier.clone())?;

        self.entries.remove(&oldest);
        Some(oldest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, secs).unwrap()
    }

    #[test]
    fn upsert_creates_then_updates_in_place() {
        let mut cache = AppInfoCache::default();
        assert!(cache.is_empty());
        cache.upsert_with("a.exe", at(0), |info| {
            info.window_title = "First".into();
        });
        cache.upsert_with("a.exe", at(1), |info| {
            info.window_title = "Second".into();
        });

        assert_eq!(cache.len(), 1);
        let info = cache.get("a.exe").unwrap();
        assert_eq!(info.window_title, "Second");
        assert_eq!(info.last_capture_time, at(1));
    }

    #[test]
    fn metadata_refresh_preserves_screenshot() {
        let mut cache = AppInfoCache::default();
        cache.record_screenshot("a.exe", RgbaImage::new(4, 4), at(0));
        cache.upsert_with("a.exe", at(1), |info| {
            info.window_title = "Title".into();
        });

        let info = cache.get("a.exe").unwrap();
        assert!(info.last_screenshot.is_some());
        assert_eq!(info.window_title, "Title");
    }

    #[test]
    fn eviction_removes_exactly_the_oldest_entry() {
        let mut cache = AppInfoCache::default();
        cache.upsert_with("a.exe", at(0), |_| {});
        cache.upsert_with("b.exe", at(1), |_| {});
        cache.upsert_with("c.exe", at(2), |_| {});

        let evicted = cache.evict_if_over_capacity(2);
        assert_eq!(evicted.as_deref(), Some("a.exe"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a.exe").is_none());
        assert!(cache.get("b.exe").is_some());
        assert!(cache.get("c.exe").is_some());
    }

    #[test]
    fn eviction_is_a_no_op_at_or_under_capacity() {
        let mut cache = AppInfoCache::default();
        cache.upsert_with("a.exe", at(0), |_| {});
        cache.upsert_with("b.exe", at(1), |_| {});

        assert_eq!(cache.evict_if_over_capacity(2), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn eviction_tie_breaks_on_identifier() {
        let mut cache = AppInfoCache::default();
        cache.upsert_with("b.exe", at(0), |_| {});
        cache.upsert_with("a.exe", at(0), |_| {});
        cache.upsert_with("c.exe", at(1), |_| {});

        assert_eq!(cache.evict_if_over_capacity(2).as_deref(), Some("a.exe"));
    }

    #[test]
    fn refreshed_entry_is_not_the_eviction_victim() {
        let mut cache = AppInfoCache::default();
        cache.upsert_with("a.exe", at(0), |_| {});
        cache.upsert_with("b.exe", at(1), |_| {});
        // a.exe captured again, so b.exe is now the oldest
        cache.record_screenshot("a.exe", RgbaImage::new(2, 2), at(2));
        cache.upsert_with("c.exe", at(3), |_| {});

        assert_eq!(cache.evict_if_over_capacity(2).as_deref(), Some("b.exe"));
    }
}
