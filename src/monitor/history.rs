use chrono::{DateTime, Utc};
use image::RgbaImage;
use serde::Serialize;
use std::collections::VecDeque;

/// History keeps the most recent 100 captures.
pub const MAX_RECORDS: usize = 100;

/// One accepted capture. Immutable once appended.
#[derive(Debug, Clone)]
pub struct CaptureRecord {
    pub identifier: String,
    pub timestamp: DateTime<Utc>,
    pub screenshot: RgbaImage,
    pub executable_path: String,
    pub window_title: String,
}

/// The serializable face of a record: everything but the pixels. Used for
/// the record-list command and JSON export.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSummary {
    pub identifier: String,
    pub timestamp: DateTime<Utc>,
    pub executable_path: String,
    pub window_title: String,
}

impl From<&CaptureRecord> for RecordSummary {
    fn from(record: &CaptureRecord) -> Self {
        Self {
            identifier: record.identifier.clone(),
            timestamp: record.timestamp,
            executable_path: record.executable_path.clone(),
            window_title: record.window_title.clone(),
        }
    }
}

/// Chronological, append-only capture log bounded to [`MAX_RECORDS`]
/// entries. The oldest entry is dropped silently once the bound is hit.
#[derive(Debug)]
pub struct RecordHistory {
    records: VecDeque<CaptureRecord>,
    capacity: usize,
}

impl Default for RecordHistory {
    fn default() -> Self {
        Self::with_capacity(MAX_RECORDS)
    }
}

impl RecordHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append to the tail; drops exactly one head entry when already full.
    pub fn append(&mut self, record: CaptureRecord) {
        if self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// All records, oldest first.
    pub fn all(&self) -> Vec<CaptureRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn summaries(&self) -> Vec<RecordSummary> {
        self.records.iter().map(RecordSummary::from).collect()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(n: u32) -> CaptureRecord {
        CaptureRecord {
            identifier: format!("app{n}.exe"),
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
                + chrono::Duration::seconds(n as i64),
            screenshot: RgbaImage::new(1, 1),
            executable_path: format!("C:\\apps\\app{n}.exe"),
            window_title: format!("window {n}"),
        }
    }

    #[test]
    fn append_keeps_chronological_order() {
        let mut history = RecordHistory::default();
        for n in 0..5 {
            history.append(record(n));
        }

        let identifiers: Vec<String> =
            history.all().into_iter().map(|r| r.identifier).collect();
        assert_eq!(
            identifiers,
            vec!["app0.exe", "app1.exe", "app2.exe", "app3.exe", "app4.exe"]
        );
    }

    #[test]
    fn overflow_drops_exactly_the_oldest() {
        let mut history = RecordHistory::default();
        for n in 0..(MAX_RECORDS as u32 + 1) {
            history.append(record(n));
        }

        assert_eq!(history.len(), MAX_RECORDS);
        let all = history.all();
        assert_eq!(all.first().unwrap().identifier, "app1.exe");
        assert_eq!(
            all.last().unwrap().identifier,
            format!("app{}.exe", MAX_RECORDS)
        );
        // relative order of the survivors is untouched
        for pair in all.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }

    #[test]
    fn clear_empties_the_log() {
        let mut history = RecordHistory::default();
        history.append(record(0));
        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn summaries_skip_pixels_but_keep_metadata() {
        let mut history = RecordHistory::default();
        history.append(record(7));

        let summaries = history.summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].identifier, "app7.exe");
        assert_eq!(summaries[0].window_title, "window 7");

        let json = serde_json::to_string(&summaries).unwrap();
        assert!(json.contains("executablePath"));
    }
}
