use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use super::cache::AppInfo;

/// Notifications the monitor core emits. The Tauri layer drains the channel
/// and re-emits each variant as a frontend event; tests attach their own
/// receiver. Payloads are serializable and never carry pixel buffers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MonitorEvent {
    ActiveAppChanged(AppChangedPayload),
    AppInfoUpdated(AppInfoPayload),
    ScreenshotCaptured(ScreenshotPayload),
    RecordAdded(RecordAddedPayload),
    RecordsCleared,
    ErrorOccurred(ErrorPayload),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppChangedPayload {
    pub old: String,
    pub new: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfoPayload {
    pub identifier: String,
    pub window_title: String,
    pub executable_path: String,
    pub process_id: u32,
    pub is_system_app: bool,
    pub version: String,
    pub last_capture_time: DateTime<Utc>,
}

impl From<&AppInfo> for AppInfoPayload {
    fn from(info: &AppInfo) -> Self {
        Self {
            identifier: info.identifier.clone(),
            window_title: info.window_title.clone(),
            executable_path: info.executable_path.clone(),
            process_id: info.process_id,
            is_system_app: info.is_system_app,
            version: info.version.clone(),
            last_capture_time: info.last_capture_time,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotPayload {
    pub identifier: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordAddedPayload {
    pub identifier: String,
    pub timestamp: DateTime<Utc>,
    pub window_title: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub message: String,
}

pub type EventSender = mpsc::UnboundedSender<MonitorEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<MonitorEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Send, ignoring a closed channel. The monitor must keep ticking even if
/// nobody is listening anymore.
pub fn emit(events: &EventSender, event: MonitorEvent) {
    let _ = events.send(event);
}

pub fn emit_error(events: &EventSender, message: impl Into<String>) {
    emit(
        events,
        MonitorEvent::ErrorOccurred(ErrorPayload {
            message: message.into(),
        }),
    );
}
