use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::platform::PlatformInspector;

use super::cache::AppInfo;
use super::config::ScreenshotConfig;
use super::events::{emit, emit_error, EventSender, MonitorEvent};
use super::filter::AppFilter;
use super::history::RecordSummary;
use super::loop_worker::{monitor_loop, MonitorState};

/// Snapshot for the tray/indicator surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    pub monitoring: bool,
    pub capture_count: u64,
    pub current_app: String,
}

struct Worker {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Owns the monitor state machine: `Stopped` (no worker) or `Monitoring`
/// (one running loop task). Cloneable; every clone talks to the same state.
#[derive(Clone)]
pub struct MonitorController {
    state: Arc<Mutex<MonitorState>>,
    inspector: Arc<dyn PlatformInspector>,
    events: EventSender,
    worker: Arc<Mutex<Option<Worker>>>,
    capture_interval_tx: Arc<watch::Sender<u64>>,
}

impl MonitorController {
    /// Build a stopped controller. The save directory is prepared here (and
    /// again on every config change); if that fails an error event goes out
    /// and monitoring still works, with auto-save writes failing per-shot.
    pub fn new(
        inspector: Arc<dyn PlatformInspector>,
        events: EventSender,
        config: ScreenshotConfig,
        excluded_apps: &[String],
    ) -> Self {
        let config = config.sanitized();
        ensure_save_dir(&config, &events);

        let (capture_interval_tx, _) = watch::channel(config.capture_interval_ms);
        let filter = AppFilter::with_excluded(excluded_apps);

        Self {
            state: Arc::new(Mutex::new(MonitorState::new(config, filter))),
            inspector,
            events,
            worker: Arc::new(Mutex::new(None)),
            capture_interval_tx: Arc::new(capture_interval_tx),
        }
    }

    /// `Stopped -> Monitoring`. No-op when already monitoring.
    pub async fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            info!("start requested while already monitoring; ignoring");
            return Ok(());
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(monitor_loop(
            self.state.clone(),
            self.inspector.clone(),
            self.events.clone(),
            cancel_token.clone(),
            self.capture_interval_tx.subscribe(),
        ));

        *worker = Some(Worker {
            handle,
            cancel_token,
        });
        Ok(())
    }

    /// `Monitoring -> Stopped`. An in-flight tick finishes; nothing fires
    /// afterwards. No-op when already stopped.
    pub async fn stop(&self) -> Result<()> {
        let Some(worker) = self.worker.lock().await.take() else {
            return Ok(());
        };

        worker.cancel_token.cancel();
        worker
            .handle
            .await
            .context("monitor loop task failed to join")
    }

    pub async fn is_monitoring(&self) -> bool {
        self.worker.lock().await.is_some()
    }

    /// Apply a new configuration snapshot. The running capture timer is
    /// re-armed through the watch channel; the detection timer is untouched.
    pub async fn set_config(&self, config: ScreenshotConfig) {
        let config = config.sanitized();
        ensure_save_dir(&config, &self.events);

        {
            let mut state = self.state.lock().await;
            state.config = config.clone();
        }
        let _ = self.capture_interval_tx.send(config.capture_interval_ms);
    }

    pub async fn config(&self) -> ScreenshotConfig {
        self.state.lock().await.config.clone()
    }

    pub async fn set_excluded(&self, identifier: &str, excluded: bool) {
        self.state
            .lock()
            .await
            .filter
            .set_excluded(identifier, excluded);
    }

    pub async fn remove_filter(&self, identifier: &str) {
        self.state.lock().await.filter.remove(identifier);
    }

    pub async fn excluded_apps(&self) -> Vec<String> {
        self.state.lock().await.filter.excluded()
    }

    pub async fn records(&self) -> Vec<RecordSummary> {
        self.state.lock().await.history.summaries()
    }

    pub async fn clear_records(&self) {
        self.state.lock().await.history.clear();
        emit(&self.events, MonitorEvent::RecordsCleared);
    }

    /// Write the record metadata (no pixels) as pretty JSON.
    pub async fn export_records(&self, path: &Path) -> Result<usize> {
        let summaries = self.records().await;
        let result = serde_json::to_string_pretty(&summaries)
            .context("failed to serialize records")
            .and_then(|json| {
                std::fs::write(path, json)
                    .with_context(|| format!("failed to write records to {}", path.display()))
            });

        match result {
            Ok(()) => {
                info!("exported {} records to {}", summaries.len(), path.display());
                Ok(summaries.len())
            }
            Err(err) => {
                warn!("record export failed: {err:#}");
                emit_error(&self.events, format!("failed to export records: {err}"));
                Err(err)
            }
        }
    }

    pub async fn status(&self) -> MonitorStatus {
        let monitoring = self.is_monitoring().await;
        let state = self.state.lock().await;
        MonitorStatus {
            monitoring,
            capture_count: state.capture_count,
            current_app: state.current_app.clone(),
        }
    }

    /// Clone of the cache entry for the currently active application.
    pub async fn current_app_info(&self) -> Option<AppInfo> {
        let state = self.state.lock().await;
        if state.current_app.is_empty() {
            return None;
        }
        state.cache.get(&state.current_app)
    }

    /// Manual one-shot grab of the foreground window; bypasses the timers
    /// and the filter, touches no state.
    pub fn capture_window_now(&self) -> Result<image::RgbaImage> {
        self.inspector
            .capture_window()
            .context("no foreground window could be captured")
    }
}

fn ensure_save_dir(config: &ScreenshotConfig, events: &EventSender) {
    if let Err(err) = super::persistence::ensure_save_dir(&config.save_path) {
        warn!("save directory unavailable: {err:#}");
        emit_error(events, format!("failed to create save directory: {err}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::events::{self, EventReceiver};
    use crate::platform::{placeholder_icon, ForegroundApp};
    use tempfile::tempdir;

    /// Inspector that never sees a foreground window; lifecycle tests only
    /// need the loop to spin, not to capture.
    struct IdleInspector;

    impl PlatformInspector for IdleInspector {
        fn foreground_app(&self) -> Option<ForegroundApp> {
            None
        }
        fn window_title(&self) -> String {
            String::new()
        }
        fn executable_path(&self, _process_id: u32) -> String {
            String::new()
        }
        fn capture_window(&self) -> Option<image::RgbaImage> {
            None
        }
        fn app_icon(&self, _executable_path: &str) -> image::RgbaImage {
            placeholder_icon()
        }
        fn app_version(&self, _executable_path: &str) -> String {
            String::new()
        }
    }

    fn controller_with(config: ScreenshotConfig) -> (MonitorController, EventReceiver) {
        let (tx, rx) = events::channel();
        let controller = MonitorController::new(Arc::new(IdleInspector), tx, config, &[]);
        (controller, rx)
    }

    fn test_config(dir: &Path) -> ScreenshotConfig {
        ScreenshotConfig {
            save_path: dir.join("shots"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let dir = tempdir().unwrap();
        let (controller, _rx) = controller_with(test_config(dir.path()));

        assert!(!controller.is_monitoring().await);
        controller.start().await.unwrap();
        assert!(controller.is_monitoring().await);
        // second start is a no-op, not an error
        controller.start().await.unwrap();
        assert!(controller.is_monitoring().await);

        controller.stop().await.unwrap();
        assert!(!controller.is_monitoring().await);
        // stopping again changes nothing
        controller.stop().await.unwrap();
        assert!(!controller.is_monitoring().await);
    }

    #[tokio::test]
    async fn restart_after_stop_works() {
        let dir = tempdir().unwrap();
        let (controller, _rx) = controller_with(test_config(dir.path()));

        controller.start().await.unwrap();
        controller.stop().await.unwrap();
        controller.start().await.unwrap();
        assert!(controller.is_monitoring().await);
        controller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn set_config_sanitizes_and_rearms_the_capture_timer() {
        let dir = tempdir().unwrap();
        let (controller, _rx) = controller_with(test_config(dir.path()));

        controller
            .set_config(ScreenshotConfig {
                capture_interval_ms: 10_000,
                image_quality: 250,
                save_path: dir.path().join("elsewhere"),
                ..Default::default()
            })
            .await;

        let config = controller.config().await;
        assert_eq!(config.capture_interval_ms, 10_000);
        assert_eq!(config.image_quality, 100);
        assert_eq!(*controller.capture_interval_tx.borrow(), 10_000);
        assert!(dir.path().join("elsewhere").is_dir());
    }

    #[tokio::test]
    async fn filter_edits_round_trip() {
        let dir = tempdir().unwrap();
        let (controller, _rx) = controller_with(test_config(dir.path()));

        controller.set_excluded("game.exe", true).await;
        assert!(controller
            .excluded_apps()
            .await
            .contains(&"game.exe".to_string()));

        controller.remove_filter("game.exe").await;
        assert!(!controller
            .excluded_apps()
            .await
            .contains(&"game.exe".to_string()));
    }

    #[tokio::test]
    async fn clear_records_notifies() {
        let dir = tempdir().unwrap();
        let (controller, mut rx) = controller_with(test_config(dir.path()));

        controller.clear_records().await;
        assert!(matches!(
            rx.try_recv().unwrap(),
            MonitorEvent::RecordsCleared
        ));
    }

    #[tokio::test]
    async fn export_writes_parseable_json() {
        let dir = tempdir().unwrap();
        let (controller, _rx) = controller_with(test_config(dir.path()));

        let target = dir.path().join("records.json");
        let count = controller.export_records(&target).await.unwrap();
        assert_eq!(count, 0);

        let contents = std::fs::read_to_string(&target).unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&contents).unwrap();
        assert!(parsed.is_empty());
    }

    #[tokio::test]
    async fn export_to_unwritable_path_errors_and_notifies() {
        let dir = tempdir().unwrap();
        let (controller, mut rx) = controller_with(test_config(dir.path()));

        let target = dir.path().join("missing-dir").join("records.json");
        assert!(controller.export_records(&target).await.is_err());
        assert!(matches!(
            rx.try_recv().unwrap(),
            MonitorEvent::ErrorOccurred(_)
        ));
    }

    #[tokio::test]
    async fn status_reflects_idle_state() {
        let dir = tempdir().unwrap();
        let (controller, _rx) = controller_with(test_config(dir.path()));

        let status = controller.status().await;
        assert!(!status.monitoring);
        assert_eq!(status.capture_count, 0);
        assert!(status.current_app.is_empty());
        assert!(controller.current_app_info().await.is_none());
    }
}
