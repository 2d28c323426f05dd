mod monitor;
mod platform;
mod settings;

use std::sync::Arc;

use log::warn;
use monitor::commands::{
    add_app_filter, capture_screen_now, capture_window_now, clear_app_records, export_records,
    get_app_filters, get_app_records, get_config, get_current_app_icon, get_current_app_info,
    get_monitor_status, remove_app_filter, set_config, start_monitoring, stop_monitoring,
};
use monitor::events::{self, EventReceiver};
use monitor::{MonitorController, MonitorEvent};
use platform::NativeInspector;
use settings::SettingsStore;
use tauri::{AppHandle, Emitter, Manager};

pub(crate) struct AppState {
    pub(crate) monitor: MonitorController,
    pub(crate) settings: SettingsStore,
}

/// Re-emit core notifications as frontend events. The channel keeps the
/// monitor free of any UI toolkit knowledge; this task is the only consumer
/// in production.
fn spawn_event_forwarder(app_handle: AppHandle, mut events: EventReceiver) {
    tauri::async_runtime::spawn(async move {
        while let Some(event) = events.recv().await {
            let result = match event {
                MonitorEvent::ActiveAppChanged(payload) => {
                    app_handle.emit("active-app-changed", payload)
                }
                MonitorEvent::AppInfoUpdated(payload) => {
                    app_handle.emit("app-info-updated", payload)
                }
                MonitorEvent::ScreenshotCaptured(payload) => {
                    app_handle.emit("screenshot-captured", payload)
                }
                MonitorEvent::RecordAdded(payload) => app_handle.emit("record-added", payload),
                MonitorEvent::RecordsCleared => app_handle.emit("records-cleared", ()),
                MonitorEvent::ErrorOccurred(payload) => {
                    app_handle.emit("monitor-error", payload)
                }
            };

            if let Err(err) = result {
                warn!("failed to forward monitor event: {err}");
            }
        }
    });
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("glimpse starting up...");

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let result = (|| -> anyhow::Result<()> {
                let app_data_dir = app
                    .path()
                    .app_data_dir()
                    .map_err(|err| anyhow::anyhow!(err))?;
                std::fs::create_dir_all(&app_data_dir)?;

                let settings_path = app_data_dir.join("settings.json");
                let settings_store = SettingsStore::new(settings_path)?;
                let initial = settings_store.monitor();

                let (event_tx, event_rx) = events::channel();
                spawn_event_forwarder(app.handle().clone(), event_rx);

                let monitor = MonitorController::new(
                    Arc::new(NativeInspector::new()),
                    event_tx,
                    initial.config,
                    &initial.excluded_apps,
                );

                app.manage(AppState {
                    monitor,
                    settings: settings_store,
                });

                Ok(())
            })();

            result.map_err(|err| err.into())
        })
        .invoke_handler(tauri::generate_handler![
            start_monitoring,
            stop_monitoring,
            get_monitor_status,
            get_config,
            set_config,
            add_app_filter,
            remove_app_filter,
            get_app_filters,
            get_app_records,
            clear_app_records,
            export_records,
            get_current_app_info,
            get_current_app_icon,
            capture_window_now,
            capture_screen_now,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
