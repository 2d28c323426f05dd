use chrono::{DateTime, Utc};
use image::RgbaImage;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::platform::{is_system_application, ForegroundApp, PlatformInspector};

use super::cache::AppInfoCache;
use super::config::{ScreenshotConfig, DETECTION_INTERVAL_MS};
use super::events::{
    emit, emit_error, AppChangedPayload, AppInfoPayload, EventSender, MonitorEvent,
    RecordAddedPayload, ScreenshotPayload,
};
use super::filter::AppFilter;
use super::history::{CaptureRecord, RecordHistory};
use super::persistence;

/// Everything the scheduler owns and mutates. Lives behind one mutex so
/// detection ticks, capture ticks and command-side mutations are serialized;
/// readers only ever get clones out.
pub struct MonitorState {
    pub config: ScreenshotConfig,
    pub filter: AppFilter,
    pub cache: AppInfoCache,
    pub history: RecordHistory,
    pub current_app: String,
    pub capture_count: u64,
}

impl MonitorState {
    pub fn new(config: ScreenshotConfig, filter: AppFilter) -> Self {
        Self {
            config,
            filter,
            cache: AppInfoCache::default(),
            history: RecordHistory::default(),
            current_app: String::new(),
            capture_count: 0,
        }
    }
}

/// A pending disk write, handed back by the capture tick so the loop can
/// run it on a blocking worker without holding the state lock.
pub(crate) struct SaveJob {
    pub screenshot: RgbaImage,
    pub identifier: String,
    pub quality: u8,
    pub dir: PathBuf,
    pub timestamp: DateTime<Utc>,
}

/// Detection tick: poll the foreground application and react to a change.
/// Emits `AppInfoUpdated` (when the new identifier is non-empty) followed by
/// `ActiveAppChanged`; no events when the identifier is unchanged.
pub(crate) fn detection_tick(
    state: &mut MonitorState,
    inspector: &dyn PlatformInspector,
    events: &EventSender,
    now: DateTime<Utc>,
) {
    let detected = inspector.foreground_app();
    let new_app = detected
        .as_ref()
        .map(|app| app.identifier.clone())
        .unwrap_or_default();

    if new_app == state.current_app {
        return;
    }

    if let Some(app) = &detected {
        refresh_app_info(state, app, inspector, events, now);
    }

    let old_app = std::mem::replace(&mut state.current_app, new_app.clone());
    debug!("active application changed from {old_app:?} to {new_app:?}");
    emit(
        events,
        MonitorEvent::ActiveAppChanged(AppChangedPayload {
            old: old_app,
            new: new_app,
        }),
    );
}

/// Full metadata refresh for a newly foregrounded application: title, path,
/// version, icon, system flag. Upserted into the cache, then announced.
fn refresh_app_info(
    state: &mut MonitorState,
    app: &ForegroundApp,
    inspector: &dyn PlatformInspector,
    events: &EventSender,
    now: DateTime<Utc>,
) {
    let window_title = inspector.window_title();
    let executable_path = inspector.executable_path(app.process_id);
    let version = inspector.app_version(&executable_path);
    let icon = inspector.app_icon(&executable_path);
    let is_system_app = is_system_application(&app.identifier);
    let process_id = app.process_id;

    state.cache.upsert_with(&app.identifier, now, |info| {
        info.window_title = window_title;
        info.executable_path = executable_path;
        info.process_id = process_id;
        info.is_system_app = is_system_app;
        info.version = version;
        info.icon = Some(icon);
    });

    if let Some(info) = state.cache.get(&app.identifier) {
        emit(
            events,
            MonitorEvent::AppInfoUpdated(AppInfoPayload::from(&info)),
        );
    }
}

/// Capture tick: screenshot the active application unless there is none or
/// the filter excludes it. On success the cache, history and counter are
/// updated and `ScreenshotCaptured` + `RecordAdded` go out; a failed grab
/// emits `ErrorOccurred` and produces no record.
pub(crate) fn capture_tick(
    state: &mut MonitorState,
    inspector: &dyn PlatformInspector,
    events: &EventSender,
    now: DateTime<Utc>,
) -> Option<SaveJob> {
    if state.current_app.is_empty() || state.filter.is_excluded(&state.current_app) {
        return None;
    }
    let identifier = state.current_app.clone();

    let Some(screenshot) = inspector.capture_window() else {
        emit_error(
            events,
            format!("failed to capture screenshot of {identifier}"),
        );
        return None;
    };

    state
        .cache
        .record_screenshot(&identifier, screenshot.clone(), now);

    let (executable_path, window_title) = state
        .cache
        .get(&identifier)
        .map(|info| (info.executable_path, info.window_title))
        .unwrap_or_default();

    let record = CaptureRecord {
        identifier: identifier.clone(),
        timestamp: now,
        screenshot: screenshot.clone(),
        executable_path,
        window_title: window_title.clone(),
    };
    state.history.append(record);

    let save_job = state.config.auto_save.then(|| SaveJob {
        screenshot: screenshot.clone(),
        identifier: identifier.clone(),
        quality: state.config.image_quality,
        dir: state.config.save_path.clone(),
        timestamp: now,
    });

    if let Some(evicted) = state
        .cache
        .evict_if_over_capacity(state.config.max_cache_entries)
    {
        debug!("evicted cache entry for {evicted}");
    }

    state.capture_count += 1;

    emit(
        events,
        MonitorEvent::ScreenshotCaptured(ScreenshotPayload {
            identifier: identifier.clone(),
            width: screenshot.width(),
            height: screenshot.height(),
        }),
    );
    emit(
        events,
        MonitorEvent::RecordAdded(RecordAddedPayload {
            identifier,
            timestamp: now,
            window_title,
        }),
    );

    save_job
}

/// The scheduler task: both periodic timers multiplexed onto one loop, so
/// ticks never overlap each other or command-side mutations. The capture
/// period is re-armed in place when the config watch fires; the detection
/// period is fixed. Cancellation lets an in-flight tick finish and then
/// stops everything.
pub(crate) async fn monitor_loop(
    state: Arc<Mutex<MonitorState>>,
    inspector: Arc<dyn PlatformInspector>,
    events: EventSender,
    cancel_token: CancellationToken,
    mut capture_interval_rx: watch::Receiver<u64>,
) {
    let detection_period = Duration::from_millis(DETECTION_INTERVAL_MS);
    let mut detection = interval_at(Instant::now() + detection_period, detection_period);
    detection.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let capture_period = Duration::from_millis(*capture_interval_rx.borrow_and_update());
    let mut capture = interval_at(Instant::now() + capture_period, capture_period);
    capture.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("monitoring started");

    loop {
        tokio::select! {
            _ = detection.tick() => {
                let mut state = state.lock().await;
                detection_tick(&mut state, inspector.as_ref(), &events, Utc::now());
            }
            _ = capture.tick() => {
                let job = {
                    let mut state = state.lock().await;
                    capture_tick(&mut state, inspector.as_ref(), &events, Utc::now())
                };
                if let Some(job) = job {
                    spawn_save(job, events.clone());
                }
            }
            changed = capture_interval_rx.changed() => {
                match changed {
                    Ok(()) => {
                        let period =
                            Duration::from_millis(*capture_interval_rx.borrow_and_update());
                        capture = interval_at(Instant::now() + period, period);
                        capture.set_missed_tick_behavior(MissedTickBehavior::Delay);
                        debug!("capture interval re-armed to {}ms", period.as_millis());
                    }
                    // Sender gone means the controller is gone.
                    Err(_) => break,
                }
            }
            _ = cancel_token.cancelled() => {
                info!("monitoring stopped");
                break;
            }
        }
    }
}

/// Disk writes run on the blocking pool; each is independent and a failure
/// only produces an error event.
fn spawn_save(job: SaveJob, events: EventSender) {
    tokio::task::spawn_blocking(move || {
        if let Err(err) = persistence::save_screenshot(
            &job.screenshot,
            &job.identifier,
            job.quality,
            &job.dir,
            job.timestamp,
        ) {
            warn!("screenshot save failed: {err:#}");
            emit_error(&events, format!("failed to save screenshot: {err}"));
        }
    });
}
