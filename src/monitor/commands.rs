use std::io::Cursor;
use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, ImageFormat, RgbaImage};
use tauri::State;

use crate::platform;
use crate::AppState;

use super::events::AppInfoPayload;
use super::{MonitorController, MonitorStatus, RecordSummary, ScreenshotConfig};

fn controller_from_state(state: &State<'_, AppState>) -> MonitorController {
    state.monitor.clone()
}

/// PNG data URL, the shape the indicator/tray surface renders directly.
fn png_data_url(image: &RgbaImage) -> Result<String, String> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| e.to_string())?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(bytes)))
}

#[tauri::command]
pub async fn start_monitoring(state: State<'_, AppState>) -> Result<(), String> {
    let controller = controller_from_state(&state);
    controller.start().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn stop_monitoring(state: State<'_, AppState>) -> Result<(), String> {
    let controller = controller_from_state(&state);
    controller.stop().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_monitor_status(state: State<'_, AppState>) -> Result<MonitorStatus, String> {
    let controller = controller_from_state(&state);
    Ok(controller.status().await)
}

#[tauri::command]
pub async fn get_config(state: State<'_, AppState>) -> Result<ScreenshotConfig, String> {
    let controller = controller_from_state(&state);
    Ok(controller.config().await)
}

#[tauri::command]
pub async fn set_config(
    state: State<'_, AppState>,
    config: ScreenshotConfig,
) -> Result<ScreenshotConfig, String> {
    let controller = controller_from_state(&state);
    controller.set_config(config).await;

    // persist the sanitized form, not the raw input
    let applied = controller.config().await;
    state
        .settings
        .update_config(applied.clone())
        .map_err(|e| e.to_string())?;
    Ok(applied)
}

#[tauri::command]
pub async fn add_app_filter(
    state: State<'_, AppState>,
    app_name: String,
    exclude: Option<bool>,
) -> Result<Vec<String>, String> {
    let controller = controller_from_state(&state);
    controller
        .set_excluded(&app_name, exclude.unwrap_or(true))
        .await;

    let excluded = controller.excluded_apps().await;
    state
        .settings
        .update_excluded_apps(excluded.clone())
        .map_err(|e| e.to_string())?;
    Ok(excluded)
}

#[tauri::command]
pub async fn remove_app_filter(
    state: State<'_, AppState>,
    app_name: String,
) -> Result<Vec<String>, String> {
    let controller = controller_from_state(&state);
    controller.remove_filter(&app_name).await;

    let excluded = controller.excluded_apps().await;
    state
        .settings
        .update_excluded_apps(excluded.clone())
        .map_err(|e| e.to_string())?;
    Ok(excluded)
}

#[tauri::command]
pub async fn get_app_filters(state: State<'_, AppState>) -> Result<Vec<String>, String> {
    let controller = controller_from_state(&state);
    Ok(controller.excluded_apps().await)
}

#[tauri::command]
pub async fn get_app_records(state: State<'_, AppState>) -> Result<Vec<RecordSummary>, String> {
    let controller = controller_from_state(&state);
    Ok(controller.records().await)
}

#[tauri::command]
pub async fn clear_app_records(state: State<'_, AppState>) -> Result<(), String> {
    let controller = controller_from_state(&state);
    controller.clear_records().await;
    Ok(())
}

#[tauri::command]
pub async fn export_records(
    state: State<'_, AppState>,
    path: String,
) -> Result<usize, String> {
    let controller = controller_from_state(&state);
    controller
        .export_records(&PathBuf::from(path))
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_current_app_info(
    state: State<'_, AppState>,
) -> Result<Option<AppInfoPayload>, String> {
    let controller = controller_from_state(&state);
    Ok(controller
        .current_app_info()
        .await
        .as_ref()
        .map(AppInfoPayload::from))
}

#[tauri::command]
pub async fn get_current_app_icon(state: State<'_, AppState>) -> Result<Option<String>, String> {
    let controller = controller_from_state(&state);
    match controller.current_app_info().await.and_then(|info| info.icon) {
        Some(icon) => png_data_url(&icon).map(Some),
        None => Ok(None),
    }
}

#[tauri::command]
pub async fn capture_window_now(state: State<'_, AppState>) -> Result<String, String> {
    let controller = controller_from_state(&state);
    let image = controller.capture_window_now().map_err(|e| e.to_string())?;
    png_data_url(&image)
}

#[tauri::command]
pub fn capture_screen_now() -> Result<String, String> {
    let image = platform::capture_primary_screen()
        .ok_or_else(|| "failed to capture the primary screen".to_string())?;
    png_data_url(&image)
}
