use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Create the save directory (and any missing parents). Called once per
/// configuration change; safe to call again.
pub fn ensure_save_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create screenshot directory {}", dir.display()))
}

/// Encode `screenshot` as JPEG at `quality` and write it to
/// `{identifier}_{yyyyMMdd_HHmmss}.jpg` under `dir`. Returns the written
/// path. Failures are the caller's to report; a failed write never takes
/// the monitor down.
pub fn save_screenshot(
    screenshot: &RgbaImage,
    identifier: &str,
    quality: u8,
    dir: &Path,
    timestamp: DateTime<Utc>,
) -> Result<PathBuf> {
    let file_name = format!("{}_{}.jpg", identifier, timestamp.format("%Y%m%d_%H%M%S"));
    let path = dir.join(file_name);

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgba8(screenshot.clone()).to_rgb8();

    let file = File::create(&path)
        .with_context(|| format!("failed to create screenshot file {}", path.display()))?;
    JpegEncoder::new_with_quality(BufWriter::new(file), quality)
        .encode_image(&rgb)
        .with_context(|| format!("failed to encode screenshot {}", path.display()))?;

    Ok(path)
}
