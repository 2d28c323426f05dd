use image::RgbaImage;

#[cfg(windows)]
pub mod windows;

#[cfg(windows)]
pub use self::windows::WindowsInspector as NativeInspector;

/// The process that owns the current foreground window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundApp {
    /// Normalized identifier: lower-cased executable file name.
    pub identifier: String,
    pub process_id: u32,
}

/// OS window/process introspection, one implementation per target OS. The
/// monitor core only ever talks to this trait, so tests substitute a fake.
///
/// All calls are synchronous, bounded by the underlying OS API, and return
/// empty values instead of hanging or panicking.
pub trait PlatformInspector: Send + Sync {
    /// Identifier of the process owning the foreground window, or `None`
    /// when there is no foreground window or the process cannot be opened.
    fn foreground_app(&self) -> Option<ForegroundApp>;

    /// Title text of the current foreground window; empty if unavailable.
    fn window_title(&self) -> String;

    /// Fully resolved executable path for `process_id`; empty on permission
    /// failure or an invalid id.
    fn executable_path(&self, process_id: u32) -> String;

    /// Raster snapshot of the foreground window's on-screen bounds, or
    /// `None` when the grab is denied or the window is gone.
    fn capture_window(&self) -> Option<RgbaImage>;

    /// Best-effort icon for the executable. Never fails: falls back to a
    /// category tile, then a fixed-color placeholder.
    fn app_icon(&self, executable_path: &str) -> RgbaImage;

    /// Embedded version resource formatted `major.minor.build.revision`;
    /// empty if the executable carries none.
    fn app_version(&self, executable_path: &str) -> String;
}

/// Development stub for targets without a real inspector yet. Reports no
/// foreground window, so the monitor idles rather than fabricating data.
#[cfg(not(windows))]
pub struct StubInspector;

#[cfg(not(windows))]
impl StubInspector {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(windows))]
impl Default for StubInspector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(windows))]
impl PlatformInspector for StubInspector {
    fn foreground_app(&self) -> Option<ForegroundApp> {
        None
    }

    fn window_title(&self) -> String {
        String::new()
    }

    fn executable_path(&self, _process_id: u32) -> String {
        String::new()
    }

    fn capture_window(&self) -> Option<RgbaImage> {
        None
    }

    fn app_icon(&self, _executable_path: &str) -> RgbaImage {
        placeholder_icon()
    }

    fn app_version(&self, _executable_path: &str) -> String {
        String::new()
    }
}

#[cfg(not(windows))]
pub use self::StubInspector as NativeInspector;

/// Well-known OS shell/service processes. Used to tag `AppInfo`, not to
/// filter captures (the filter has its own, editable seed list).
const SYSTEM_APPS: &[&str] = &[
    "explorer.exe",
    "dwm.exe",
    "taskmgr.exe",
    "svchost.exe",
    "csrss.exe",
    "winlogon.exe",
    "services.exe",
    "lsass.exe",
    "wininit.exe",
    "spoolsv.exe",
    "rundll32.exe",
    "dllhost.exe",
];

pub fn is_system_application(identifier: &str) -> bool {
    let normalized = identifier.to_lowercase();
    SYSTEM_APPS.contains(&normalized.as_str())
}

/// 32x32 solid-color tile, the last rung of the icon fallback chain.
pub fn placeholder_icon() -> RgbaImage {
    solid_icon([70, 130, 220, 255])
}

pub(crate) fn solid_icon(rgba: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(32, 32, image::Rgba(rgba))
}

/// Grab the primary monitor. Used by the manual full-screen capture
/// command; not part of the scheduled pipeline.
pub fn capture_primary_screen() -> Option<RgbaImage> {
    let monitors = xcap::Monitor::all().ok()?;
    let primary = monitors
        .into_iter()
        .find(|monitor| monitor.is_primary().unwrap_or(false))?;
    primary.capture_image().ok()
}
