//! Win32 implementation of [`PlatformInspector`].
//!
//! Process and window queries go through the `windows` crate; the raster
//! grab goes through `xcap` so DPI-scaled and layered windows come out
//! right. Every acquired handle is released on every path, including the
//! failure branches.

use std::ffi::{c_void, OsStr, OsString};
use std::iter::once;
use std::os::windows::ffi::{OsStrExt, OsStringExt};
use std::path::Path;

use image::RgbaImage;
use log::debug;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{CloseHandle, MAX_PATH};
use windows::Win32::Graphics::Gdi::{
    CreateCompatibleDC, DeleteDC, DeleteObject, GetDIBits, GetObjectW, SelectObject, BITMAP,
    BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS,
};
use windows::Win32::Storage::FileSystem::{
    GetFileVersionInfoSizeW, GetFileVersionInfoW, VerQueryValueW, FILE_FLAGS_AND_ATTRIBUTES,
    VS_FIXEDFILEINFO,
};
use windows::Win32::System::ProcessStatus::GetModuleFileNameExW;
use windows::Win32::System::Threading::{
    OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
};
use windows::Win32::UI::Shell::{SHGetFileInfoW, SHFILEINFOW, SHGFI_ICON, SHGFI_LARGEICON};
use windows::Win32::UI::WindowsAndMessaging::{
    DestroyIcon, GetForegroundWindow, GetIconInfo, GetWindowTextLengthW, GetWindowTextW,
    GetWindowThreadProcessId, ICONINFO,
};

use super::{placeholder_icon, solid_icon, ForegroundApp, PlatformInspector};

pub struct WindowsInspector;

impl WindowsInspector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WindowsInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformInspector for WindowsInspector {
    fn foreground_app(&self) -> Option<ForegroundApp> {
        let process_id = foreground_process_id()?;
        let path = executable_path_for(process_id);
        let identifier = identifier_from_path(&path)?;
        Some(ForegroundApp {
            identifier,
            process_id,
        })
    }

    fn window_title(&self) -> String {
        unsafe {
            let hwnd = GetForegroundWindow();
            if hwnd.0.is_null() {
                return String::new();
            }

            let length = GetWindowTextLengthW(hwnd);
            if length <= 0 {
                return String::new();
            }

            let mut buffer = vec![0u16; length as usize + 1];
            let written = GetWindowTextW(hwnd, &mut buffer);
            if written <= 0 {
                return String::new();
            }
            String::from_utf16_lossy(&buffer[..written as usize])
        }
    }

    fn executable_path(&self, process_id: u32) -> String {
        executable_path_for(process_id)
    }

    fn capture_window(&self) -> Option<RgbaImage> {
        let app = self.foreground_app()?;
        let windows = xcap::Window::all().ok()?;
        let target = windows.into_iter().find(|window| {
            if window.is_minimized().unwrap_or(true) {
                return false;
            }
            window.is_focused().unwrap_or(false)
                || window.pid().map(|pid| pid == app.process_id).unwrap_or(false)
        })?;
        target.capture_image().ok()
    }

    fn app_icon(&self, executable_path: &str) -> RgbaImage {
        // Ordered fallback chain; the first strategy that yields pixels
        // wins, and the placeholder means this can never fail.
        let strategies: &[fn(&str) -> Option<RgbaImage>] = &[shell_icon, category_icon];
        for strategy in strategies {
            if let Some(icon) = strategy(executable_path) {
                return icon;
            }
        }
        placeholder_icon()
    }

    fn app_version(&self, executable_path: &str) -> String {
        if executable_path.is_empty() {
            return String::new();
        }
        version_from_path(executable_path).unwrap_or_default()
    }
}

fn foreground_process_id() -> Option<u32> {
    unsafe {
        let hwnd = GetForegroundWindow();
        if hwnd.0.is_null() {
            return None;
        }

        let mut process_id: u32 = 0;
        GetWindowThreadProcessId(hwnd, Some(&mut process_id));
        (process_id != 0).then_some(process_id)
    }
}

fn executable_path_for(process_id: u32) -> String {
    if process_id == 0 {
        return String::new();
    }

    unsafe {
        let handle = match OpenProcess(
            PROCESS_QUERY_INFORMATION | PROCESS_VM_READ,
            false,
            process_id,
        ) {
            Ok(handle) => handle,
            Err(err) => {
                debug!("OpenProcess({process_id}) failed: {err}");
                return String::new();
            }
        };

        let mut buffer = [0u16; MAX_PATH as usize];
        let length = GetModuleFileNameExW(handle, None, &mut buffer);
        let _ = CloseHandle(handle);

        if length == 0 {
            return String::new();
        }
        OsString::from_wide(&buffer[..length as usize])
            .to_string_lossy()
            .into_owned()
    }
}

/// Lower-cased executable file name, the identifier everything else keys on.
fn identifier_from_path(path: &str) -> Option<String> {
    let name = Path::new(path).file_name()?.to_string_lossy().to_lowercase();
    (!name.is_empty()).then_some(name)
}

fn wide(value: &str) -> Vec<u16> {
    OsStr::new(value).encode_wide().chain(once(0)).collect()
}

/// Tier 1: the icon the shell binds to the executable.
fn shell_icon(executable_path: &str) -> Option<RgbaImage> {
    if executable_path.is_empty() {
        return None;
    }

    let path = wide(executable_path);
    unsafe {
        let mut info = SHFILEINFOW::default();
        let result = SHGetFileInfoW(
            PCWSTR(path.as_ptr()),
            FILE_FLAGS_AND_ATTRIBUTES(0),
            Some(&mut info),
            std::mem::size_of::<SHFILEINFOW>() as u32,
            SHGFI_ICON | SHGFI_LARGEICON,
        );

        if result == 0 || info.hIcon.is_invalid() {
            return None;
        }

        let image = icon_to_image(info.hIcon);
        let _ = DestroyIcon(info.hIcon);
        image
    }
}

/// Convert an HICON's color bitmap into an RGBA image via a 32bpp top-down
/// DIB. GDI hands back BGRA, so the red/blue channels get swapped in place.
unsafe fn icon_to_image(hicon: windows::Win32::UI::WindowsAndMessaging::HICON) -> Option<RgbaImage> {
    let mut icon_info = ICONINFO::default();
    if GetIconInfo(hicon, &mut icon_info).is_err() {
        return None;
    }

    let mut bitmap = BITMAP::default();
    let queried = GetObjectW(
        icon_info.hbmColor,
        std::mem::size_of::<BITMAP>() as i32,
        Some(&mut bitmap as *mut BITMAP as *mut c_void),
    ) != 0;

    let mut image = None;
    if queried && bitmap.bmWidth > 0 && bitmap.bmHeight > 0 {
        let width = bitmap.bmWidth;
        let height = bitmap.bmHeight;

        let hdc = CreateCompatibleDC(None);
        if !hdc.is_invalid() {
            let previous = SelectObject(hdc, icon_info.hbmColor);

            let mut info = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: width,
                    // negative height = top-down rows
                    biHeight: -height,
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };

            let mut pixels = vec![0u8; (width * height * 4) as usize];
            let copied = GetDIBits(
                hdc,
                icon_info.hbmColor,
                0,
                height as u32,
                Some(pixels.as_mut_ptr() as *mut c_void),
                &mut info,
                DIB_RGB_COLORS,
            );

            if copied != 0 {
                for pixel in pixels.chunks_exact_mut(4) {
                    pixel.swap(0, 2);
                }
                image = RgbaImage::from_raw(width as u32, height as u32, pixels);
            }

            SelectObject(hdc, previous);
            let _ = DeleteDC(hdc);
        }
    }

    let _ = DeleteObject(icon_info.hbmColor);
    let _ = DeleteObject(icon_info.hbmMask);
    image
}

/// Tier 2: a fixed tile per file category, keyed off the extension.
fn category_icon(executable_path: &str) -> Option<RgbaImage> {
    let extension = Path::new(executable_path)
        .extension()?
        .to_string_lossy()
        .to_lowercase();

    match extension.as_str() {
        "exe" => Some(solid_icon([80, 150, 90, 255])),
        "lnk" => Some(solid_icon([200, 160, 60, 255])),
        "dll" => Some(solid_icon([130, 130, 140, 255])),
        _ => None,
    }
}

fn version_from_path(executable_path: &str) -> Option<String> {
    let path = wide(executable_path);
    unsafe {
        let size = GetFileVersionInfoSizeW(PCWSTR(path.as_ptr()), None);
        if size == 0 {
            return None;
        }

        let mut buffer = vec![0u8; size as usize];
        GetFileVersionInfoW(
            PCWSTR(path.as_ptr()),
            0,
            size,
            buffer.as_mut_ptr() as *mut c_void,
        )
        .ok()?;

        let mut value: *mut c_void = std::ptr::null_mut();
        let mut length: u32 = 0;
        let root = wide("\\");
        if !VerQueryValueW(
            buffer.as_ptr() as *const c_void,
            PCWSTR(root.as_ptr()),
            &mut value,
            &mut length,
        )
        .as_bool()
            || length == 0
            || value.is_null()
        {
            return None;
        }

        let info = &*(value as *const VS_FIXEDFILEINFO);
        let major = (info.dwFileVersionMS >> 16) & 0xFFFF;
        let minor = info.dwFileVersionMS & 0xFFFF;
        let build = (info.dwFileVersionLS >> 16) & 0xFFFF;
        let revision = info.dwFileVersionLS & 0xFFFF;

        Some(format!("{major}.{minor}.{build}.{revision}"))
    }
}
