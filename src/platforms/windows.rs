use crate::extractor::{ExtractError, IconProvider, SizeClass};
use image::RgbaImage;
use rs_apply::Apply;
use std::ffi::c_void;
use std::mem::size_of;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{
    BI_RGB, BITMAP, BITMAPINFO, BITMAPINFOHEADER, CreateCompatibleDC, CreateDIBSection,
    DIB_RGB_COLORS, DeleteDC, DeleteObject, GetDC, GetObjectW, ReleaseDC, SelectObject,
};
use windows::Win32::UI::Shell::ExtractIconExW;
use windows::Win32::UI::WindowsAndMessaging::{
    DI_NORMAL, DestroyIcon, DrawIconEx, GetIconInfo, HICON, ICONINFO,
};
use windows::core::PCWSTR;

/// Icons read through `ExtractIconExW` from executables, DLLs and `.ico` files.
#[derive(Debug, Default)]
pub struct ShellIconProvider;

impl IconProvider for ShellIconProvider {
    type Handle = HICON;

    fn count(&self, path: &Path) -> Result<usize, ExtractError> {
        if !check_readable(path)? {
            return Ok(0);
        }

        let wide = wide_path(path);
        // nIconIndex -1 with no output buffers asks for the total only.
        let total = unsafe { ExtractIconExW(PCWSTR(wide.as_ptr()), -1, None, None, 0) };
        match total {
            u32::MAX => Err(platform_error(path, "icon count query failed")),
            n => (n as usize).apply(Ok),
        }
    }

    fn extract(
        &self,
        path: &Path,
        size: SizeClass,
        slots: usize,
    ) -> Result<Vec<Option<HICON>>, ExtractError> {
        let wide = wide_path(path);
        let mut handles = vec![HICON::default(); slots];

        // Only the buffer for the requested size class is passed.
        let (large, small) = match size {
            SizeClass::Large => (Some(handles.as_mut_ptr()), None),
            SizeClass::Small => (None, Some(handles.as_mut_ptr())),
        };
        let placed =
            unsafe { ExtractIconExW(PCWSTR(wide.as_ptr()), 0, large, small, slots as u32) };
        if placed == u32::MAX {
            return Err(platform_error(path, "icon extraction failed"));
        }

        handles
            .into_iter()
            .map(|handle| (!handle.is_invalid()).then_some(handle))
            .collect::<Vec<_>>()
            .apply(Ok)
    }

    fn to_image(&self, handle: &HICON) -> Result<RgbaImage, ExtractError> {
        unsafe { hicon_to_rgba(*handle) }
    }

    fn destroy(&self, handle: HICON) {
        let _ = unsafe { DestroyIcon(handle) };
    }
}

/// `Ok(false)` when there is no regular file at `path`; other open failures
/// surface as access errors instead of collapsing into an empty result.
fn check_readable(path: &Path) -> Result<bool, ExtractError> {
    match std::fs::metadata(path) {
        Ok(meta) if !meta.is_file() => return Ok(false),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        _ => {}
    }

    match std::fs::File::open(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(ExtractError::ResourceAccess {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn wide_path(path: &Path) -> Vec<u16> {
    path.as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

fn platform_error(path: &Path, what: &str) -> ExtractError {
    ExtractError::Platform {
        path: path.to_path_buf(),
        message: format!("{}: {}", what, std::io::Error::last_os_error()),
    }
}

unsafe fn hicon_to_rgba(icon: HICON) -> Result<RgbaImage, ExtractError> {
    let mut info = ICONINFO::default();
    unsafe { GetIconInfo(icon, &mut info) }.map_err(|e| conversion_error(e.to_string()))?;

    let mut bitmap = BITMAP::default();
    // Monochrome icons have no colour bitmap; the mask holds both halves.
    let (source, halve) = if info.hbmColor.is_invalid() {
        (info.hbmMask, true)
    } else {
        (info.hbmColor, false)
    };
    unsafe {
        GetObjectW(
            source.into(),
            size_of::<BITMAP>() as i32,
            Some(&mut bitmap as *mut _ as *mut c_void),
        )
    };

    let width = bitmap.bmWidth;
    let height = if halve {
        bitmap.bmHeight / 2
    } else {
        bitmap.bmHeight
    };

    let result = if width <= 0 || height <= 0 {
        Err(conversion_error(format!("bad icon size {}x{}", width, height)))
    } else {
        unsafe { render_icon(icon, width, height) }
    };

    unsafe {
        if !info.hbmColor.is_invalid() {
            let _ = DeleteObject(info.hbmColor.into());
        }
        let _ = DeleteObject(info.hbmMask.into());
    }

    result
}

unsafe fn render_icon(icon: HICON, width: i32, height: i32) -> Result<RgbaImage, ExtractError> {
    let hdc = unsafe { GetDC(Some(HWND::default())) };
    let mem_dc = unsafe { CreateCompatibleDC(Some(hdc)) };

    let bmi = BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: width,
            biHeight: -height, // top-down
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        },
        ..Default::default()
    };

    let mut bits: *mut c_void = std::ptr::null_mut();
    let dib = match unsafe {
        CreateDIBSection(Some(mem_dc), &bmi, DIB_RGB_COLORS, &mut bits, None, 0)
    } {
        Ok(dib) => dib,
        Err(e) => {
            unsafe {
                let _ = DeleteDC(mem_dc);
                ReleaseDC(Some(HWND::default()), hdc);
            }
            return Err(conversion_error(e.to_string()));
        }
    };

    let pixel_count = (width * height) as usize;
    let old_bitmap = unsafe { SelectObject(mem_dc, dib.into()) };

    let mut pixels = vec![0u8; pixel_count * 4];
    let drawn = if bits.is_null() {
        Err(conversion_error("no DIB bits".to_string()))
    } else {
        unsafe {
            std::ptr::write_bytes(bits as *mut u8, 0, pixels.len());
            DrawIconEx(mem_dc, 0, 0, icon, width, height, 0, None, DI_NORMAL)
                .map_err(|e| conversion_error(e.to_string()))
                .map(|_| {
                    std::ptr::copy_nonoverlapping(
                        bits as *const u8,
                        pixels.as_mut_ptr(),
                        pixels.len(),
                    )
                })
        }
    };

    unsafe {
        let _ = SelectObject(mem_dc, old_bitmap);
        let _ = DeleteObject(dib.into());
        let _ = DeleteDC(mem_dc);
        ReleaseDC(Some(HWND::default()), hdc);
    }

    drawn?;
    bgra_to_rgba(&mut pixels);

    RgbaImage::from_raw(width as u32, height as u32, pixels)
        .ok_or_else(|| conversion_error("pixel buffer size mismatch".to_string()))
}

/// Swaps channels in place. Legacy icons without an alpha channel come back
/// fully transparent, so those are made opaque.
fn bgra_to_rgba(pixels: &mut [u8]) {
    let no_alpha = pixels.chunks_exact(4).all(|px| px[3] == 0);
    for px in pixels.chunks_exact_mut(4) {
        px.swap(0, 2);
        if no_alpha {
            px[3] = 255;
        }
    }
}

fn conversion_error(message: String) -> ExtractError {
    ExtractError::Platform {
        path: "<icon handle>".into(),
        message,
    }
}
