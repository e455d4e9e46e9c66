use image::ImageFormat;
use std::error::Error;
use std::path::{Path, PathBuf};

use crate::extractor::ExtractedIcon;
use crate::logs;

const BASE_NAME: &str = "icon";

/// Where saved icons go: the desktop, then home, then the working directory.
pub fn default_save_dir() -> PathBuf {
    dirs::desktop_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// First free name in `dir`: `icon.bmp`, then `icon(0).bmp`, `icon(1).bmp`, ...
pub fn unique_bitmap_path(dir: &Path) -> PathBuf {
    std::iter::once(format!("{}.bmp", BASE_NAME))
        .chain((0..).map(|i| format!("{}({}).bmp", BASE_NAME, i)))
        .map(|name| dir.join(name))
        .find(|path| !path.exists())
        .unwrap_or_else(|| dir.join(format!("{}.bmp", BASE_NAME)))
}

pub fn save_bitmap(icon: &ExtractedIcon, dir: &Path) -> Result<PathBuf, Box<dyn Error>> {
    let path = unique_bitmap_path(dir);
    icon.image().save_with_format(&path, ImageFormat::Bmp)?;
    logs::log_info(&format!("Saved icon to {}", path.display()));
    Ok(path)
}
