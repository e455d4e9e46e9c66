use image::RgbaImage;
use std::path::{Path, PathBuf};

use crate::logs;

#[path = "platforms/windows.rs"]
#[cfg(windows)]
mod windows;

#[path = "platforms/ico.rs"]
#[cfg(not(windows))]
mod ico;

#[cfg(windows)]
pub use windows::ShellIconProvider as SystemIconProvider;

#[cfg(not(windows))]
pub use ico::IcoFileProvider as SystemIconProvider;

/// Resolution variant requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeClass {
    /// 32 x 32
    #[default]
    Large,
    /// 16 x 16
    Small,
}

impl SizeClass {
    pub fn pixels(self) -> u32 {
        match self {
            SizeClass::Large => 32,
            SizeClass::Small => 16,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("cannot access {}: {source}", path.display())]
    ResourceAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("icon extraction failed for {}: {message}", path.display())]
    Platform { path: PathBuf, message: String },

    #[error("icon index {index} out of range (0..{len})")]
    OutOfBounds { index: usize, len: usize },

    #[error("extractor has been released")]
    Released,
}

/// Source of icon resources for a file.
///
/// `count` is a probe that allocates nothing. `extract` fills one slot per
/// requested index; a slot may come back empty. Every handle returned by
/// `extract` is passed to `destroy` exactly once by the caller.
pub trait IconProvider {
    type Handle;

    fn count(&self, path: &Path) -> Result<usize, ExtractError>;

    fn extract(
        &self,
        path: &Path,
        size: SizeClass,
        slots: usize,
    ) -> Result<Vec<Option<Self::Handle>>, ExtractError>;

    fn to_image(&self, handle: &Self::Handle) -> Result<RgbaImage, ExtractError>;

    fn destroy(&self, handle: Self::Handle);
}

/// An icon copied out of a native handle. Owns its pixels.
#[derive(Debug, Clone)]
pub struct ExtractedIcon {
    image: RgbaImage,
}

impl ExtractedIcon {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn to_rgba_vec(&self) -> Vec<u8> {
        self.image.as_raw().clone()
    }
}

/// Icons extracted eagerly from one file at one size class.
#[derive(Debug)]
pub struct Extractor {
    source: PathBuf,
    size: SizeClass,
    count: usize,
    icons: Vec<ExtractedIcon>,
    released: bool,
}

impl Extractor {
    pub fn new(source: impl AsRef<Path>, size: SizeClass) -> Result<Self, ExtractError> {
        Self::with_provider(&SystemIconProvider::default(), source, size)
    }

    pub fn with_provider<P: IconProvider>(
        provider: &P,
        source: impl AsRef<Path>,
        size: SizeClass,
    ) -> Result<Self, ExtractError> {
        let source = source.as_ref().to_path_buf();
        logs::log_info(&format!(
            "Extracting {:?} icons from {}",
            size,
            source.display()
        ));

        let count = provider.count(&source)?;
        let icons = if count == 0 {
            Vec::new()
        } else {
            collect_icons(provider, &source, size, count)?
        };

        logs::log_info(&format!(
            "{} reports {} icons, {} delivered",
            source.display(),
            count,
            icons.len()
        ));

        Ok(Self {
            source,
            size,
            count,
            icons,
            released: false,
        })
    }

    /// Number of icon resources the provider reported for the source.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of icons actually delivered. Never exceeds `count`.
    pub fn len(&self) -> usize {
        self.icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }

    pub fn icon_source(&self) -> &Path {
        &self.source
    }

    pub fn size_class(&self) -> SizeClass {
        self.size
    }

    pub fn get_all(&self) -> impl ExactSizeIterator<Item = &ExtractedIcon> + Clone + '_ {
        self.icons.iter()
    }

    pub fn item_at(&self, index: usize) -> Result<&ExtractedIcon, ExtractError> {
        if self.released {
            return Err(ExtractError::Released);
        }
        self.icons.get(index).ok_or(ExtractError::OutOfBounds {
            index,
            len: self.icons.len(),
        })
    }

    /// Frees every owned icon. Calling it again is a no-op.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        logs::log_info(&format!(
            "Releasing {} icons from {}",
            self.icons.len(),
            self.source.display()
        ));
        self.icons = Vec::new();
        self.released = true;
    }
}

fn collect_icons<P: IconProvider>(
    provider: &P,
    source: &Path,
    size: SizeClass,
    count: usize,
) -> Result<Vec<ExtractedIcon>, ExtractError> {
    let slots = provider.extract(source, size, count)?;
    let mut icons = Vec::with_capacity(count);

    // Every handle is destroyed here, converted or not.
    for (index, slot) in slots.into_iter().enumerate() {
        let Some(handle) = slot else {
            logs::log_info(&format!("Slot {} of {} is empty", index, source.display()));
            continue;
        };

        match provider.to_image(&handle) {
            Ok(image) => icons.push(ExtractedIcon::new(image)),
            Err(e) => logs::log_error(&format!("Skipping icon {}: {}", index, e)),
        }
        provider.destroy(handle);
    }

    Ok(icons)
}

/// Picks the index of the icon to show as the window icon.
pub fn pick_random_index<R: rand::Rng>(rng: &mut R, len: usize) -> Option<usize> {
    (len > 0).then(|| rng.gen_range(0..len))
}
