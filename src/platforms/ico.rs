use crate::extractor::{ExtractError, IconProvider, SizeClass};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, RgbaImage};
use rs_apply::Apply;
use std::io::ErrorKind;
use std::path::Path;

/// Reads standalone `.ico` files, which hold a single addressable icon here.
/// Anything that does not decode as an ICO container reports zero icons.
#[derive(Debug, Default)]
pub struct IcoFileProvider;

impl IconProvider for IcoFileProvider {
    type Handle = DynamicImage;

    fn count(&self, path: &Path) -> Result<usize, ExtractError> {
        Ok(usize::from(decode_ico(path)?.is_some()))
    }

    fn extract(
        &self,
        path: &Path,
        size: SizeClass,
        slots: usize,
    ) -> Result<Vec<Option<DynamicImage>>, ExtractError> {
        let side = size.pixels();
        decode_ico(path)?
            .map(|image| image.resize_exact(side, side, FilterType::Lanczos3))
            .into_iter()
            .map(Some)
            .chain(std::iter::repeat_with(|| None))
            .take(slots)
            .collect::<Vec<_>>()
            .apply(Ok)
    }

    fn to_image(&self, handle: &DynamicImage) -> Result<RgbaImage, ExtractError> {
        Ok(handle.to_rgba8())
    }

    fn destroy(&self, handle: DynamicImage) {
        drop(handle);
    }
}

fn decode_ico(path: &Path) -> Result<Option<DynamicImage>, ExtractError> {
    // Directories and other non-files are not icon containers.
    match std::fs::metadata(path) {
        Ok(meta) if !meta.is_file() => return Ok(None),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        _ => {}
    }

    let reader = match ImageReader::open(path) {
        Ok(reader) => reader,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ExtractError::ResourceAccess {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let reader = reader
        .with_guessed_format()
        .map_err(|source| ExtractError::ResourceAccess {
            path: path.to_path_buf(),
            source,
        })?;

    if reader.format() != Some(ImageFormat::Ico) {
        return Ok(None);
    }

    Ok(reader.decode().ok())
}
