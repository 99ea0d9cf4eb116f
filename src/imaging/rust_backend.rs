//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP) | `image` crate, format guessed from content |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` with quality |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless) |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{OutputFormat, ResizeParams};
use crate::naming::temp_sibling;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Source extensions whose decoders are compiled in.
pub const SUPPORTED_INPUT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Backend using the `image` crate ecosystem.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

/// Encode `img` into `path`.
///
/// The bytes go to a sibling temp file first and are renamed into place, so
/// a concurrent reader never sees a half-written variant.
fn save_image(
    img: &DynamicImage,
    path: &Path,
    format: OutputFormat,
    quality: u32,
) -> Result<(), BackendError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = temp_sibling(path);
    {
        let file = std::fs::File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        let encoded = match format {
            OutputFormat::Jpeg => {
                let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
                rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, quality as u8))
            }
            OutputFormat::WebP => {
                let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
                rgba.write_with_encoder(WebPEncoder::new_lossless(&mut writer))
            }
        };
        let flushed = encoded
            .map_err(|e| BackendError::ProcessingFailed(format!("{} encode failed: {}", format, e)))
            .and_then(|()| writer.flush().map_err(BackendError::Io));
        if let Err(e) = flushed {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!(
                "Failed to read dimensions of {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Dimensions { width, height })
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let resized = img.resize_exact(params.width, params.height, FilterType::Lanczos3);
        save_image(
            &resized,
            &params.output,
            params.format,
            params.quality.value(),
        )
    }
}
