//! High-level image operations.
//!
//! These functions combine calculations with backend execution and the
//! encode cache. They take configuration, compute parameters, and call the
//! backend only for variants the cache cannot supply.

use super::backend::{BackendError, ImageBackend};
use super::calculations::{VariantSize, calculate_variant_sizes};
use super::params::{OutputFormat, Quality, ResizeParams};
use crate::cache::{EncodeCache, Lookup, hash_file, hash_variant_params};
use crate::naming::temp_sibling;
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, path: &Path) -> Result<(u32, u32)> {
    let dims = backend.identify(path)?;
    Ok((dims.width, dims.height))
}

/// One encoded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedVariant {
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    /// Path relative to the output directory, e.g. `images/cat-320.webp`.
    pub path: String,
}

impl GeneratedVariant {
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Configuration for responsive image generation.
#[derive(Debug, Clone)]
pub struct ResponsiveConfig {
    /// Subdirectory of the output directory the variants are written to.
    pub subdir: String,
    pub widths: Vec<u32>,
    pub quality: Quality,
}

/// Create WebP and JPEG variants of `source` at each applicable width.
///
/// Variants come back grouped by format in [`OutputFormat::ALL`] order, each
/// group ascending by width. Widths wider than the source are skipped with a
/// warning; if none fit, the source width is used.
pub fn create_responsive_images(
    backend: &impl ImageBackend,
    cache: &EncodeCache,
    source: &Path,
    filename_stem: &str,
    original_dims: (u32, u32),
    config: &ResponsiveConfig,
) -> Result<Vec<GeneratedVariant>> {
    let skipped: Vec<u32> = config
        .widths
        .iter()
        .copied()
        .filter(|&w| w > original_dims.0)
        .collect();
    if !skipped.is_empty() {
        tracing::warn!(
            "{}: skipping widths {:?} wider than the {}px source",
            source.display(),
            skipped,
            original_dims.0
        );
    }

    let sizes = calculate_variant_sizes(original_dims, &config.widths);
    let source_hash = hash_file(source)?;
    let mut variants = Vec::with_capacity(sizes.len() * OutputFormat::ALL.len());

    for format in OutputFormat::ALL {
        for &VariantSize { width, height } in &sizes {
            let path = format!(
                "{}/{}-{}.{}",
                config.subdir,
                filename_stem,
                width,
                format.extension()
            );
            let params_hash = hash_variant_params(format, width, config.quality);
            let output = cache.output_dir().join(&path);

            match cache.lookup(&source_hash, &params_hash, &path) {
                Lookup::Fresh => {}
                Lookup::Relocated(previous) => {
                    copy_into_place(&cache.output_dir().join(previous), &output)?;
                }
                Lookup::Miss => {
                    backend.resize(&ResizeParams {
                        source: source.to_path_buf(),
                        output,
                        width,
                        height,
                        format,
                        quality: config.quality,
                    })?;
                }
            }
            cache.insert(&path, &source_hash, &params_hash);

            variants.push(GeneratedVariant {
                format,
                width,
                height,
                path,
            });
        }
    }

    Ok(variants)
}

fn copy_into_place(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = temp_sibling(to);
    std::fs::copy(from, &tmp)?;
    std::fs::rename(&tmp, to)?;
    Ok(())
}
