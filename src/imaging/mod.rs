//! Responsive image generation.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Resize → WebP** | Lanczos3 + lossless WebP encoder |
//! | **Resize → JPEG** | Lanczos3 + JPEG encoder at the configured quality |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations, cache and backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{VariantSize, calculate_variant_sizes, parse_widths};
pub use operations::{GeneratedVariant, ResponsiveConfig, create_responsive_images, get_dimensions};
pub use params::{OutputFormat, Quality, ResizeParams};
pub use rust_backend::{RustBackend, SUPPORTED_INPUT_EXTENSIONS};
