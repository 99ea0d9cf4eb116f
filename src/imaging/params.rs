//! Parameter types for image operations.
//!
//! These structs describe *what* to produce, not *how*. They sit between
//! [`operations`](super::operations), which decides which variants a
//! `{% resI %}` call needs, and the [`backend`](super::backend), which does the
//! pixel work. Tests swap in a recording backend without touching the
//! planning logic.

use std::fmt;
use std::path::PathBuf;

/// Quality setting for lossy encoding (1-100). Clamped on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Output encodings, in the order `<source>` elements are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    WebP,
    Jpeg,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 2] = [OutputFormat::WebP, OutputFormat::Jpeg];

    pub fn extension(self) -> &'static str {
        match self {
            Self::WebP => "webp",
            Self::Jpeg => "jpeg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::WebP => "image/webp",
            Self::Jpeg => "image/jpeg",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Resize `source` to exactly `width`×`height` and encode as `format`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub quality: Quality,
}
