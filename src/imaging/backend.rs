//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait covers the two operations responsive images
//! need: identify (read dimensions) and resize (scale and encode one
//! variant). The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend); tests use the recording
//! [`MockBackend`](tests::MockBackend).

use super::params::ResizeParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `Sync` so one backend can be shared by pages rendering in parallel.
pub trait ImageBackend: Sync {
    /// Get image dimensions without decoding pixels where possible.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Resize to the exact target size and write the encoded result.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::params::{OutputFormat, Quality};
    use std::sync::Mutex;

    /// Mock backend that records operations without executing them.
    /// Uses Mutex (not RefCell) so it is Sync.
    #[derive(Default)]
    pub struct MockBackend {
        pub identify_results: Mutex<Vec<Dimensions>>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        Resize {
            source: String,
            output: String,
            width: u32,
            height: u32,
            format: OutputFormat,
            quality: u32,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_dimensions(dims: Vec<Dimensions>) -> Self {
            Self {
                identify_results: Mutex::new(dims),
                operations: Mutex::new(Vec::new()),
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn resize_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Resize { .. }))
                .count()
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));

            self.identify_results
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| BackendError::ProcessingFailed("No mock dimensions".to_string()))
        }

        fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Resize {
                source: params.source.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
                width: params.width,
                height: params.height,
                format: params.format,
                quality: params.quality.value(),
            });
            // Stand in for the encoder so cache lookups see a real file.
            if let Some(parent) = params.output.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(
                &params.output,
                format!("{}x{}.{}", params.width, params.height, params.format),
            )?;
            Ok(())
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::with_dimensions(vec![Dimensions {
            width: 800,
            height: 600,
        }]);

        let result = backend.identify(Path::new("/test/image.jpg")).unwrap();
        assert_eq!(result.width, 800);
        assert_eq!(result.height, 600);

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p == "/test/image.jpg"));
    }

    #[test]
    fn mock_identify_without_results_errors() {
        let backend = MockBackend::new();
        assert!(backend.identify(Path::new("/x.jpg")).is_err());
    }

    #[test]
    fn mock_records_resize() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = MockBackend::new();
        let output = tmp.path().join("images/out-800.webp");

        backend
            .resize(&ResizeParams {
                source: "/source.jpg".into(),
                output: output.clone(),
                width: 800,
                height: 600,
                format: OutputFormat::WebP,
                quality: Quality::new(90),
            })
            .unwrap();

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(
            &ops[0],
            RecordedOp::Resize {
                width: 800,
                height: 600,
                format: OutputFormat::WebP,
                quality: 90,
                ..
            }
        ));
        assert!(output.exists());
    }
}
