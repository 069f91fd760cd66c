//! Progress-callback trait for per-file extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the batch processes each image. Callers can forward them to a
//! terminal progress bar, a channel or a log without the library knowing
//! how the host application communicates.
//!
//! # Example
//!
//! ```rust
//! use edgequake_license2table::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FailureCounter(AtomicUsize);
//!
//! impl ExtractionProgressCallback for FailureCounter {
//!     fn on_file_error(&self, _index: usize, file_name: &str, _total: usize, error: &str) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{file_name}: {error}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .api_key("sk-test")
//!     .progress_callback(Arc::new(FailureCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the extraction pipeline as it processes each file.
///
/// Files are processed concurrently, so the per-file methods may be called
/// from several tasks at once and out of enumeration order. `index` is the
/// file's 0-based position in the enumeration. All methods default to no-ops.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once after enumeration, before any file is read.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called just before a file is read and sent to the model.
    fn on_file_start(&self, index: usize, file_name: &str, total_files: usize) {
        let _ = (index, file_name, total_files);
    }

    /// Called when a file produced a record.
    fn on_file_complete(&self, index: usize, file_name: &str, total_files: usize) {
        let _ = (index, file_name, total_files);
    }

    /// Called when a file failed at any stage.
    fn on_file_error(&self, index: usize, file_name: &str, total_files: usize, error: &str) {
        let _ = (index, file_name, total_files, error);
    }

    /// Called once after every file has either finished or hit the deadline.
    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// A no-op implementation, the default when no callback is configured.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
