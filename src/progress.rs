//! Progress-callback trait for per-section analysis and output events.
//!
//! Inject an [`Arc<dyn SplitProgressCallback>`] via
//! [`crate::config::SplitConfigBuilder::progress_callback`] to receive events
//! as the analyzer synthesizes metadata for each section and as the
//! materializer writes each file.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdfsplit::{SplitConfig, SplitProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     written: AtomicUsize,
//! }
//!
//! impl SplitProgressCallback for CountingCallback {
//!     fn on_file_written(&self, index: usize, total: usize, filename: &str) {
//!         self.written.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("[{index}/{total}] {filename}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { written: AtomicUsize::new(0) });
//! let config = SplitConfig::builder()
//!     .progress_callback(counter as Arc<dyn SplitProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the analyzer and materializer as they work through sections.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Section indices are 1-indexed.
pub trait SplitProgressCallback: Send + Sync {
    /// Called once the boundary plan is settled, before any metadata call.
    fn on_analysis_start(&self, page_count: usize, section_count: usize) {
        let _ = (page_count, section_count);
    }

    /// Called just before metadata synthesis for a section.
    fn on_section_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when a section received AI-generated metadata.
    fn on_section_complete(&self, index: usize, total: usize, title: &str) {
        let _ = (index, total, title);
    }

    /// Called when a section fell back to placeholder metadata.
    fn on_section_fallback(&self, index: usize, total: usize, reason: &str) {
        let _ = (index, total, reason);
    }

    /// Called once after every section has metadata.
    ///
    /// * `generated`: sections with AI metadata
    fn on_analysis_complete(&self, total: usize, generated: usize) {
        let _ = (total, generated);
    }

    /// Called after each section PDF lands in the output directory.
    fn on_file_written(&self, index: usize, total: usize, filename: &str) {
        let _ = (index, total, filename);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl SplitProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::SplitConfig`].
pub type ProgressCallback = Arc<dyn SplitProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        fallbacks: Mutex<Vec<String>>,
        generated: AtomicUsize,
    }

    impl SplitProgressCallback for TrackingCallback {
        fn on_section_start(&self, _index: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_section_complete(&self, _index: usize, _total: usize, _title: &str) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_section_fallback(&self, _index: usize, _total: usize, reason: &str) {
            self.fallbacks.lock().unwrap().push(reason.to_string());
        }

        fn on_analysis_complete(&self, _total: usize, generated: usize) {
            self.generated.store(generated, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_analysis_start(12, 3);
        cb.on_section_start(1, 3);
        cb.on_section_complete(1, 3, "Giriş");
        cb.on_section_fallback(2, 3, "insufficient content");
        cb.on_analysis_complete(3, 1);
        cb.on_file_written(1, 3, "giris_01_1-4.pdf");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_section_start(1, 2);
        tracker.on_section_complete(1, 2, "Title");
        tracker.on_section_start(2, 2);
        tracker.on_section_fallback(2, 2, "AI call timed out");
        tracker.on_analysis_complete(2, 1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(
            tracker.fallbacks.lock().unwrap().as_slice(),
            ["AI call timed out".to_string()]
        );
        assert_eq!(tracker.generated.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_analysis_start(10, 1);
        cb.on_file_written(1, 1, "doc_01_1-10.pdf");
    }
}
