//! Progress-callback trait for per-page inversion events.
//!
//! Inject an [`Arc<dyn InversionProgressCallback>`] via
//! [`crate::config::InversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline renders, inverts and embeds each page.
//!
//! # Example
//!
//! ```rust
//! use pdf_invert::{InversionProgressCallback, InversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl InversionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} inverted", page_num, total_pages);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = InversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn InversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each page.
///
/// Pages are processed strictly in order on a single thread, but the
/// callback itself may be shared between concurrent pipeline runs (the HTTP
/// server clones one config into every request), hence `Send + Sync`. All
/// methods have no-op defaults so callers only override what they care about.
pub trait InversionProgressCallback: Send + Sync {
    /// Called once after the document is opened, before any page is rendered.
    ///
    /// # Arguments
    /// * `total_pages` — number of pages that will be processed
    /// * `dpi`         — effective rendering DPI (after any large-input fallback)
    fn on_conversion_start(&self, total_pages: usize, dpi: u32) {
        let _ = (total_pages, dpi);
    }

    /// Called just before a page is rasterised (1-indexed).
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page has been inverted and embedded in the output.
    fn on_page_complete(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page fails. The run aborts right after this event.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after the output PDF has been serialised.
    ///
    /// # Arguments
    /// * `total_pages`  — pages in the output document
    /// * `output_bytes` — size of the produced PDF
    fn on_conversion_complete(&self, total_pages: usize, output_bytes: usize) {
        let _ = (total_pages, output_bytes);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl InversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::InversionConfig`].
pub type ProgressCallback = Arc<dyn InversionProgressCallback>;
