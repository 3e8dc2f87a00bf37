//! # pdf-invert
//!
//! True pixel-level colour inversion of PDF documents.
//!
//! ## Why rasterise?
//!
//! Overlay tricks (blend modes, viewer dark themes) leave embedded images,
//! scanned pages and hard-coded colours untouched. This crate instead
//! renders every page to a bitmap, inverts the pixels themselves, and
//! rebuilds a PDF from the results. What comes out looks exactly as
//! inverted on every viewer and printer, at the cost of selectable text.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. DPI      requested DPI, or 200 when the input exceeds 10 MiB
//!  ├─ 2. Render   rasterise each page via pdfium at dpi/72 scale
//!  ├─ 3. Invert   reading / printing / presentation pixel transform
//!  └─ 4. Assemble one full-page image per page, original physical size
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_invert::{invert_file, InversionConfig, Mode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = InversionConfig::builder()
//!         .mode(Mode::Presentation)
//!         .build()?;
//!     let stats = invert_file("slides.pdf", "slides_dark.pdf", &config).await?;
//!     eprintln!("{} pages at {} DPI", stats.page_count, stats.effective_dpi);
//!     Ok(())
//! }
//! ```
//!
//! ## Modes
//!
//! | Mode | Use | Effect |
//! |------|-----|--------|
//! | `reading` | screens | plain negative, `255 - v` |
//! | `printing` | paper | grey-based negative, never darker than 77 |
//! | `presentation` | projectors | negative with extreme lights dimmed and darks lifted |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`    | on | Enables the `pdfinvert` binary (clap + anyhow + indicatif) |
//! | `server` | on | Enables [`server`] and the `pdfinvert-server` binary (axum + tower-http) |
//!
//! Disable both when using only the library:
//! ```toml
//! pdf-invert = { version = "0.1", default-features = false }
//! ```
//!
//! ## Runtime requirement
//!
//! Rendering needs the pdfium shared library at runtime. See
//! [`pipeline::render::bind_pdfium`] for where it is looked up.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DpiFallback, ImageEncoding, InversionConfig, InversionConfigBuilder, Mode};
pub use convert::{invert_file, invert_file_sync, process, process_async};
pub use error::{ErrorKind, InvertError};
pub use output::{InversionOutput, InversionStats};
pub use pipeline::assemble::{assemble, PdfAssembler};
pub use pipeline::invert::{invert, invert_pixel, invert_rgb};
pub use pipeline::render::{RenderedDocument, Renderer};
pub use progress::{InversionProgressCallback, NoopProgressCallback, ProgressCallback};
