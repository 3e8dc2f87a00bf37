//! Pipeline stages for PDF colour inversion.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different raster backend) without touching
//! the other stages.
//!
//! ## Data Flow
//!
//! ```text
//! bytes ──▶ render ──▶ invert ──▶ assemble ──▶ bytes
//!  (PDF)    (pdfium)   (pixels)    (lopdf)     (PDF)
//! ```
//!
//! 1. [`render`]   — open the buffer and rasterise each page at `dpi / 72`
//!    scale, lazily and in page order
//! 2. [`invert`]   — apply the selected [`crate::Mode`] transform, producing a
//!    new RGB bitmap
//! 3. [`assemble`] — embed each bitmap as a full-page image sized back to the
//!    page's physical dimensions

pub mod assemble;
pub mod invert;
pub mod render;
