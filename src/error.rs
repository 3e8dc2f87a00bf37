//! Error types for the pdf-invert library.
//!
//! Every failure is fatal: the pipeline never returns a partial PDF. The
//! detailed [`InvertError`] variants say exactly what went wrong, while
//! [`ErrorKind`] collapses them onto the three outcomes a transport adapter
//! has to distinguish (bad input, empty input, everything else).

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of an [`InvertError`].
///
/// The CLI and the HTTP adapter only need to know which of these three
/// buckets a failure belongs to in order to pick an exit message or a
/// status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input bytes are not a parseable PDF.
    InvalidDocument,
    /// The PDF parsed but contains zero pages.
    EmptyDocument,
    /// Any other failure during rendering, inversion, assembly or I/O.
    Processing,
}

/// All errors returned by the pdf-invert library.
#[derive(Debug, Error)]
pub enum InvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Reading the input file failed for another reason.
    #[error("Failed to read input file '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The buffer does not carry the `%PDF` signature.
    #[error("Input is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF is corrupt and cannot be opened: {detail}")]
    CorruptPdf { detail: String },

    /// Encrypted PDFs are not supported.
    #[error("PDF is encrypted; remove the password protection before inverting it")]
    PasswordRequired,

    /// The document opened fine but has no pages.
    #[error("No pages found in PDF")]
    EmptyDocument,

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Assembly errors ───────────────────────────────────────────────────
    /// The assembler was asked to produce a PDF from zero bitmaps.
    #[error("No page images to assemble into a PDF")]
    EmptyInput,

    /// A page image could not be compressed for embedding.
    #[error("Failed to encode image for page {page}: {detail}")]
    EncodingFailed { page: usize, detail: String },

    /// Serialising the output document failed.
    #[error("Failed to write output PDF: {0}")]
    PdfWriteFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed, or a mode string was not recognised.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Rendering needs the pdfium shared library. You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (or pass --pdfium-lib).\n\
  • Place libpdfium next to the binary or in the working directory.\n\
  • Install it system-wide. Pre-built binaries:\n\
    https://github.com/bblanchon/pdfium-binaries/releases\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InvertError {
    /// Map this error onto the three-way [`ErrorKind`] taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            InvertError::NotAPdf { .. }
            | InvertError::CorruptPdf { .. }
            | InvertError::PasswordRequired => ErrorKind::InvalidDocument,
            InvertError::EmptyDocument => ErrorKind::EmptyDocument,
            _ => ErrorKind::Processing,
        }
    }
}
