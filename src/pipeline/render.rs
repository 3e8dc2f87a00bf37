//! PDF rasterisation: open a PDF byte buffer and render its pages to RGB
//! bitmaps via pdfium.
//!
//! ## Scale, not pixel caps
//!
//! Every page is rendered at `dpi / 72` pixels per PDF point. The output
//! page is later sized back from pixels to points with the same DPI, so the
//! physical page dimensions survive the round trip exactly.
//!
//! ## Blocking
//!
//! Everything here is synchronous and CPU-bound. Async callers go through
//! [`crate::convert::process_async`], which moves the whole pipeline onto
//! tokio's blocking pool.

use crate::error::InvertError;
use image::RgbImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// PDF user-space units per inch.
pub const PDF_POINTS_PER_INCH: f32 = 72.0;

/// How far into the buffer the `%PDF` signature may start.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Environment variable naming an explicit pdfium library.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Pixels per PDF point at the given resolution.
pub fn scale_factor(dpi: u32) -> f32 {
    dpi as f32 / PDF_POINTS_PER_INCH
}

/// Reject buffers that do not carry a `%PDF` signature.
///
/// Runs before pdfium is bound so obviously wrong uploads fail fast and
/// cheaply. Some producers prepend junk, so the signature is accepted
/// anywhere in the first 1024 bytes.
pub fn check_pdf_header(bytes: &[u8]) -> Result<(), InvertError> {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    if window.windows(4).any(|w| w == b"%PDF") {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    Err(InvertError::NotAPdf { magic })
}

/// Bind to a pdfium shared library.
///
/// Resolution order:
/// 1. `explicit` (a library file, or a directory holding the platform library)
/// 2. `$PDFIUM_LIB_PATH`
/// 3. the platform library in the current working directory
/// 4. the system library search path
pub fn bind_pdfium(explicit: Option<&Path>) -> Result<Pdfium, InvertError> {
    let configured = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(PDFIUM_LIB_PATH_ENV).map(PathBuf::from));

    if let Some(path) = configured {
        let lib = library_file(&path);
        debug!("Binding pdfium from {}", lib.display());
        return Pdfium::bind_to_library(&lib)
            .map(Pdfium::new)
            .map_err(|e| {
                InvertError::PdfiumBindingFailed(format!("{}: {}", lib.display(), e))
            });
    }

    let local = Pdfium::pdfium_platform_library_name_at_path("./");
    let bindings = Pdfium::bind_to_library(&local)
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| InvertError::PdfiumBindingFailed(e.to_string()))?;
    Ok(Pdfium::new(bindings))
}

fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}

/// A pdfium instance together with the explicit library path it was bound for.
struct BoundPdfium {
    requested: Option<PathBuf>,
    pdfium: Pdfium,
}

/// pdfium keeps process-global state that is initialised on bind and torn
/// down on drop, so at most one instance may be alive at a time. The
/// instance stays bound between runs and is only replaced when a caller asks
/// for a different library.
static PDFIUM: Mutex<Option<BoundPdfium>> = Mutex::new(None);

/// Exclusive access to the process-wide pdfium instance.
///
/// Holds the pdfium lock for its whole lifetime; concurrent callers queue in
/// [`Renderer::new`].
pub struct Renderer {
    guard: MutexGuard<'static, Option<BoundPdfium>>,
}

impl Renderer {
    /// Lock pdfium, binding it first if needed (see [`bind_pdfium`] for the
    /// lookup order).
    pub fn new(library_path: Option<&Path>) -> Result<Self, InvertError> {
        let mut guard = PDFIUM.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let reusable = matches!(
            guard.as_ref(),
            Some(bound) if bound.requested.as_deref() == library_path
        );
        if reusable {
            debug!("Reusing bound pdfium instance");
        } else {
            // The old instance must be gone before the next one initialises.
            *guard = None;
            let pdfium = bind_pdfium(library_path)?;
            *guard = Some(BoundPdfium {
                requested: library_path.map(Path::to_path_buf),
                pdfium,
            });
        }

        Ok(Self { guard })
    }

    fn pdfium(&self) -> Result<&Pdfium, InvertError> {
        self.guard
            .as_ref()
            .map(|bound| &bound.pdfium)
            .ok_or_else(|| InvertError::Internal("pdfium instance missing".into()))
    }

    /// Open a PDF held in memory.
    ///
    /// Fails with [`InvertError::EmptyDocument`] when the document has no
    /// pages, so callers never see an empty page sequence.
    pub fn open<'a>(&'a self, bytes: &'a [u8]) -> Result<RenderedDocument<'a>, InvertError> {
        check_pdf_header(bytes)?;

        let document = self
            .pdfium()?
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| {
                let err_str = format!("{:?}", e);
                if err_str.contains("Password") || err_str.contains("password") {
                    InvertError::PasswordRequired
                } else {
                    InvertError::CorruptPdf { detail: err_str }
                }
            })?;

        let page_count = document.pages().len() as usize;
        if page_count == 0 {
            return Err(InvertError::EmptyDocument);
        }
        info!("PDF loaded: {} pages", page_count);

        Ok(RenderedDocument {
            document,
            page_count,
        })
    }
}

/// An opened PDF whose pages can be rasterised.
pub struct RenderedDocument<'a> {
    document: PdfDocument<'a>,
    page_count: usize,
}

impl<'a> RenderedDocument<'a> {
    /// Number of pages, always at least one.
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Render page `index` (0-based) at `dpi` into an RGB bitmap.
    pub fn render_page(&self, index: usize, dpi: u32) -> Result<RgbImage, InvertError> {
        let page_num = index + 1;
        let page = self
            .document
            .pages()
            .get(index as u16)
            .map_err(|e| InvertError::RasterisationFailed {
                page: page_num,
                detail: format!("{:?}", e),
            })?;

        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale_factor(dpi));
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            InvertError::RasterisationFailed {
                page: page_num,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image().into_rgb8();
        debug!(
            "Rendered page {} → {}x{} px @ {} DPI",
            page_num,
            image.width(),
            image.height(),
            dpi
        );
        Ok(image)
    }

    /// Lazily render every page in order.
    ///
    /// The iterator renders one page per `next()` and is consumed once.
    pub fn pages(&self, dpi: u32) -> PageBitmaps<'_, 'a> {
        PageBitmaps {
            document: self,
            dpi,
            next: 0,
        }
    }
}

/// Page-ordered iterator of `(page_index, bitmap)` produced by
/// [`RenderedDocument::pages`].
pub struct PageBitmaps<'d, 'a> {
    document: &'d RenderedDocument<'a>,
    dpi: u32,
    next: usize,
}

impl Iterator for PageBitmaps<'_, '_> {
    type Item = Result<(usize, RgbImage), InvertError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.document.page_count {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(
            self.document
                .render_page(index, self.dpi)
                .map(|image| (index, image)),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.document.page_count - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PageBitmaps<'_, '_> {}
