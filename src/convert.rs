//! Pipeline driver: render → invert → assemble.
//!
//! ## Streaming assembly
//!
//! Pages are pulled from the renderer one at a time, inverted, and handed to
//! the [`PdfAssembler`] straight away. Only the compressed page images live
//! until the end, never the whole document's worth of raw bitmaps.
//!
//! ## Failure policy
//!
//! The first error on any page aborts the run. There is no partial output,
//! no per-page retry, and no automatic second attempt at a lower DPI.

use crate::config::InversionConfig;
use crate::error::InvertError;
use crate::output::{InversionOutput, InversionStats};
use crate::pipeline::assemble::PdfAssembler;
use crate::pipeline::invert::invert_in_place;
use crate::pipeline::render::{check_pdf_header, Renderer};
use image::RgbImage;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Invert every page of a PDF held in memory.
///
/// This is the primary entry point for the library. It blocks the calling
/// thread until the output PDF is ready; use [`process_async`] from async code.
///
/// # Errors
/// - [`InvertError::NotAPdf`] / [`InvertError::CorruptPdf`] /
///   [`InvertError::PasswordRequired`] when the input cannot be opened
/// - [`InvertError::EmptyDocument`] when it has no pages
/// - anything else from rendering, encoding or pdfium binding
pub fn process(input: &[u8], config: &InversionConfig) -> Result<InversionOutput, InvertError> {
    let total_start = Instant::now();

    // ── Step 1: Resolve DPI ──────────────────────────────────────────────
    let (dpi, dpi_overridden) = resolve_dpi(input.len(), config);

    // ── Step 2: Open document ────────────────────────────────────────────
    // Header check first: binding pdfium is not free.
    check_pdf_header(input)?;
    let renderer = Renderer::new(config.pdfium_library_path.as_deref())?;
    let document = renderer.open(input)?;

    // ── Step 3: Render, invert, embed page by page ───────────────────────
    let run = invert_pages(document.pages(dpi), dpi, config)?;

    let stats = InversionStats {
        page_count: run.page_count,
        requested_dpi: config.dpi,
        effective_dpi: dpi,
        dpi_overridden,
        mode: config.mode,
        input_bytes: input.len(),
        output_bytes: run.pdf.len(),
        render_ms: run.render_ms,
        invert_ms: run.invert_ms,
        total_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Inversion complete: {} pages, {} → {} bytes, {}ms total",
        stats.page_count, stats.input_bytes, stats.output_bytes, stats.total_ms
    );

    Ok(InversionOutput { pdf: run.pdf, stats })
}

/// Effective DPI for an input of `input_len` bytes, and whether the
/// large-input rule replaced the requested value.
fn resolve_dpi(input_len: usize, config: &InversionConfig) -> (u32, bool) {
    let dpi = config.effective_dpi(input_len);
    let overridden = dpi != config.dpi;
    if overridden {
        info!(
            "Input is {} bytes, above the large-input threshold; rendering at {} DPI (requested {})",
            input_len, dpi, config.dpi
        );
    } else {
        info!("Rendering at {} DPI, mode={}", dpi, config.mode);
    }
    (dpi, overridden)
}

/// What [`invert_pages`] produced.
struct PageRun {
    pdf: Vec<u8>,
    page_count: usize,
    render_ms: u64,
    invert_ms: u64,
}

/// Pull every page from `pages`, invert it and embed it, then serialise.
///
/// `pages` must yield `(index, bitmap)` in document order starting at 0;
/// the time spent inside `next()` is reported as render time.
fn invert_pages<I>(mut pages: I, dpi: u32, config: &InversionConfig) -> Result<PageRun, InvertError>
where
    I: ExactSizeIterator<Item = Result<(usize, RgbImage), InvertError>>,
{
    let total_pages = pages.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(total_pages, dpi);
    }

    let mut assembler = PdfAssembler::new(dpi, config.image_encoding);
    let mut render_ms = 0u64;
    let mut invert_ms = 0u64;

    for page_num in 1..=total_pages {
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(page_num, total_pages);
        }

        let render_start = Instant::now();
        let rendered = pages.next().unwrap_or_else(|| {
            Err(InvertError::Internal(format!(
                "renderer stopped before page {page_num}"
            )))
        });
        render_ms += render_start.elapsed().as_millis() as u64;

        let result = rendered.and_then(|(index, bitmap)| {
            if index + 1 != page_num {
                return Err(InvertError::Internal(format!(
                    "renderer returned page {} in place of page {page_num}",
                    index + 1
                )));
            }
            let invert_start = Instant::now();
            let inverted = invert_in_place(bitmap, config.mode);
            invert_ms += invert_start.elapsed().as_millis() as u64;
            debug!("Inverted page {} ({})", page_num, config.mode);
            assembler.add_page(&inverted)
        });

        match result {
            Ok(()) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_complete(page_num, total_pages);
                }
            }
            Err(e) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_error(page_num, total_pages, &e.to_string());
                }
                return Err(e);
            }
        }
    }

    // ── Step 4: Serialise output ─────────────────────────────────────────
    let pdf = assembler.finish()?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(total_pages, pdf.len());
    }

    Ok(PageRun {
        pdf,
        page_count: total_pages,
        render_ms,
        invert_ms,
    })
}

/// Run [`process`] on tokio's blocking pool.
///
/// pdfium is CPU-bound and not async-safe, so it must not run on a runtime
/// worker thread.
pub async fn process_async(
    input: Vec<u8>,
    config: InversionConfig,
) -> Result<InversionOutput, InvertError> {
    tokio::task::spawn_blocking(move || process(&input, &config))
        .await
        .map_err(|e| InvertError::Internal(format!("Inversion task panicked: {}", e)))?
}

/// Invert a PDF file and write the result to `output_path`.
///
/// Missing parent directories are created. The output is written to a
/// temporary file in the destination directory and renamed into place, so a
/// failed run never leaves a partial PDF behind.
pub async fn invert_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &InversionConfig,
) -> Result<InversionStats, InvertError> {
    let input_path = input_path.as_ref();
    let output_path = output_path.as_ref().to_path_buf();

    let bytes = read_input(input_path).await?;
    debug!("Read {} bytes from {}", bytes.len(), input_path.display());

    let output = process_async(bytes, config.clone()).await?;

    let stats = output.stats.clone();
    let pdf = output.into_bytes();
    tokio::task::spawn_blocking(move || write_atomic(&output_path, &pdf))
        .await
        .map_err(|e| InvertError::Internal(format!("Write task panicked: {}", e)))??;

    Ok(stats)
}

/// Synchronous wrapper around [`invert_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn invert_file_sync(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &InversionConfig,
) -> Result<InversionStats, InvertError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| InvertError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(invert_file(input_path, output_path, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn read_input(path: &Path) -> Result<Vec<u8>, InvertError> {
    tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => InvertError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => InvertError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => InvertError::InputReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), InvertError> {
    let write_err = |source: std::io::Error| InvertError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DpiFallback, Mode};
    use crate::progress::InversionProgressCallback;
    use image::Rgb;
    use lopdf::Document;
    use std::sync::{Arc, Mutex};

    fn solid(w: u32, h: u32, v: u8) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([v, v, v]))
    }

    fn source(
        pages: Vec<Result<(usize, RgbImage), InvertError>>,
    ) -> std::vec::IntoIter<Result<(usize, RgbImage), InvertError>> {
        pages.into_iter()
    }

    /// Records every callback as a short string.
    #[derive(Default)]
    struct EventLog(Mutex<Vec<String>>);

    impl EventLog {
        fn events(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }

        fn push(&self, event: String) {
            self.0.lock().unwrap().push(event);
        }
    }

    impl InversionProgressCallback for EventLog {
        fn on_conversion_start(&self, total_pages: usize, dpi: u32) {
            self.push(format!("start {total_pages}@{dpi}"));
        }
        fn on_page_start(&self, page_num: usize, _total_pages: usize) {
            self.push(format!("page {page_num}"));
        }
        fn on_page_complete(&self, page_num: usize, _total_pages: usize) {
            self.push(format!("done {page_num}"));
        }
        fn on_page_error(&self, page_num: usize, _total_pages: usize, _error: &str) {
            self.push(format!("error {page_num}"));
        }
        fn on_conversion_complete(&self, total_pages: usize, _output_bytes: usize) {
            self.push(format!("complete {total_pages}"));
        }
    }

    fn config_with_log(mode: Mode) -> (InversionConfig, Arc<EventLog>) {
        let log = Arc::new(EventLog::default());
        let config = InversionConfig::builder()
            .mode(mode)
            .progress_callback(log.clone())
            .build()
            .unwrap();
        (config, log)
    }

    fn first_pixel(doc: &Document, page_id: lopdf::ObjectId) -> [u8; 3] {
        let page = doc.get_dictionary(page_id).unwrap();
        let id = page
            .get(b"Resources")
            .and_then(|r| r.as_dict())
            .and_then(|r| r.get(b"XObject"))
            .and_then(|x| x.as_dict())
            .and_then(|x| x.get(b"Im0"))
            .and_then(|o| o.as_reference())
            .unwrap();
        let raw = doc
            .get_object(id)
            .unwrap()
            .as_stream()
            .unwrap()
            .decompressed_content()
            .unwrap();
        [raw[0], raw[1], raw[2]]
    }

    #[test]
    fn pages_are_inverted_and_embedded_in_order() {
        let (config, log) = config_with_log(Mode::Reading);
        let pages = source(vec![
            Ok((0, solid(10, 20, 255))),
            Ok((1, solid(20, 20, 0))),
            Ok((2, solid(30, 20, 100))),
        ]);

        let run = invert_pages(pages, 72, &config).unwrap();
        assert_eq!(run.page_count, 3);

        let doc = Document::load_mem(&run.pdf).unwrap();
        let ids: Vec<_> = doc.get_pages().into_values().collect();
        assert_eq!(ids.len(), 3);
        let expected = [(10.0, [0, 0, 0]), (20.0, [255, 255, 255]), (30.0, [155, 155, 155])];
        for (id, (width, pixel)) in ids.iter().zip(expected) {
            let media_box = doc
                .get_dictionary(*id)
                .unwrap()
                .get(b"MediaBox")
                .unwrap()
                .as_array()
                .unwrap()
                .clone();
            assert!((media_box[2].as_float().unwrap() - width).abs() < 0.01);
            assert_eq!(first_pixel(&doc, *id), pixel);
        }

        assert_eq!(
            log.events(),
            [
                "start 3@72", "page 1", "done 1", "page 2", "done 2", "page 3", "done 3",
                "complete 3",
            ]
        );
    }

    #[test]
    fn printing_mode_runs_through_the_page_loop() {
        let (config, _) = config_with_log(Mode::Printing);
        let run = invert_pages(source(vec![Ok((0, solid(4, 4, 255)))]), 72, &config).unwrap();
        let doc = Document::load_mem(&run.pdf).unwrap();
        let id = doc.get_pages()[&1];
        assert_eq!(first_pixel(&doc, id), [77, 77, 77]);
    }

    #[test]
    fn page_failure_aborts_the_run() {
        let (config, log) = config_with_log(Mode::Reading);
        let pages = source(vec![
            Ok((0, solid(4, 4, 0))),
            Err(InvertError::RasterisationFailed {
                page: 2,
                detail: "bad stream".into(),
            }),
            Ok((2, solid(4, 4, 0))),
        ]);

        let err = invert_pages(pages, 72, &config).err().unwrap();
        assert!(matches!(err, InvertError::RasterisationFailed { page: 2, .. }));
        assert_eq!(
            log.events(),
            ["start 3@72", "page 1", "done 1", "page 2", "error 2"]
        );
    }

    #[test]
    fn out_of_order_page_is_rejected() {
        let (config, _) = config_with_log(Mode::Reading);
        let pages = source(vec![Ok((1, solid(4, 4, 0))), Ok((0, solid(4, 4, 0)))]);
        let err = invert_pages(pages, 72, &config).err().unwrap();
        assert!(matches!(err, InvertError::Internal(_)));
    }

    #[test]
    fn empty_page_source_produces_no_pdf() {
        let (config, log) = config_with_log(Mode::Reading);
        let err = invert_pages(source(Vec::new()), 72, &config).err().unwrap();
        assert!(matches!(err, InvertError::EmptyInput));
        assert_eq!(log.events(), ["start 0@72"]);
    }

    #[test]
    fn resolve_dpi_reports_any_override() {
        let rule = Some(DpiFallback {
            threshold_bytes: 100,
            dpi: 200,
        });
        let lower = InversionConfig::builder().dpi(300).dpi_fallback(rule).build().unwrap();
        assert_eq!(resolve_dpi(50, &lower), (300, false));
        assert_eq!(resolve_dpi(101, &lower), (200, true));

        // The rule can raise the DPI too; that is still an override.
        let higher = InversionConfig::builder().dpi(150).dpi_fallback(rule).build().unwrap();
        assert_eq!(resolve_dpi(101, &higher), (200, true));
    }

    #[test]
    fn garbage_input_fails_before_binding_pdfium() {
        let config = InversionConfig::builder()
            .pdfium_library_path("/nonexistent/libpdfium.so")
            .build()
            .unwrap();
        let err = process(b"hello world", &config).unwrap_err();
        assert!(matches!(err, InvertError::NotAPdf { .. }));
        assert_eq!(err.kind(), crate::ErrorKind::InvalidDocument);
    }

    #[test]
    fn unbindable_pdfium_is_a_processing_error() {
        let config = InversionConfig::builder()
            .pdfium_library_path("/nonexistent/libpdfium.so")
            .build()
            .unwrap();
        let err = process(b"%PDF-1.4\n%%EOF", &config).unwrap_err();
        assert!(matches!(err, InvertError::PdfiumBindingFailed(_)));
        assert_eq!(err.kind(), crate::ErrorKind::Processing);
    }

    #[tokio::test]
    async fn missing_input_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = invert_file(
            dir.path().join("absent.pdf"),
            dir.path().join("out.pdf"),
            &InversionConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, InvertError::FileNotFound { .. }));
        assert!(err.to_string().contains("Input file not found"));
        assert!(!dir.path().join("out.pdf").exists());
    }

    #[test]
    fn write_atomic_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/c/out.pdf");
        write_atomic(&target, b"%PDF-test").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"%PDF-test");
        let leftovers: Vec<_> = std::fs::read_dir(target.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn write_atomic_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.pdf");
        std::fs::write(&target, b"old").unwrap();
        write_atomic(&target, b"new").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"new");
    }
}
