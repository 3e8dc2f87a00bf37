//! CLI binary for pdf-invert.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `InversionConfig` and reports the result.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_invert::{
    invert_file, DpiFallback, ImageEncoding, InversionConfig, InversionProgressCallback,
    InversionStats, Mode, ProgressCallback,
};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Wall-clock start of the page currently being processed.
    page_started: Mutex<Instant>,
}

impl CliProgressCallback {
    /// Spinner until `on_conversion_start` reveals the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(Instant::now()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Inverting");
        self.bar.reset_eta();
    }

    fn page_elapsed_secs(&self) -> f64 {
        self.page_started
            .lock()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl InversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize, dpi: u32) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Inverting {total_pages} pages at {dpi} DPI…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut started) = self.page_started.lock() {
            *started = Instant::now();
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{:.1}s", self.page_elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        // Keep the log line on one terminal row.
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{:.1}s", self.page_elapsed_secs())),
        ));
        self.bar.abandon();
    }

    fn on_conversion_complete(&self, total_pages: usize, output_bytes: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages inverted  {}",
            green("✔"),
            bold(&total_pages.to_string()),
            dim(&format!("{} KiB", output_bytes / 1024)),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Dark version for reading on screen (default mode)
  pdfinvert paper.pdf paper_dark.pdf

  # Softer negative that saves toner
  pdfinvert --mode printing handout.pdf handout_print.pdf

  # Slides for a projector, lower resolution
  pdfinvert --mode presentation --dpi 150 slides.pdf slides_dark.pdf

  # Machine-readable result
  pdfinvert --json paper.pdf out/paper_dark.pdf

  # Keep 300 DPI even for a very large scan
  pdfinvert --no-dpi-fallback scan.pdf scan_dark.pdf

MODES:
  reading       plain negative (255 - v)
  printing      grey-based negative, never darker than 77/255
  presentation  negative with very light areas dimmed and very dark areas lifted

LARGE INPUTS:
  Inputs over 10 MiB are rendered at 200 DPI regardless of --dpi, to bound
  memory and time. Disable with --no-dpi-fallback.

ENVIRONMENT VARIABLES:
  PDFINVERT_DPI           Default for --dpi
  PDFINVERT_MODE          Default for --mode
  PDFINVERT_JPEG_QUALITY  Default for --jpeg-quality
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Override log filtering (e.g. pdf_invert=debug)
"#;

/// Invert the colours of every page of a PDF.
#[derive(Parser, Debug)]
#[command(
    name = "pdfinvert",
    version,
    about = "Invert the colours of a PDF (reading, printing or presentation mode)",
    long_about = "Render each page of a PDF to an image, invert its pixels, and write \
a new PDF of the same page size. Unlike viewer dark modes, embedded images and scans are \
inverted too.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input PDF file.
    input: PathBuf,

    /// Output PDF file. Parent directories are created.
    output: PathBuf,

    /// Rendering DPI (1–1200).
    #[arg(long, env = "PDFINVERT_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(1..=1200))]
    dpi: u32,

    /// Inversion mode.
    #[arg(long, env = "PDFINVERT_MODE", value_enum, default_value = "reading")]
    mode: ModeArg,

    /// Print a JSON result object to stdout instead of human-readable text.
    #[arg(long, env = "PDFINVERT_JSON")]
    json: bool,

    /// Always render at --dpi, even for inputs over 10 MiB.
    #[arg(long, env = "PDFINVERT_NO_DPI_FALLBACK")]
    no_dpi_fallback: bool,

    /// Embed pages as JPEG at this quality (1–100) instead of lossless Flate.
    #[arg(long, env = "PDFINVERT_JPEG_QUALITY",
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: Option<u8>,

    /// Path to the pdfium shared library (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long, env = "PDFINVERT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFINVERT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFINVERT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Reading,
    Printing,
    Presentation,
}

impl From<ModeArg> for Mode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Reading => Mode::Reading,
            ModeArg::Printing => Mode::Printing,
            ModeArg::Presentation => Mode::Presentation,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would tear the progress bar; keep them for -v.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn InversionProgressCallback>)
    } else {
        None
    };

    match run(&cli, progress_cb).await {
        Ok(stats) => {
            report_success(&cli, &stats);
            ExitCode::SUCCESS
        }
        Err(e) => {
            report_failure(&cli, &e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, progress: Option<ProgressCallback>) -> Result<InversionStats> {
    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    let config = build_config(cli, progress)?;

    invert_file(&cli.input, &cli.output, &config)
        .await
        .context("PDF inversion failed")
}

/// Map CLI args to `InversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<InversionConfig> {
    let mut builder = InversionConfig::builder()
        .dpi(cli.dpi)
        .mode(cli.mode.into());

    if cli.no_dpi_fallback {
        builder = builder.dpi_fallback(None);
    } else {
        builder = builder.dpi_fallback(Some(DpiFallback::default()));
    }
    if let Some(quality) = cli.jpeg_quality {
        builder = builder.image_encoding(ImageEncoding::Jpeg { quality });
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(lib);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn report_success(cli: &Cli, stats: &InversionStats) {
    if cli.json {
        let payload = serde_json::json!({
            "success": true,
            "input_file": display_path(&cli.input),
            "output_file": display_path(&cli.output),
            "message": "PDF color inversion completed successfully",
            "stats": stats,
        });
        println!("{payload}");
        return;
    }

    if cli.quiet {
        return;
    }
    if stats.dpi_overridden {
        eprintln!(
            "{} large input: rendered at {} DPI (requested {})",
            cyan("⚠"),
            stats.effective_dpi,
            stats.requested_dpi
        );
    }
    eprintln!(
        "{}  {} pages  {}  {} DPI  {}ms  →  {}",
        green("✔"),
        stats.page_count,
        stats.mode,
        stats.effective_dpi,
        stats.total_ms,
        bold(&cli.output.display().to_string()),
    );
}

fn report_failure(cli: &Cli, err: &anyhow::Error) {
    if cli.json {
        let payload = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        println!("{payload}");
    } else {
        eprintln!("{} {:#}", red("✘"), err);
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}
