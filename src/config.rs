//! Configuration types for PDF colour inversion.
//!
//! All pipeline behaviour is controlled through [`InversionConfig`], built
//! via its [`InversionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share a config between concurrent requests and to log the
//! exact settings of a run.

use crate::error::InvertError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default rendering resolution.
pub const DEFAULT_DPI: u32 = 300;

/// Highest accepted rendering resolution.
pub const MAX_DPI: u32 = 1200;

/// Configuration for a PDF inversion run.
///
/// Built via [`InversionConfig::builder()`] or using
/// [`InversionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_invert::{InversionConfig, Mode};
///
/// let config = InversionConfig::builder()
///     .dpi(150)
///     .mode(Mode::Printing)
///     .build()
///     .unwrap();
/// assert_eq!(config.effective_dpi(1024), 150);
/// ```
#[derive(Clone)]
pub struct InversionConfig {
    /// Requested rendering DPI. Range: 1–1200. Default: 300.
    ///
    /// Each page is rasterised at `dpi / 72` pixels per PDF point, and the
    /// output page is sized back to the original physical dimensions, so a
    /// higher DPI only trades time and memory for sharper text.
    pub dpi: u32,

    /// Pixel transform applied to every page. Default: [`Mode::Reading`].
    pub mode: Mode,

    /// Large-input DPI rule. Default: 10 MiB → 200 DPI.
    ///
    /// `None` disables the rule so the requested DPI is always used.
    pub dpi_fallback: Option<DpiFallback>,

    /// How page images are compressed inside the output PDF. Default: lossless Flate.
    pub image_encoding: ImageEncoding,

    /// Explicit pdfium shared library (file or directory).
    ///
    /// If None, `PDFIUM_LIB_PATH`, the working directory and the system
    /// library search path are tried in that order.
    pub pdfium_library_path: Option<PathBuf>,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for InversionConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            mode: Mode::default(),
            dpi_fallback: Some(DpiFallback::default()),
            image_encoding: ImageEncoding::default(),
            pdfium_library_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for InversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InversionConfig")
            .field("dpi", &self.dpi)
            .field("mode", &self.mode)
            .field("dpi_fallback", &self.dpi_fallback)
            .field("image_encoding", &self.image_encoding)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn InversionProgressCallback>"),
            )
            .finish()
    }
}

impl InversionConfig {
    /// Create a new builder for `InversionConfig`.
    pub fn builder() -> InversionConfigBuilder {
        InversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The DPI actually used for an input of `input_len` bytes.
    ///
    /// Applies [`DpiFallback`] when configured; otherwise returns `dpi`.
    pub fn effective_dpi(&self, input_len: usize) -> u32 {
        match self.dpi_fallback {
            Some(rule) if rule.applies_to(input_len) => rule.dpi,
            _ => self.dpi,
        }
    }
}

/// Builder for [`InversionConfig`].
#[derive(Debug)]
pub struct InversionConfigBuilder {
    config: InversionConfig,
}

impl InversionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn dpi_fallback(mut self, rule: Option<DpiFallback>) -> Self {
        self.config.dpi_fallback = rule;
        self
    }

    pub fn image_encoding(mut self, encoding: ImageEncoding) -> Self {
        self.config.image_encoding = encoding;
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<InversionConfig, InvertError> {
        let c = &self.config;
        validate_dpi("DPI", c.dpi)?;
        if let Some(rule) = c.dpi_fallback {
            validate_dpi("Fallback DPI", rule.dpi)?;
        }
        if let ImageEncoding::Jpeg { quality } = c.image_encoding {
            if !(1..=100).contains(&quality) {
                return Err(InvertError::InvalidConfig(format!(
                    "JPEG quality must be 1–100, got {quality}"
                )));
            }
        }
        Ok(self.config)
    }
}

fn validate_dpi(what: &str, dpi: u32) -> Result<(), InvertError> {
    if dpi == 0 || dpi > MAX_DPI {
        return Err(InvertError::InvalidConfig(format!(
            "{what} must be 1–{MAX_DPI}, got {dpi}"
        )));
    }
    Ok(())
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Pixel-transform policy applied to each rendered page.
///
/// | Mode | Transform |
/// |------|-----------|
/// | reading | `255 - v` per channel |
/// | printing | `0.7 · (255 - v) + 76.5`, a lighter grey-based negative |
/// | presentation | `255 - v`, then very light pixels darkened and very dark pixels lifted |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Plain full inversion, for reading on screen. (default)
    #[default]
    Reading,
    /// Softer inversion that never produces near-black, for paper.
    Printing,
    /// Full inversion with contrast correction at both ends.
    Presentation,
}

impl Mode {
    /// Every mode, in documentation order.
    pub const ALL: [Mode; 3] = [Mode::Reading, Mode::Printing, Mode::Presentation];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Reading => "reading",
            Mode::Printing => "printing",
            Mode::Presentation => "presentation",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = InvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reading" => Ok(Mode::Reading),
            "printing" => Ok(Mode::Printing),
            "presentation" => Ok(Mode::Presentation),
            other => Err(InvertError::InvalidConfig(format!(
                "unknown mode '{other}' (expected reading, printing or presentation)"
            ))),
        }
    }
}

/// Lower the rendering DPI for large inputs to bound memory and time.
///
/// When the input exceeds `threshold_bytes` the pipeline renders at `dpi`
/// instead of the requested resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpiFallback {
    /// Inputs strictly larger than this many bytes trigger the fallback.
    pub threshold_bytes: u64,
    /// DPI used when the rule fires.
    pub dpi: u32,
}

impl DpiFallback {
    /// 10 MiB.
    pub const DEFAULT_THRESHOLD_BYTES: u64 = 10 * 1024 * 1024;
    pub const DEFAULT_DPI: u32 = 200;

    pub fn applies_to(&self, input_len: usize) -> bool {
        input_len as u64 > self.threshold_bytes
    }
}

impl Default for DpiFallback {
    fn default() -> Self {
        Self {
            threshold_bytes: Self::DEFAULT_THRESHOLD_BYTES,
            dpi: Self::DEFAULT_DPI,
        }
    }
}

/// Compression used for the page images embedded in the output PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageEncoding {
    /// Lossless zlib-compressed RGB (`/FlateDecode`). (default)
    #[default]
    Flate,
    /// Baseline JPEG (`/DCTDecode`) at the given quality, 1–100.
    Jpeg { quality: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = InversionConfig::default();
        assert_eq!(c.dpi, 300);
        assert_eq!(c.mode, Mode::Reading);
        assert_eq!(
            c.dpi_fallback,
            Some(DpiFallback {
                threshold_bytes: 10 * 1024 * 1024,
                dpi: 200
            })
        );
        assert_eq!(c.image_encoding, ImageEncoding::Flate);
    }

    #[test]
    fn fallback_fires_only_above_threshold() {
        let c = InversionConfig::default();
        let ten_mib = 10 * 1024 * 1024;
        assert_eq!(c.effective_dpi(0), 300);
        assert_eq!(c.effective_dpi(ten_mib), 300);
        assert_eq!(c.effective_dpi(ten_mib + 1), 200);
    }

    #[test]
    fn fallback_overrides_requested_dpi() {
        let c = InversionConfig::builder().dpi(150).build().unwrap();
        assert_eq!(c.effective_dpi(11 * 1024 * 1024), 200);
    }

    #[test]
    fn fallback_can_be_disabled() {
        let c = InversionConfig::builder()
            .dpi_fallback(None)
            .build()
            .unwrap();
        assert_eq!(c.effective_dpi(50 * 1024 * 1024), 300);
    }

    #[test]
    fn custom_fallback_rule() {
        let c = InversionConfig::builder()
            .dpi_fallback(Some(DpiFallback {
                threshold_bytes: 1000,
                dpi: 96,
            }))
            .build()
            .unwrap();
        assert_eq!(c.effective_dpi(1000), 300);
        assert_eq!(c.effective_dpi(1001), 96);
    }

    #[test]
    fn build_rejects_bad_dpi() {
        assert!(InversionConfig::builder().dpi(0).build().is_err());
        assert!(InversionConfig::builder().dpi(MAX_DPI + 1).build().is_err());
        assert!(InversionConfig::builder().dpi(MAX_DPI).build().is_ok());
        let bad_fallback = InversionConfig::builder().dpi_fallback(Some(DpiFallback {
            threshold_bytes: 1,
            dpi: 0,
        }));
        assert!(bad_fallback.build().is_err());
    }

    #[test]
    fn build_rejects_bad_jpeg_quality() {
        let err = InversionConfig::builder()
            .image_encoding(ImageEncoding::Jpeg { quality: 0 })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("JPEG quality"));
        assert!(InversionConfig::builder()
            .image_encoding(ImageEncoding::Jpeg { quality: 85 })
            .build()
            .is_ok());
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("reading".parse::<Mode>().unwrap(), Mode::Reading);
        assert_eq!(" Printing ".parse::<Mode>().unwrap(), Mode::Printing);
        assert_eq!("PRESENTATION".parse::<Mode>().unwrap(), Mode::Presentation);
        assert!("sepia".parse::<Mode>().is_err());
    }

    #[test]
    fn mode_display_round_trips_through_from_str() {
        for mode in Mode::ALL {
            assert_eq!(mode.to_string().parse::<Mode>().unwrap(), mode);
        }
    }

    #[test]
    fn mode_serialises_lowercase() {
        assert_eq!(
            serde_json::to_string(&Mode::Presentation).unwrap(),
            "\"presentation\""
        );
        let m: Mode = serde_json::from_str("\"printing\"").unwrap();
        assert_eq!(m, Mode::Printing);
    }

    #[test]
    fn debug_hides_callback() {
        let c = InversionConfig::builder()
            .progress_callback(std::sync::Arc::new(crate::progress::NoopProgressCallback))
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("<dyn InversionProgressCallback>"));
    }
}
