//! Result types returned by the inversion pipeline.

use crate::config::Mode;
use serde::{Deserialize, Serialize};

/// The inverted PDF plus statistics about the run.
#[derive(Debug, Clone)]
pub struct InversionOutput {
    /// The complete output PDF.
    pub pdf: Vec<u8>,
    pub stats: InversionStats,
}

impl InversionOutput {
    /// Discard the stats and keep only the PDF bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.pdf
    }
}

/// Per-run statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InversionStats {
    /// Pages in the input (and therefore the output) document.
    pub page_count: usize,
    /// DPI asked for in the config.
    pub requested_dpi: u32,
    /// DPI actually used for rendering.
    pub effective_dpi: u32,
    /// True when the large-input rule replaced the requested DPI.
    pub dpi_overridden: bool,
    pub mode: Mode,
    pub input_bytes: usize,
    pub output_bytes: usize,
    /// Time spent in pdfium rasterisation.
    pub render_ms: u64,
    /// Time spent in pixel transforms.
    pub invert_ms: u64,
    /// Wall-clock time for the whole run, including assembly.
    pub total_ms: u64,
}
