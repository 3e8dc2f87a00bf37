//! Pixel transforms for the three inversion modes.
//!
//! All arithmetic is integer-only and rounds to nearest:
//!
//! | Mode | Per pixel (after `v' = 255 - v`) | Range |
//! |------|----------------------------------|-------|
//! | reading | `v'` | 0–255 |
//! | printing | `round(0.7·v' + 76.5)` | 77–255 |
//! | presentation | all channels > 200 → `round(0.8·v')`; all < 55 → `v' + 30`; else `v'` | 0–255 |
//!
//! Reading and printing act on each channel independently, so they run
//! through a 256-entry lookup table. Presentation masks look at the whole
//! RGB triple and are evaluated per pixel.

use crate::config::Mode;
use image::{DynamicImage, Rgb, RgbImage};

/// Presentation mode: inverted channels above this are "very light".
const LIGHT_THRESHOLD: u8 = 200;
/// Presentation mode: inverted channels below this are "very dark".
const DARK_THRESHOLD: u8 = 55;
/// Presentation mode: lift applied to very dark pixels.
const DARK_LIFT: u8 = 30;

/// Invert an image of any pixel format.
///
/// Palette, grey and alpha sources are normalised to 8-bit RGB first.
pub fn invert(image: &DynamicImage, mode: Mode) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => invert_rgb(rgb, mode),
        other => invert_in_place(other.to_rgb8(), mode),
    }
}

/// Invert an RGB bitmap into a new buffer of the same dimensions.
///
/// The input is left untouched.
pub fn invert_rgb(image: &RgbImage, mode: Mode) -> RgbImage {
    invert_in_place(image.clone(), mode)
}

/// Invert a bitmap the caller already owns.
///
/// Used by the pipeline for freshly rendered pages nobody else can observe.
pub(crate) fn invert_in_place(mut image: RgbImage, mode: Mode) -> RgbImage {
    match mode {
        Mode::Reading | Mode::Printing => {
            let lut = channel_lut(mode);
            for v in image.iter_mut() {
                *v = lut[*v as usize];
            }
        }
        Mode::Presentation => {
            for px in image.pixels_mut() {
                *px = Rgb(invert_pixel(px.0, mode));
            }
        }
    }
    image
}

/// Scalar kernel for one RGB triple.
pub fn invert_pixel(px: [u8; 3], mode: Mode) -> [u8; 3] {
    let inv = px.map(|v| 255 - v);
    match mode {
        Mode::Reading => inv,
        Mode::Printing => inv.map(soften),
        Mode::Presentation => {
            if inv.iter().all(|&c| c > LIGHT_THRESHOLD) {
                inv.map(|c| ((4 * c as u16 + 2) / 5) as u8)
            } else if inv.iter().all(|&c| c < DARK_THRESHOLD) {
                inv.map(|c| c.saturating_add(DARK_LIFT))
            } else {
                inv
            }
        }
    }
}

/// `round(0.7·v + 0.3·255)`, clamped.
fn soften(v: u8) -> u8 {
    ((7 * v as u16 + 770) / 10).min(255) as u8
}

fn channel_lut(mode: Mode) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (v, out) in lut.iter_mut().enumerate() {
        let inv = 255 - v as u8;
        *out = match mode {
            Mode::Printing => soften(inv),
            _ => inv,
        };
    }
    lut
}
