//! Luminance quantization and character-grid rendering.
//!
//! A frame is resized to `columns` characters wide, converted to BT.601
//! luminance and each sample is mapped onto [`RAMP`]. The row count comes
//! from the source aspect ratio scaled by [`FONT_RATIO`], which compensates
//! for monospace cells being taller than they are wide.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

/// Glyphs from darkest to lightest.
pub const RAMP: &[u8] = b"@%#*+=-:. ";

/// Character cell width divided by height.
pub const FONT_RATIO: f64 = 0.65;

/// Default number of columns in a rendered frame.
pub const DEFAULT_COLUMNS: u32 = 100;

/// One rendered frame: `height` rows of exactly `width` ramp characters joined
/// by `\n`, with no trailing newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsciiFrame {
    pub width: u32,
    pub height: u32,
    text: String,
}

impl AsciiFrame {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    pub fn rows(&self) -> impl Iterator<Item = &str> {
        self.text.split('\n')
    }
}

/// Grid size for a source of `orig_w` x `orig_h` pixels rendered at `columns`.
///
/// Always computed from the original dimensions. The height never drops
/// below one row.
pub fn grid_dimensions(orig_w: u32, orig_h: u32, columns: u32) -> (u32, u32) {
    let aspect = orig_h as f64 / orig_w.max(1) as f64;
    let rows = (columns as f64 * aspect * FONT_RATIO).round() as u32;
    (columns, rows.max(1))
}

/// ITU-R BT.601 luma with integer weights, rounded to nearest.
pub fn luminance(px: Rgb<u8>) -> u8 {
    let r = px[0] as u32;
    let g = px[1] as u32;
    let b = px[2] as u32;
    ((299 * r + 587 * g + 114 * b + 500) / 1000) as u8
}

/// Ramp index for a luminance sample.
///
/// The 0..=255 range is split into `RAMP.len()` buckets of width
/// 256 / len, so 255 lands in the last bucket.
pub fn ramp_index(luma: u8) -> usize {
    let buckets = RAMP.len();
    (luma as usize * buckets / 256).min(buckets - 1)
}

pub fn char_for(luma: u8) -> char {
    RAMP[ramp_index(luma)] as char
}

/// Render an RGB image as a `columns`-wide character grid.
pub fn render(img: &RgbImage, columns: u32) -> AsciiFrame {
    let (orig_w, orig_h) = img.dimensions();
    let (target_w, target_h) = grid_dimensions(orig_w, orig_h, columns);

    let resized;
    let img = if (target_w, target_h) != (orig_w, orig_h) {
        resized = imageops::resize(img, target_w, target_h, FilterType::Triangle);
        &resized
    } else {
        img
    };

    let mut out = String::with_capacity((target_w as usize + 1) * target_h as usize);
    for (y, row) in img.rows().enumerate() {
        if y > 0 {
            out.push('\n');
        }
        for px in row {
            out.push(char_for(luminance(*px)));
        }
    }

    AsciiFrame {
        width: target_w,
        height: target_h,
        text: out,
    }
}
