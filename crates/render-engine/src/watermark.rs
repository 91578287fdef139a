//! Brand watermark stamped on every exported raster.
//!
//! The text is drawn from a built-in 5x7 bitmap glyph table so the stamp is
//! pixel-identical on every machine, in every backend and format.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, Blend};
use imageproc::rect::Rect;

/// The fixed brand string.
pub const WATERMARK_TEXT: &str = "STORYREEL";

const GLYPH_COLS: u32 = 5;
const GLYPH_ROWS: u32 = 7;
/// Side of one glyph cell in pixels.
const CELL_PX: u32 = 3;
/// Gap between glyphs, in cells.
const LETTER_SPACING_CELLS: u32 = 1;
/// Distance from the lower edge of the canvas to the bottom of the text.
const BOTTOM_MARGIN_PX: u32 = 24;
const SHADOW_OFFSET_PX: i32 = 2;

const TEXT_FILL: Rgba<u8> = Rgba([255, 255, 255, 178]);
const SHADOW_FILL: Rgba<u8> = Rgba([0, 0, 0, 115]);

/// Screen-space box covered by the watermark, shadow included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl WatermarkBounds {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        let (x, y) = (x as i64, y as i64);
        x >= self.x as i64
            && y >= self.y as i64
            && x < self.x as i64 + self.width as i64
            && y < self.y as i64 + self.height as i64
    }
}

/// Rows of a glyph, most significant of the low five bits is the left column.
fn glyph(c: char) -> [u8; 7] {
    match c {
        'E' => [
            0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111,
        ],
        'L' => [
            0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111,
        ],
        'O' => [
            0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110,
        ],
        'R' => [
            0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001,
        ],
        'S' => [
            0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110,
        ],
        'T' => [
            0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100,
        ],
        'Y' => [
            0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100,
        ],
        _ => [0; 7],
    }
}

fn text_size() -> (u32, u32) {
    let chars = WATERMARK_TEXT.chars().count() as u32;
    let width = chars * GLYPH_COLS * CELL_PX + chars.saturating_sub(1) * LETTER_SPACING_CELLS * CELL_PX;
    (width, GLYPH_ROWS * CELL_PX)
}

/// Top-left of the text (without shadow), bottom-centred on the canvas.
fn text_origin(canvas_width: u32, canvas_height: u32) -> (i32, i32) {
    let (text_w, text_h) = text_size();
    let x = (canvas_width as i64 - text_w as i64) / 2;
    let y = canvas_height as i64 - BOTTOM_MARGIN_PX as i64 - text_h as i64;
    (x as i32, y as i32)
}

/// Area the watermark occupies on a canvas of the given size.
pub fn watermark_bounds(canvas_width: u32, canvas_height: u32) -> WatermarkBounds {
    let (text_w, text_h) = text_size();
    let (x, y) = text_origin(canvas_width, canvas_height);
    WatermarkBounds {
        x,
        y,
        width: text_w + SHADOW_OFFSET_PX as u32,
        height: text_h + SHADOW_OFFSET_PX as u32,
    }
}

/// Lit cells of the text as `(x, y)` offsets from the text origin.
fn lit_cells() -> Vec<(i32, i32)> {
    let advance = (GLYPH_COLS + LETTER_SPACING_CELLS) * CELL_PX;
    let mut cells = Vec::new();
    for (index, c) in WATERMARK_TEXT.chars().enumerate() {
        let glyph_x = index as u32 * advance;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_COLS {
                if bits & (1 << (GLYPH_COLS - 1 - col)) != 0 {
                    cells.push((
                        (glyph_x + col * CELL_PX) as i32,
                        row as i32 * CELL_PX as i32,
                    ));
                }
            }
        }
    }
    cells
}

/// Draw the watermark onto `surface`: shadow pass, then translucent fill.
pub fn stamp(surface: &mut RgbaImage) {
    let (origin_x, origin_y) = text_origin(surface.width(), surface.height());
    let cells = lit_cells();

    let mut canvas = Blend(std::mem::replace(surface, RgbaImage::new(0, 0)));
    for (fill, offset) in [(SHADOW_FILL, SHADOW_OFFSET_PX), (TEXT_FILL, 0)] {
        for &(cx, cy) in &cells {
            let rect = Rect::at(origin_x + cx + offset, origin_y + cy + offset)
                .of_size(CELL_PX, CELL_PX);
            draw_filled_rect_mut(&mut canvas, rect, fill);
        }
    }
    *surface = canvas.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREY: Rgba<u8> = Rgba([128, 128, 128, 255]);

    #[test]
    fn test_every_brand_character_has_a_glyph() {
        for c in WATERMARK_TEXT.chars() {
            assert!(glyph(c).iter().any(|row| *row != 0), "missing glyph for {c}");
        }
    }

    #[test]
    fn test_bounds_are_bottom_centred() {
        let bounds = watermark_bounds(1080, 1080);
        let (text_w, text_h) = text_size();
        let left = bounds.x as u32;
        let right = 1080 - left - text_w;
        assert!(left.abs_diff(right) <= 1);
        assert_eq!(bounds.y as u32 + text_h + BOTTOM_MARGIN_PX, 1080);
    }

    #[test]
    fn test_stamp_only_touches_watermark_area() {
        let mut surface = RgbaImage::from_pixel(400, 300, GREY);
        stamp(&mut surface);

        let bounds = watermark_bounds(400, 300);
        let mut changed = 0;
        for (x, y, pixel) in surface.enumerate_pixels() {
            if *pixel != GREY {
                assert!(bounds.contains(x, y), "pixel ({x},{y}) outside watermark");
                changed += 1;
            }
        }
        assert!(changed > 0);
    }

    #[test]
    fn test_stamp_stays_opaque_and_visible_on_white_and_black() {
        for background in [Rgba([255, 255, 255, 255]), Rgba([0, 0, 0, 255])] {
            let mut surface = RgbaImage::from_pixel(300, 200, background);
            stamp(&mut surface);
            assert!(surface.pixels().all(|p| p.0[3] == 255));
            assert!(surface.pixels().any(|p| *p != background));
        }
    }

    #[test]
    fn test_stamp_on_tiny_canvas_does_not_panic() {
        let mut surface = RgbaImage::from_pixel(8, 8, GREY);
        stamp(&mut surface);
        assert_eq!(surface.dimensions(), (8, 8));
    }
}
