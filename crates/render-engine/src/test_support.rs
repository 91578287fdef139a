//! Fixtures shared by unit tests.

use base64::Engine as _;
use image::{Rgba, RgbaImage};

use storyreel_story_model::story::{Frame, FrameSequence, Story};

use crate::compositor::encode_png;

/// A `data:` URI holding a solid-colour PNG.
pub fn solid_png_uri(width: u32, height: u32, color: [u8; 4]) -> String {
    let png = encode_png(&RgbaImage::from_pixel(width, height, Rgba(color)))
        .expect("fixture png encodes");
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    )
}

/// A story whose frames are `(width, height, duration_ms)` solid images.
///
/// Each frame gets a distinct colour so frame order is visible in output.
pub fn story_with(title: &str, is_animation: bool, frames: &[(u32, u32, u64)]) -> Story {
    let frames = frames
        .iter()
        .enumerate()
        .map(|(i, &(width, height, duration_ms))| Frame {
            order: i as i64 + 1,
            image_data: solid_png_uri(width, height, [(i as u8).wrapping_mul(60), 40, 90, 255]),
            duration_ms,
        })
        .collect();
    Story::new(
        title,
        is_animation,
        FrameSequence::new(frames).expect("fixture sequence is valid"),
    )
}

/// A story whose frame at zero-based `broken` cannot be decoded.
pub fn story_with_broken_frame(frames: usize, broken: usize) -> Story {
    let frames = (0..frames)
        .map(|i| Frame {
            order: i as i64,
            image_data: if i == broken {
                "data:image/png;base64,bm90IGFuIGltYWdl".to_string()
            } else {
                solid_png_uri(16, 16, [200, 0, 0, 255])
            },
            duration_ms: 100,
        })
        .collect();
    Story::new("Broken", true, FrameSequence::new(frames).expect("valid"))
}
