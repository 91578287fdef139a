//! Frame compositor: fits one source frame onto a destination canvas.
//!
//! Every exported raster goes through the same steps:
//! 1. fill the canvas with an opaque background
//! 2. scale the frame uniformly to fit (never crops, may letterbox)
//! 3. centre it
//! 4. stamp the watermark

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use storyreel_common::error::StoryreelResult;
use storyreel_story_model::format::{CanvasSize, CanvasSpec, TargetFormat};
use storyreel_story_model::story::Frame;

use crate::layers::{Layer, LayerStack};
use crate::source::FrameSource;
use crate::watermark;

/// Default letterbox colour.
pub const DEFAULT_BACKGROUND: [u8; 3] = [255, 255, 255];

/// Placement of a scaled frame on its canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitRect {
    /// Uniform scale applied to the source.
    pub scale: f64,
    /// Left edge in canvas pixels.
    pub x: u32,
    /// Top edge in canvas pixels.
    pub y: u32,
    /// Scaled width in pixels.
    pub width: u32,
    /// Scaled height in pixels.
    pub height: u32,
}

/// Compute the scale-to-fit placement of a `src_w`×`src_h` image.
///
/// Scaled sizes are rounded to whole pixels and clamped to the canvas, so
/// the result never exceeds it. Margins differ by at most one pixel.
pub fn fit_rect(src_w: u32, src_h: u32, canvas: CanvasSize) -> FitRect {
    let (dst_w, dst_h) = (canvas.width.max(1), canvas.height.max(1));
    let (src_w, src_h) = (src_w.max(1), src_h.max(1));

    let scale = (dst_w as f64 / src_w as f64).min(dst_h as f64 / src_h as f64);
    let width = ((src_w as f64 * scale).round() as u32).clamp(1, dst_w);
    let height = ((src_h as f64 * scale).round() as u32).clamp(1, dst_h);

    FitRect {
        scale,
        x: (dst_w - width) / 2,
        y: (dst_h - height) / 2,
        width,
        height,
    }
}

/// Encode a composited surface as PNG.
pub fn encode_png(surface: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut bytes = Cursor::new(Vec::new());
    surface.write_to(&mut bytes, image::ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

/// Renders frames onto destination canvases.
#[derive(Debug, Clone)]
pub struct FrameCompositor {
    source: FrameSource,
    background: Rgba<u8>,
}

impl FrameCompositor {
    pub fn new(source: FrameSource, background: [u8; 3]) -> Self {
        let [r, g, b] = background;
        Self {
            source,
            background: Rgba([r, g, b, 255]),
        }
    }

    pub fn background(&self) -> Rgba<u8> {
        self.background
    }

    /// Canvas size for an export whose first frame is `first`.
    ///
    /// Fixed presets never touch the image; `Original` decodes `first` to
    /// read its native size.
    pub async fn resolve_canvas(
        &self,
        format: TargetFormat,
        first: &Frame,
        number: usize,
    ) -> StoryreelResult<CanvasSize> {
        match format.resolve() {
            CanvasSpec::Fixed(size) => Ok(size),
            CanvasSpec::Native => self.source.native_size(first, number).await,
        }
    }

    /// Decode `frame` and render it onto a new canvas.
    pub async fn composite(
        &self,
        frame: &Frame,
        number: usize,
        canvas: CanvasSize,
    ) -> StoryreelResult<RgbaImage> {
        let mut surface = RgbaImage::new(canvas.width, canvas.height);
        self.composite_into(frame, number, &mut surface).await?;
        Ok(surface)
    }

    /// Decode `frame` and render it onto an existing surface.
    ///
    /// The surface is only touched once decoding has succeeded.
    pub async fn composite_into(
        &self,
        frame: &Frame,
        number: usize,
        surface: &mut RgbaImage,
    ) -> StoryreelResult<()> {
        let image = self.source.load(frame, number).await?;
        self.render_into(&image, surface);
        Ok(())
    }

    /// Render an already decoded image onto `surface`.
    pub fn render_into(&self, image: &RgbaImage, surface: &mut RgbaImage) {
        for pixel in surface.pixels_mut() {
            *pixel = self.background;
        }

        let canvas = CanvasSize::new(surface.width(), surface.height());
        let fit = fit_rect(image.width(), image.height(), canvas);

        let scaled = if (fit.width, fit.height) == image.dimensions() {
            image.clone()
        } else {
            imageops::resize(image, fit.width, fit.height, FilterType::Triangle)
        };

        let mut stack = LayerStack::new();
        stack.push(Layer::new(0, fit.x as i64, fit.y as i64, scaled));
        stack.flatten_onto(surface);

        watermark::stamp(surface);
    }

    /// Render an already decoded image onto a new canvas.
    pub fn render(&self, image: &RgbaImage, canvas: CanvasSize) -> RgbaImage {
        let mut surface = RgbaImage::new(canvas.width, canvas.height);
        self.render_into(image, &mut surface);
        surface
    }
}

impl Default for FrameCompositor {
    fn default() -> Self {
        Self::new(FrameSource::new(), DEFAULT_BACKGROUND)
    }
}
