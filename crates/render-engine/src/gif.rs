//! Animated GIF backend.

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame as GifFrame, RgbaImage};

use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_story_model::format::CanvasSize;
use storyreel_story_model::request::{animation_file_name, Encoding};
use storyreel_story_model::story::Story;

use crate::download::Artifact;
use crate::export::{ExportContext, ExportStage, ExportStrategy};

const BACKEND: &str = "gif";

/// Palette quantisation speed passed to the encoder (1 = best, 30 = fastest).
pub const DEFAULT_SPEED: i32 = 10;

/// Largest delay a single GIF frame can carry.
const MAX_FRAME_CS: u64 = u16::MAX as u64;

/// Convert frame durations in milliseconds into GIF delays in centiseconds.
///
/// Each frame ends at the rounded cumulative time, so rounding never drifts
/// the total by more than 5 ms. Every frame shows for at least 1 cs; a frame
/// that had to be lengthened is paid back by the frames that follow.
pub fn centisecond_schedule(delays_ms: &[u64]) -> Vec<u64> {
    let mut elapsed_ms = 0u64;
    let mut emitted_cs = 0u64;
    delays_ms
        .iter()
        .map(|&delay_ms| {
            elapsed_ms += delay_ms;
            let end_cs = (elapsed_ms + 5) / 10;
            let cs = end_cs.saturating_sub(emitted_cs).max(1);
            emitted_cs += cs;
            cs
        })
        .collect()
}

/// Split a delay into chunks that fit one GIF frame each.
fn frame_chunks(cs: u64) -> impl Iterator<Item = u64> {
    let full = cs / MAX_FRAME_CS;
    let rest = cs % MAX_FRAME_CS;
    std::iter::repeat(MAX_FRAME_CS)
        .take(full as usize)
        .chain((rest > 0).then_some(rest))
}

fn cs_delay(cs: u64) -> Delay {
    Delay::from_numer_denom_ms(cs as u32 * 10, 1)
}

/// Collects composited frames and their delays, then encodes them in one go.
#[derive(Debug, Default)]
pub struct GifAccumulator {
    frames: Vec<(RgbaImage, u64)>,
}

impl GifAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, surface: RgbaImage, delay_ms: u64) {
        self.frames.push((surface, delay_ms));
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Sum of the delays pushed so far.
    pub fn total_delay_ms(&self) -> u64 {
        self.frames.iter().map(|(_, delay)| delay).sum()
    }

    /// Encode a looping GIF. Runs on the blocking pool.
    pub async fn render(self, speed: i32) -> StoryreelResult<Vec<u8>> {
        if self.frames.is_empty() {
            return Err(StoryreelError::encoder_runtime(BACKEND, "no frames to encode"));
        }

        tokio::task::spawn_blocking(move || self.encode(speed))
            .await
            .map_err(|e| StoryreelError::encoder_runtime(BACKEND, format!("encoder task: {e}")))?
    }

    fn encode(self, speed: i32) -> StoryreelResult<Vec<u8>> {
        let fail = |e: image::ImageError| StoryreelError::encoder_runtime(BACKEND, e.to_string());

        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new_with_speed(&mut bytes, speed.clamp(1, 30));
            encoder.set_repeat(Repeat::Infinite).map_err(fail)?;
            let delays_ms: Vec<u64> = self.frames.iter().map(|(_, delay)| *delay).collect();
            let schedule = centisecond_schedule(&delays_ms);

            for ((surface, _), cs) in self.frames.into_iter().zip(schedule) {
                // Frames longer than one GIF delay are repeated.
                let chunks: Vec<u64> = frame_chunks(cs).collect();
                let Some((last, repeats)) = chunks.split_last() else {
                    continue;
                };
                for &chunk in repeats {
                    encoder
                        .encode_frame(GifFrame::from_parts(surface.clone(), 0, 0, cs_delay(chunk)))
                        .map_err(fail)?;
                }
                encoder
                    .encode_frame(GifFrame::from_parts(surface, 0, 0, cs_delay(*last)))
                    .map_err(fail)?;
            }
        }
        Ok(bytes)
    }
}

/// Encodes every frame into one looping GIF.
#[derive(Debug, Clone)]
pub struct GifExporter {
    speed: i32,
}

impl GifExporter {
    pub fn new(speed: i32) -> Self {
        Self { speed }
    }
}

impl Default for GifExporter {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED)
    }
}

#[async_trait::async_trait]
impl ExportStrategy for GifExporter {
    fn encoding(&self) -> Encoding {
        Encoding::Gif
    }

    async fn attempt(
        &self,
        story: &Story,
        canvas: CanvasSize,
        ctx: &ExportContext,
    ) -> StoryreelResult<Artifact> {
        let total = story.frames.len();
        let mut gif = GifAccumulator::new();

        for (index, frame) in story.frames.iter().enumerate() {
            let surface = ctx.compositor().composite(frame, index + 1, canvas).await?;
            gif.push(surface, frame.duration_ms);
            ctx.report(Some(Encoding::Gif), ExportStage::Rendering, index + 1, total);
        }

        ctx.report(Some(Encoding::Gif), ExportStage::Encoding, total, total);
        let total_delay_ms = gif.total_delay_ms();
        let bytes = gif.render(self.speed).await?;

        tracing::info!(
            frames = total,
            total_delay_ms,
            bytes = bytes.len(),
            "GIF encoded"
        );

        Ok(Artifact::new(
            animation_file_name(&story.sanitized_title(), Encoding::Gif),
            Encoding::Gif.mime_type(),
            bytes,
        ))
    }
}
