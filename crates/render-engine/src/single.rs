//! Still-image export of a single frame.

use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_story_model::format::CanvasSize;
use storyreel_story_model::request::frame_file_name;
use storyreel_story_model::story::Story;

use crate::compositor::{encode_png, FrameCompositor};
use crate::download::{Artifact, DownloadSink};

/// Composites one frame and hands it off as a PNG download.
pub struct SingleAssetDownloader<'a> {
    compositor: &'a FrameCompositor,
}

impl<'a> SingleAssetDownloader<'a> {
    pub fn new(compositor: &'a FrameCompositor) -> Self {
        Self { compositor }
    }

    /// Render the frame at zero-based `index` as `{title}_frame_{index + 1}.png`.
    pub async fn render(
        &self,
        story: &Story,
        index: usize,
        canvas: CanvasSize,
    ) -> StoryreelResult<Artifact> {
        let frame = story.frames.get(index).ok_or_else(|| {
            StoryreelError::invalid_request(format!(
                "frame index {index} is out of range for a story with {} frames",
                story.frames.len()
            ))
        })?;
        let number = index + 1;

        let surface = self.compositor.composite(frame, number, canvas).await?;
        let png = encode_png(&surface)
            .map_err(|e| StoryreelError::encoder_runtime("png", e.to_string()))?;

        Ok(Artifact::new(
            frame_file_name(&story.sanitized_title(), number),
            "image/png",
            png,
        ))
    }

    /// Render the frame and deliver it to `sink`.
    pub async fn download(
        &self,
        story: &Story,
        index: usize,
        canvas: CanvasSize,
        sink: &dyn DownloadSink,
    ) -> StoryreelResult<String> {
        let artifact = self.render(story, index, canvas).await?;
        tracing::debug!(
            file = %artifact.file_name,
            canvas = %canvas,
            "Still frame rendered"
        );
        sink.deliver(&artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::MemoryDownloads;
    use crate::test_support::story_with;

    fn story() -> Story {
        story_with("Sunset #2", false, &[(80, 60, 100), (30, 30, 100)])
    }

    #[tokio::test]
    async fn test_render_names_frame_one_based() {
        let compositor = FrameCompositor::default();
        let artifact = SingleAssetDownloader::new(&compositor)
            .render(&story(), 1, CanvasSize::new(64, 64))
            .await
            .unwrap();

        assert_eq!(artifact.file_name, "sunset2_frame_2.png");
        assert_eq!(artifact.mime_type, "image/png");
        let decoded = image::load_from_memory(&artifact.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 64));
    }

    #[tokio::test]
    async fn test_download_delivers_to_sink() {
        let compositor = FrameCompositor::default();
        let sink = MemoryDownloads::new();
        SingleAssetDownloader::new(&compositor)
            .download(&story(), 0, CanvasSize::new(32, 32), &sink)
            .await
            .unwrap();
        assert_eq!(sink.file_names(), vec!["sunset2_frame_1.png"]);
    }

    #[tokio::test]
    async fn test_out_of_range_index() {
        let compositor = FrameCompositor::default();
        let err = SingleAssetDownloader::new(&compositor)
            .render(&story(), 2, CanvasSize::new(32, 32))
            .await
            .unwrap_err();
        assert!(matches!(err, StoryreelError::InvalidRequest { .. }));
    }
}
