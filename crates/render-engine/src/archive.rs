//! ZIP archive backend: one PNG per frame under a single folder.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_story_model::format::CanvasSize;
use storyreel_story_model::request::{animation_file_name, archive_entry_name, Encoding};
use storyreel_story_model::story::Story;

use crate::compositor::encode_png;
use crate::download::Artifact;
use crate::export::{ExportContext, ExportStage, ExportStrategy};

/// Folder that holds the frames inside the archive.
pub const DEFAULT_FOLDER: &str = "frames";

/// In-memory ZIP builder.
pub struct FrameArchive {
    folder: String,
    writer: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    entries: usize,
}

impl FrameArchive {
    pub fn new(folder: &str) -> StoryreelResult<Self> {
        // PNG is already compressed. Default timestamps keep output reproducible.
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .add_directory(format!("{folder}/"), options)
            .map_err(|e| StoryreelError::archive_build(e.to_string()))?;

        Ok(Self {
            folder: folder.to_string(),
            writer,
            options,
            entries: 0,
        })
    }

    /// Add the PNG for 1-based frame `number`.
    pub fn add_frame(&mut self, number: usize, png: &[u8]) -> StoryreelResult<()> {
        let name = archive_entry_name(&self.folder, number);
        self.writer
            .start_file(name.as_str(), self.options)
            .map_err(|e| StoryreelError::archive_build(format!("{name}: {e}")))?;
        self.writer
            .write_all(png)
            .map_err(|e| StoryreelError::archive_build(format!("{name}: {e}")))?;
        self.entries += 1;
        Ok(())
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn finish(self) -> StoryreelResult<Vec<u8>> {
        let cursor = self
            .writer
            .finish()
            .map_err(|e| StoryreelError::archive_build(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}

/// Packs every composited frame as a PNG into one ZIP.
#[derive(Debug, Clone)]
pub struct ArchiveExporter {
    folder: String,
}

impl ArchiveExporter {
    pub fn new(folder: impl Into<String>) -> Self {
        let folder = folder.into();
        let folder = folder.trim_matches('/');
        Self {
            folder: if folder.is_empty() {
                DEFAULT_FOLDER.to_string()
            } else {
                folder.to_string()
            },
        }
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }
}

impl Default for ArchiveExporter {
    fn default() -> Self {
        Self::new(DEFAULT_FOLDER)
    }
}

#[async_trait::async_trait]
impl ExportStrategy for ArchiveExporter {
    fn encoding(&self) -> Encoding {
        Encoding::Archive
    }

    async fn attempt(
        &self,
        story: &Story,
        canvas: CanvasSize,
        ctx: &ExportContext,
    ) -> StoryreelResult<Artifact> {
        let total = story.frames.len();
        let mut pngs = Vec::with_capacity(total);

        for (index, frame) in story.frames.iter().enumerate() {
            let number = index + 1;
            let surface = ctx.compositor().composite(frame, number, canvas).await?;
            let png = encode_png(&surface)
                .map_err(|e| StoryreelError::archive_build(format!("frame {number}: {e}")))?;
            pngs.push(png);
            ctx.report(Some(Encoding::Archive), ExportStage::Rendering, number, total);
        }

        ctx.report(Some(Encoding::Archive), ExportStage::Encoding, total, total);
        let mut archive = FrameArchive::new(&self.folder)?;
        for (index, png) in pngs.iter().enumerate() {
            archive.add_frame(index + 1, png)?;
        }
        let entries = archive.entries();
        let bytes = archive.finish()?;
        tracing::info!(entries, bytes = bytes.len(), folder = %self.folder, "Archive built");

        Ok(Artifact::new(
            animation_file_name(&story.sanitized_title(), Encoding::Archive),
            Encoding::Archive.mime_type(),
            bytes,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    use zip::ZipArchive;

    use crate::compositor::FrameCompositor;
    use crate::test_support::{story_with, story_with_broken_frame};

    fn entry_names(bytes: &[u8]) -> Vec<String> {
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        archive.file_names().map(str::to_string).collect()
    }

    #[tokio::test]
    async fn test_archive_holds_one_png_per_frame() {
        let ctx = ExportContext::new(FrameCompositor::default());
        let story = story_with("Flip Book", true, &[(30, 20, 100), (20, 30, 100), (10, 10, 100)]);

        let artifact = ArchiveExporter::default()
            .attempt(&story, CanvasSize::new(48, 48), &ctx)
            .await
            .unwrap();

        assert_eq!(artifact.file_name, "flipbook_frames.zip");
        assert_eq!(artifact.mime_type, "application/zip");

        let mut names = entry_names(&artifact.bytes);
        names.sort();
        assert_eq!(
            names,
            vec![
                "frames/",
                "frames/frame_1.png",
                "frames/frame_2.png",
                "frames/frame_3.png"
            ]
        );

        let mut archive = ZipArchive::new(Cursor::new(artifact.bytes.as_slice())).unwrap();
        let mut png = Vec::new();
        archive
            .by_name("frames/frame_2.png")
            .unwrap()
            .read_to_end(&mut png)
            .unwrap();
        let image = image::load_from_memory(&png).unwrap();
        assert_eq!((image.width(), image.height()), (48, 48));
    }

    #[tokio::test]
    async fn test_archive_is_reproducible() {
        let ctx = ExportContext::new(FrameCompositor::default());
        let story = story_with("Same", true, &[(12, 12, 100); 2]);
        let exporter = ArchiveExporter::default();

        let a = exporter.attempt(&story, CanvasSize::new(16, 16), &ctx).await.unwrap();
        let b = exporter.attempt(&story, CanvasSize::new(16, 16), &ctx).await.unwrap();
        assert_eq!(a.bytes, b.bytes);
    }

    #[tokio::test]
    async fn test_custom_folder_is_normalised() {
        let ctx = ExportContext::new(FrameCompositor::default());
        let story = story_with("Custom", true, &[(8, 8, 100); 2]);

        let exporter = ArchiveExporter::new("/stills/");
        assert_eq!(exporter.folder(), "stills");
        let artifact = exporter.attempt(&story, CanvasSize::new(8, 8), &ctx).await.unwrap();
        assert!(entry_names(&artifact.bytes).contains(&"stills/frame_2.png".to_string()));

        assert_eq!(ArchiveExporter::new("").folder(), DEFAULT_FOLDER);
    }

    #[tokio::test]
    async fn test_broken_frame_fails_archive() {
        let ctx = ExportContext::new(FrameCompositor::default());
        let err = ArchiveExporter::default()
            .attempt(&story_with_broken_frame(3, 1), CanvasSize::new(8, 8), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, StoryreelError::ImageLoad { frame: 2, .. }));
    }
}
