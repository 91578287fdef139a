//! Frame image loading.
//!
//! A frame's `imageData` is a URI-like reference to raster bytes. Three
//! forms are understood:
//! - `data:<mime>;base64,<payload>`
//! - `file:///absolute/path.png`
//! - a plain filesystem path, resolved against the story's directory

use std::path::{Path, PathBuf};

use base64::Engine as _;
use image::RgbaImage;

use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_story_model::format::CanvasSize;
use storyreel_story_model::story::Frame;

/// Resolves and decodes frame images.
#[derive(Debug, Clone, Default)]
pub struct FrameSource {
    base_dir: Option<PathBuf>,
}

impl FrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `dir` (usually the story file's directory).
    pub fn with_base_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(dir.into()),
        }
    }

    /// Load and decode `frame`. `number` is its 1-based position, used in errors.
    pub async fn load(&self, frame: &Frame, number: usize) -> StoryreelResult<RgbaImage> {
        let bytes = self
            .read_bytes(&frame.image_data)
            .await
            .map_err(|message| StoryreelError::image_load(number, message))?;

        let image = image::load_from_memory(&bytes)
            .map_err(|e| StoryreelError::image_load(number, e.to_string()))?
            .to_rgba8();

        if image.width() == 0 || image.height() == 0 {
            return Err(StoryreelError::image_load(number, "image has no pixels"));
        }

        tracing::trace!(
            frame = number,
            width = image.width(),
            height = image.height(),
            "Decoded frame image"
        );
        Ok(image)
    }

    /// Native pixel size of `frame`.
    pub async fn native_size(&self, frame: &Frame, number: usize) -> StoryreelResult<CanvasSize> {
        let image = self.load(frame, number).await?;
        Ok(CanvasSize::new(image.width(), image.height()))
    }

    async fn read_bytes(&self, reference: &str) -> Result<Vec<u8>, String> {
        let reference = reference.trim();
        if let Some(rest) = reference.strip_prefix("data:") {
            return decode_data_uri(rest);
        }

        let path = self.resolve_path(reference);
        tokio::fs::read(&path)
            .await
            .map_err(|e| format!("cannot read {}: {e}", path.display()))
    }

    fn resolve_path(&self, reference: &str) -> PathBuf {
        let raw = reference.strip_prefix("file://").unwrap_or(reference);
        let path = Path::new(raw);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Decode the part of a data URI after `data:`.
fn decode_data_uri(rest: &str) -> Result<Vec<u8>, String> {
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| "malformed data URI: missing ','".to_string())?;

    if !header.split(';').any(|param| param.eq_ignore_ascii_case("base64")) {
        return Err("only base64 data URIs are supported".to_string());
    }

    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("invalid base64 payload: {e}"))
}
