//! Export requests, path selection, and artifact naming.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::format::TargetFormat;
use crate::story::Story;

/// Which frames an export covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportScope {
    #[default]
    All,
    Current,
}

/// Multi-frame encoding backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Video,
    Gif,
    Archive,
}

/// Options for one export invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub target_format: TargetFormat,
    pub scope: ExportScope,
    /// Only consulted for animated, multi-frame, all-frames exports.
    pub encoding: Encoding,
    /// Zero-based frame index used when `scope` is `Current`.
    #[serde(default)]
    pub current_index: usize,
}

/// The route an export takes through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportPath {
    /// Export exactly one frame as a still image.
    SingleFrame { index: usize },
    /// Export every frame as its own still image.
    EachFrame,
    /// Encode the whole sequence, trying backends in order.
    Animated { chain: Vec<Encoding> },
}

impl Encoding {
    pub const ALL: [Encoding; 3] = [Encoding::Video, Encoding::Gif, Encoding::Archive];

    /// File extension of the produced artifact.
    pub fn extension(self) -> &'static str {
        match self {
            Encoding::Video => "mp4",
            Encoding::Gif => "gif",
            Encoding::Archive => "zip",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Encoding::Video => "video/mp4",
            Encoding::Gif => "image/gif",
            Encoding::Archive => "application/zip",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Video => "video",
            Encoding::Gif => "gif",
            Encoding::Archive => "archive",
        }
    }

    /// Backends tried, in order, when this encoding is requested.
    ///
    /// Video falls back to GIF, GIF falls back to the archive, and the
    /// archive is last.
    pub fn fallback_chain(self) -> Vec<Encoding> {
        let start = Encoding::ALL
            .iter()
            .position(|e| *e == self)
            .unwrap_or_default();
        Encoding::ALL[start..].to_vec()
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" | "mp4" => Ok(Encoding::Video),
            "gif" => Ok(Encoding::Gif),
            "archive" | "zip" => Ok(Encoding::Archive),
            _ => Err(format!("Unknown encoding: {s}. Use: video, gif, archive")),
        }
    }
}

impl fmt::Display for ExportScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportScope::All => "all",
            ExportScope::Current => "current",
        })
    }
}

impl FromStr for ExportScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(ExportScope::All),
            "current" => Ok(ExportScope::Current),
            _ => Err(format!("Unknown scope: {s}. Use: all, current")),
        }
    }
}

impl ExportRequest {
    /// Export every frame with the given encoding.
    pub fn all(target_format: TargetFormat, encoding: Encoding) -> Self {
        Self {
            target_format,
            scope: ExportScope::All,
            encoding,
            current_index: 0,
        }
    }

    /// Export only the frame at `index`.
    pub fn current(target_format: TargetFormat, index: usize) -> Self {
        Self {
            target_format,
            scope: ExportScope::Current,
            encoding: Encoding::default(),
            current_index: index,
        }
    }

    /// Decide which route the export takes for `story`.
    ///
    /// `Current` always exports a single still. `All` on an animation with
    /// more than one frame goes through the encoder chain; a single frame or
    /// a non-animation is exported frame by frame.
    pub fn plan(&self, story: &Story) -> ExportPath {
        match self.scope {
            ExportScope::Current => ExportPath::SingleFrame {
                index: self.current_index,
            },
            ExportScope::All if story.frames.len() <= 1 => ExportPath::SingleFrame { index: 0 },
            ExportScope::All if story.is_animation => ExportPath::Animated {
                chain: self.encoding.fallback_chain(),
            },
            ExportScope::All => ExportPath::EachFrame,
        }
    }
}

/// `{stem}_frame_{n}.png`, with `n` 1-based.
pub fn frame_file_name(stem: &str, number: usize) -> String {
    format!("{stem}_frame_{number}.png")
}

/// Archive entry name for the frame at 1-based `number`.
pub fn archive_entry_name(folder: &str, number: usize) -> String {
    format!("{folder}/frame_{number}.png")
}

/// Name of the artifact produced by an animated encoding.
pub fn animation_file_name(stem: &str, encoding: Encoding) -> String {
    match encoding {
        Encoding::Archive => format!("{stem}_frames.{}", encoding.extension()),
        _ => format!("{stem}.{}", encoding.extension()),
    }
}
