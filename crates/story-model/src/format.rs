//! Target format presets and canvas resolution.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Aspect-ratio preset an export is rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    /// Keep the first exported frame's native size.
    #[default]
    Original,
    /// 1:1 square.
    Square,
    /// 9:16 vertical (short-form video).
    Reel,
    /// 16:9 widescreen.
    Landscape,
    /// 4:5 vertical feed post.
    Portrait,
}

/// Pixel dimensions of a destination surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

/// What a target format resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasSpec {
    /// Fixed, format-defined dimensions.
    Fixed(CanvasSize),
    /// Adopt the first exported frame's native dimensions.
    Native,
}

impl CanvasSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for CanvasSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl CanvasSpec {
    /// Dimensions to render into, given the first frame's native size.
    pub fn with_native(self, native: CanvasSize) -> CanvasSize {
        match self {
            CanvasSpec::Fixed(size) => size,
            CanvasSpec::Native => native,
        }
    }
}

impl TargetFormat {
    pub const ALL: [TargetFormat; 5] = [
        TargetFormat::Original,
        TargetFormat::Square,
        TargetFormat::Reel,
        TargetFormat::Landscape,
        TargetFormat::Portrait,
    ];

    /// Resolve the preset to its canvas dimensions.
    pub fn resolve(self) -> CanvasSpec {
        match self {
            TargetFormat::Original => CanvasSpec::Native,
            TargetFormat::Square => CanvasSpec::Fixed(CanvasSize::new(1080, 1080)),
            TargetFormat::Reel => CanvasSpec::Fixed(CanvasSize::new(1080, 1920)),
            TargetFormat::Landscape => CanvasSpec::Fixed(CanvasSize::new(1280, 720)),
            TargetFormat::Portrait => CanvasSpec::Fixed(CanvasSize::new(1080, 1350)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TargetFormat::Original => "original",
            TargetFormat::Square => "square",
            TargetFormat::Reel => "reel",
            TargetFormat::Landscape => "landscape",
            TargetFormat::Portrait => "portrait",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetFormat::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("Unknown format: {s}. Use: original, square, reel, landscape, portrait")
            })
    }
}
