//! Story documents and their frame sequences.
//!
//! A story is the unit handed to the exporter: a title, whether it plays
//! as an animation, and the frames themselves. The on-disk form is JSON
//! with camelCase keys.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level story document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    /// Human-readable title, used to derive artifact file names.
    pub title: String,

    /// Whether the frames form an animation rather than a set of stills.
    #[serde(default)]
    pub is_animation: bool,

    /// Frames in playback order.
    pub frames: FrameSequence,
}

/// A single timed raster frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    /// Playback position. Unique within a sequence.
    pub order: i64,

    /// Reference to the raster bytes (`data:` URI, `file://` URI, or path).
    pub image_data: String,

    /// How long the frame is shown, in milliseconds.
    pub duration_ms: u64,
}

/// Frames sorted ascending by `order`.
///
/// Construction validates the sequence; once built it is immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Frame>", into = "Vec<Frame>")]
pub struct FrameSequence {
    frames: Vec<Frame>,
}

impl FrameSequence {
    /// Build a sequence, sorting by `order`.
    pub fn new(mut frames: Vec<Frame>) -> Result<Self, StoryError> {
        let mut seen = HashSet::with_capacity(frames.len());
        for frame in &frames {
            if !seen.insert(frame.order) {
                return Err(StoryError::ValidationError {
                    message: format!("duplicate frame order {}", frame.order),
                });
            }
            if frame.duration_ms == 0 {
                return Err(StoryError::ValidationError {
                    message: format!("frame {} has a zero duration", frame.order),
                });
            }
        }

        frames.sort_by_key(|f| f.order);
        Ok(Self { frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn first(&self) -> Option<&Frame> {
        self.frames.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    pub fn as_slice(&self) -> &[Frame] {
        &self.frames
    }

    /// Sum of all frame durations (the animation's playback length).
    pub fn total_duration_ms(&self) -> u64 {
        self.frames.iter().map(|f| f.duration_ms).sum()
    }
}

impl TryFrom<Vec<Frame>> for FrameSequence {
    type Error = StoryError;

    fn try_from(frames: Vec<Frame>) -> Result<Self, Self::Error> {
        Self::new(frames)
    }
}

impl From<FrameSequence> for Vec<Frame> {
    fn from(sequence: FrameSequence) -> Self {
        sequence.frames
    }
}

impl<'a> IntoIterator for &'a FrameSequence {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

impl Story {
    pub fn new(title: impl Into<String>, is_animation: bool, frames: FrameSequence) -> Self {
        Self {
            title: title.into(),
            is_animation,
            frames,
        }
    }

    /// Parse a story from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a story document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoryError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| StoryError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&content).map_err(|e| StoryError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Title reduced to `[a-z0-9]`, used as the stem of every artifact name.
    pub fn sanitized_title(&self) -> String {
        sanitize_title(&self.title)
    }
}

/// Strip every character outside `[a-z0-9]` (case-insensitive) and lowercase.
///
/// A title with no usable characters gives an empty stem.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Errors that can occur when reading stories.
#[derive(Debug, thiserror::Error)]
pub enum StoryError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid story: {message}")]
    ValidationError { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frame(order: i64, duration_ms: u64) -> Frame {
        Frame {
            order,
            image_data: format!("frame{order}.png"),
            duration_ms,
        }
    }

    #[test]
    fn test_sequence_sorts_by_order() {
        let seq = FrameSequence::new(vec![frame(3, 100), frame(-1, 100), frame(2, 100)]).unwrap();
        let orders: Vec<i64> = seq.iter().map(|f| f.order).collect();
        assert_eq!(orders, vec![-1, 2, 3]);
    }

    #[test]
    fn test_sequence_rejects_duplicate_order() {
        let err = FrameSequence::new(vec![frame(1, 100), frame(1, 200)]).unwrap_err();
        assert!(err.to_string().contains("duplicate frame order 1"));
    }

    #[test]
    fn test_sequence_rejects_zero_duration() {
        assert!(FrameSequence::new(vec![frame(1, 0)]).is_err());
    }

    #[test]
    fn test_total_duration() {
        let seq = FrameSequence::new((0..5).map(|i| frame(i, 800)).collect()).unwrap();
        assert_eq!(seq.total_duration_ms(), 4000);
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("My Cool Story!"), "mycoolstory");
        assert_eq!(sanitize_title("Épisode 2: Zoë"), "pisode2zo");
    }

    #[test]
    fn test_title_without_usable_characters_gives_empty_stem() {
        assert_eq!(sanitize_title("___"), "");
        assert_eq!(sanitize_title("!!!"), "");
        assert_eq!(sanitize_title(""), "");
    }

    #[test]
    fn test_story_json_uses_camel_case() {
        let json = r#"{
            "title": "Walk Cycle",
            "isAnimation": true,
            "frames": [
                {"order": 2, "imageData": "b.png", "durationMs": 120},
                {"order": 1, "imageData": "a.png", "durationMs": 80}
            ]
        }"#;
        let story = Story::from_json(json).unwrap();
        assert!(story.is_animation);
        assert_eq!(story.frames.len(), 2);
        assert_eq!(story.frames.first().unwrap().image_data, "a.png");

        let round = serde_json::to_value(&story).unwrap();
        assert_eq!(round["frames"][0]["durationMs"], 80);
    }

    #[test]
    fn test_story_json_rejects_invalid_sequence() {
        let json = r#"{"title":"x","frames":[{"order":1,"imageData":"a","durationMs":0}]}"#;
        let err = Story::from_json(json).unwrap_err();
        assert!(err.to_string().contains("zero duration"));
    }

    #[test]
    fn test_story_load_reports_path() {
        let dir = std::env::temp_dir().join("storyreel_test_story_load");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let path = dir.join("story.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = Story::load(&path).unwrap_err();
        assert!(matches!(err, StoryError::ParseError { .. }));

        std::fs::remove_dir_all(&dir).ok();
    }

    proptest! {
        #[test]
        fn prop_sanitized_title_is_lowercase_alphanumeric(title in ".{0,40}") {
            let stem = sanitize_title(&title);
            let expected: String = title
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .collect::<String>()
                .to_ascii_lowercase();
            prop_assert_eq!(&stem, &expected);
            prop_assert!(stem
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        }

        #[test]
        fn prop_sequence_is_sorted_whatever_the_input_order(
            orders in prop::collection::hash_set(-1000i64..1000, 1..20)
        ) {
            let frames = orders.iter().map(|&o| frame(o, 100)).collect();
            let seq = FrameSequence::new(frames).unwrap();
            prop_assert_eq!(seq.len(), orders.len());
            prop_assert!(seq.as_slice().windows(2).all(|w| w[0].order < w[1].order));
        }
    }
}
