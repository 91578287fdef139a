//! Error types shared across StoryReel crates.

/// Top-level error type for StoryReel operations.
#[derive(Debug, thiserror::Error)]
pub enum StoryreelError {
    #[error("Failed to load image for frame {frame}: {message}")]
    ImageLoad { frame: usize, message: String },

    #[error("{backend} encoder unavailable: {message}")]
    EncoderUnavailable { backend: String, message: String },

    #[error("{backend} encoder failed: {message}")]
    EncoderRuntime { backend: String, message: String },

    #[error("Archive build failed: {message}")]
    ArchiveBuild { message: String },

    #[error("Invalid story: {message}")]
    InvalidStory { message: String },

    #[error("Invalid export request: {message}")]
    InvalidRequest { message: String },

    #[error("Download failed for {file_name}: {message}")]
    Download { file_name: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using StoryreelError.
pub type StoryreelResult<T> = Result<T, StoryreelError>;

impl StoryreelError {
    /// `frame` is the 1-based position of the frame in the exported sequence.
    pub fn image_load(frame: usize, msg: impl Into<String>) -> Self {
        Self::ImageLoad {
            frame,
            message: msg.into(),
        }
    }

    pub fn encoder_unavailable(backend: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::EncoderUnavailable {
            backend: backend.into(),
            message: msg.into(),
        }
    }

    pub fn encoder_runtime(backend: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::EncoderRuntime {
            backend: backend.into(),
            message: msg.into(),
        }
    }

    pub fn archive_build(msg: impl Into<String>) -> Self {
        Self::ArchiveBuild {
            message: msg.into(),
        }
    }

    pub fn invalid_story(msg: impl Into<String>) -> Self {
        Self::InvalidStory {
            message: msg.into(),
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: msg.into(),
        }
    }

    pub fn download(file_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Download {
            file_name: file_name.into(),
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether the export fallback chain may move on to the next backend.
    ///
    /// Only encoder capability and encoder runtime failures qualify. Image
    /// decode failures would repeat identically in every backend.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            Self::EncoderUnavailable { .. } | Self::EncoderRuntime { .. }
        )
    }
}
