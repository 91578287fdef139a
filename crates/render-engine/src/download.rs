//! Artifact hand-off.
//!
//! The pipeline ends by handing exactly one binary artifact (or one per
//! frame for stills) to a [`DownloadSink`].

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use storyreel_common::error::{StoryreelError, StoryreelResult};

/// A finished export ready for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

/// Receives finished artifacts.
pub trait DownloadSink: Send + Sync {
    /// Deliver `artifact`, returning where it ended up.
    fn deliver(&self, artifact: &Artifact) -> StoryreelResult<String>;
}

/// Writes artifacts into a directory.
#[derive(Debug, Clone)]
pub struct DirectoryDownloads {
    dir: PathBuf,
}

impl DirectoryDownloads {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectoryDownloads {
    fn deliver(&self, artifact: &Artifact) -> StoryreelResult<String> {
        let fail = |e: std::io::Error| StoryreelError::download(&artifact.file_name, e.to_string());

        std::fs::create_dir_all(&self.dir).map_err(fail)?;
        let path = self.dir.join(&artifact.file_name);
        std::fs::write(&path, &artifact.bytes).map_err(fail)?;

        tracing::info!(
            path = %path.display(),
            bytes = artifact.bytes.len(),
            mime = %artifact.mime_type,
            "Artifact downloaded"
        );
        Ok(path.display().to_string())
    }
}

/// Keeps artifacts in memory, in delivery order.
#[derive(Debug, Default)]
pub struct MemoryDownloads {
    artifacts: Mutex<Vec<Artifact>>,
}

impl MemoryDownloads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artifacts(&self) -> Vec<Artifact> {
        self.artifacts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn file_names(&self) -> Vec<String> {
        self.artifacts()
            .into_iter()
            .map(|artifact| artifact.file_name)
            .collect()
    }
}

impl DownloadSink for MemoryDownloads {
    fn deliver(&self, artifact: &Artifact) -> StoryreelResult<String> {
        self.artifacts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(artifact.clone());
        Ok(artifact.file_name.clone())
    }
}
