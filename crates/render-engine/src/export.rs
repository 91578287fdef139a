//! Export orchestration: path selection, fallback chain, and reporting.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use storyreel_common::clock::ExportClock;
use storyreel_common::config::ExportDefaults;
use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_story_model::format::CanvasSize;
use storyreel_story_model::request::{Encoding, ExportPath, ExportRequest};
use storyreel_story_model::story::Story;

use crate::archive::ArchiveExporter;
use crate::compositor::FrameCompositor;
use crate::download::{Artifact, DownloadSink};
use crate::gif::GifExporter;
use crate::single::SingleAssetDownloader;
use crate::source::FrameSource;
use crate::video::VideoExporter;

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send + Sync>;

/// Callback for user-facing notices.
pub type NoticeCallback = Box<dyn Fn(&ExportNotice) + Send + Sync>;

/// Export progress report.
#[derive(Debug, Clone)]
pub struct ExportProgress {
    /// Backend currently running, if any.
    pub encoding: Option<Encoding>,

    /// Frames composited so far.
    pub frames_rendered: usize,

    /// Total frames to composite.
    pub total_frames: usize,

    /// Progress fraction (0.0 to 1.0).
    pub progress: f64,

    /// Current stage.
    pub stage: ExportStage,
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,
    Rendering,
    Encoding,
    Delivering,
    Complete,
    Failed,
}

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Informational, the export carries on.
    Info,
    /// Blocking, the export has stopped.
    Error,
}

/// Message surfaced to the user during an export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportNotice {
    pub level: NoticeLevel,
    pub message: String,
}

/// How an export ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExportOutcome {
    /// Artifacts were handed to the download sink.
    Delivered {
        /// Backend that produced the artifact; `None` for stills.
        encoding: Option<Encoding>,
        files: Vec<String>,
    },
    /// The export stopped. `files` lists anything delivered before the failure.
    Failed { error: String, files: Vec<String> },
}

/// Everything the caller learns about one export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub outcome: ExportOutcome,
    pub notices: Vec<ExportNotice>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Shared state handed to every backend attempt.
pub struct ExportContext {
    compositor: FrameCompositor,
    progress: Option<ProgressCallback>,
}

/// One multi-frame encoding backend.
#[async_trait::async_trait]
pub trait ExportStrategy: Send + Sync {
    /// Encoding this backend produces.
    fn encoding(&self) -> Encoding;

    /// Whether the backend can run in this environment.
    fn is_available(&self) -> bool {
        true
    }

    /// Encode every frame of `story` onto `canvas`-sized surfaces.
    async fn attempt(
        &self,
        story: &Story,
        canvas: CanvasSize,
        ctx: &ExportContext,
    ) -> StoryreelResult<Artifact>;
}

/// Top-level export entry point.
pub struct Exporter {
    ctx: ExportContext,
    strategies: Vec<Arc<dyn ExportStrategy>>,
    downloads: Arc<dyn DownloadSink>,
    on_notice: Option<NoticeCallback>,
}

#[derive(Default)]
struct ExportRun {
    notices: Vec<ExportNotice>,
    files: Vec<String>,
}

impl ExportNotice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl ExportReport {
    pub fn is_delivered(&self) -> bool {
        matches!(self.outcome, ExportOutcome::Delivered { .. })
    }
}

impl ExportContext {
    pub fn new(compositor: FrameCompositor) -> Self {
        Self {
            compositor,
            progress: None,
        }
    }

    pub fn compositor(&self) -> &FrameCompositor {
        &self.compositor
    }

    /// Report progress to the registered callback, if any.
    pub fn report(
        &self,
        encoding: Option<Encoding>,
        stage: ExportStage,
        frames_rendered: usize,
        total_frames: usize,
    ) {
        if let Some(cb) = &self.progress {
            let progress = if total_frames == 0 {
                0.0
            } else {
                (frames_rendered as f64 / total_frames as f64).min(1.0)
            };
            cb(ExportProgress {
                encoding,
                frames_rendered,
                total_frames,
                progress,
                stage,
            });
        }
    }
}

fn backend_label(encoding: Encoding) -> &'static str {
    match encoding {
        Encoding::Video => "Video",
        Encoding::Gif => "GIF",
        Encoding::Archive => "Archive",
    }
}

impl Exporter {
    /// Exporter with the default backends: ffmpeg video, GIF, and ZIP archive.
    pub fn new(compositor: FrameCompositor, downloads: Arc<dyn DownloadSink>) -> Self {
        Self {
            ctx: ExportContext::new(compositor),
            strategies: vec![
                Arc::new(VideoExporter::ffmpeg()),
                Arc::new(GifExporter::default()),
                Arc::new(ArchiveExporter::default()),
            ],
            downloads,
            on_notice: None,
        }
    }

    /// Exporter configured from application defaults.
    pub fn from_config(
        config: &ExportDefaults,
        source: FrameSource,
        downloads: Arc<dyn DownloadSink>,
    ) -> StoryreelResult<Self> {
        let compositor = FrameCompositor::new(source, config.background_rgb()?);
        if config.video_fps == 0 {
            return Err(StoryreelError::config("video_fps must be at least 1"));
        }

        Ok(Self::new(compositor, downloads)
            .with_strategy(Arc::new(
                VideoExporter::ffmpeg()
                    .with_fps(config.video_fps)
                    .with_pacing(config.video_pacing),
            ))
            .with_strategy(Arc::new(ArchiveExporter::new(
                config.archive_folder.clone(),
            ))))
    }

    /// Register `strategy`, replacing any backend with the same encoding.
    pub fn with_strategy(mut self, strategy: Arc<dyn ExportStrategy>) -> Self {
        match self
            .strategies
            .iter_mut()
            .find(|s| s.encoding() == strategy.encoding())
        {
            Some(slot) => *slot = strategy,
            None => self.strategies.push(strategy),
        }
        self
    }

    pub fn with_progress(mut self, cb: ProgressCallback) -> Self {
        self.ctx.progress = Some(cb);
        self
    }

    pub fn with_notices(mut self, cb: NoticeCallback) -> Self {
        self.on_notice = Some(cb);
        self
    }

    /// Registered backends and whether each can run here.
    pub fn backends(&self) -> Vec<(Encoding, bool)> {
        self.strategies
            .iter()
            .map(|s| (s.encoding(), s.is_available()))
            .collect()
    }

    fn strategy(&self, encoding: Encoding) -> Option<&Arc<dyn ExportStrategy>> {
        self.strategies.iter().find(|s| s.encoding() == encoding)
    }

    /// Export `story` as described by `request`.
    ///
    /// Never returns an error: every failure is folded into the report as a
    /// blocking notice.
    pub async fn export(&self, story: &Story, request: &ExportRequest) -> ExportReport {
        let clock = ExportClock::start();
        tracing::info!(
            title = %story.title,
            frames = story.frames.len(),
            animation = story.is_animation,
            format = %request.target_format,
            scope = %request.scope,
            encoding = %request.encoding,
            "Starting export"
        );

        let mut run = ExportRun::default();
        let outcome = match self.run(story, request, &mut run).await {
            Ok(encoding) => {
                tracing::info!(
                    files = run.files.len(),
                    elapsed_ms = clock.elapsed_ms(),
                    "Export finished"
                );
                ExportOutcome::Delivered {
                    encoding,
                    files: std::mem::take(&mut run.files),
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "Export failed");
                self.ctx.report(None, ExportStage::Failed, 0, story.frames.len());
                self.notify(&mut run, ExportNotice::error(format!("Export failed: {err}")));
                ExportOutcome::Failed {
                    error: err.to_string(),
                    files: std::mem::take(&mut run.files),
                }
            }
        };

        ExportReport {
            outcome,
            notices: run.notices,
            started_at: clock.started_at(),
            finished_at: Utc::now(),
            elapsed_ms: clock.elapsed_ms(),
        }
    }

    async fn run(
        &self,
        story: &Story,
        request: &ExportRequest,
        run: &mut ExportRun,
    ) -> StoryreelResult<Option<Encoding>> {
        let Some(first) = story.frames.first() else {
            return Err(StoryreelError::invalid_story("story has no frames"));
        };
        let total = story.frames.len();
        let compositor = &self.ctx.compositor;
        let single = SingleAssetDownloader::new(compositor);

        self.ctx.report(None, ExportStage::Preparing, 0, total);

        match request.plan(story) {
            ExportPath::SingleFrame { index } => {
                let frame = story.frames.get(index).ok_or_else(|| {
                    StoryreelError::invalid_request(format!(
                        "frame index {index} is out of range for a story with {total} frames"
                    ))
                })?;
                let canvas = compositor
                    .resolve_canvas(request.target_format, frame, index + 1)
                    .await?;
                tracing::debug!(index, canvas = %canvas, "Exporting single frame");

                let location = single
                    .download(story, index, canvas, self.downloads.as_ref())
                    .await?;
                run.files.push(location);
                self.ctx.report(None, ExportStage::Complete, 1, 1);
                Ok(None)
            }
            ExportPath::EachFrame => {
                let canvas = compositor
                    .resolve_canvas(request.target_format, first, 1)
                    .await?;
                tracing::debug!(canvas = %canvas, "Exporting every frame as a still");

                for index in 0..total {
                    let location = single
                        .download(story, index, canvas, self.downloads.as_ref())
                        .await?;
                    run.files.push(location);
                    self.ctx
                        .report(None, ExportStage::Rendering, index + 1, total);
                }
                self.ctx.report(None, ExportStage::Complete, total, total);
                Ok(None)
            }
            ExportPath::Animated { chain } => {
                let canvas = compositor
                    .resolve_canvas(request.target_format, first, 1)
                    .await?;
                let (encoding, artifact) = self.run_chain(story, canvas, &chain, run).await?;

                self.ctx
                    .report(Some(encoding), ExportStage::Delivering, total, total);
                let location = self.downloads.deliver(&artifact)?;
                run.files.push(location);
                self.ctx
                    .report(Some(encoding), ExportStage::Complete, total, total);
                Ok(Some(encoding))
            }
        }
    }

    /// Try each backend in `chain` until one produces an artifact.
    async fn run_chain(
        &self,
        story: &Story,
        canvas: CanvasSize,
        chain: &[Encoding],
        run: &mut ExportRun,
    ) -> StoryreelResult<(Encoding, Artifact)> {
        let mut attempts = chain.iter().copied().peekable();

        while let Some(encoding) = attempts.next() {
            tracing::info!(backend = %encoding, canvas = %canvas, "Attempting export backend");

            let result = match self.strategy(encoding) {
                Some(strategy) => strategy.attempt(story, canvas, &self.ctx).await,
                None => Err(StoryreelError::encoder_unavailable(
                    encoding.as_str(),
                    "no backend registered",
                )),
            };

            let err = match result {
                Ok(artifact) => {
                    tracing::info!(
                        backend = %encoding,
                        file = %artifact.file_name,
                        bytes = artifact.bytes.len(),
                        "Export backend succeeded"
                    );
                    return Ok((encoding, artifact));
                }
                Err(err) => err,
            };

            match attempts.peek() {
                Some(&next) if err.is_fallback_eligible() => {
                    tracing::warn!(
                        backend = %encoding,
                        next = %next,
                        error = %err,
                        "Export backend failed, falling back"
                    );
                    self.notify(
                        run,
                        ExportNotice::info(format!(
                            "{} export failed ({err}); falling back to {}",
                            backend_label(encoding),
                            backend_label(next)
                        )),
                    );
                }
                _ => return Err(err),
            }
        }

        Err(StoryreelError::invalid_request("no export backend to try"))
    }

    fn notify(&self, run: &mut ExportRun, notice: ExportNotice) {
        if let Some(cb) = &self.on_notice {
            cb(&notice);
        }
        run.notices.push(notice);
    }
}
