//! Video backend.
//!
//! Each frame is composited once and sampled at a fixed rate while it is on
//! screen. Samples are piped as raw RGBA into a recorder, which by default is
//! an `ffmpeg` child process producing H.264 MP4. Recorder calls block, so
//! they run on the blocking pool and the capture ticker keeps its pace.

use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use image::RgbaImage;
use tokio::time::MissedTickBehavior;

use storyreel_common::clock::{capture_interval, capture_samples};
use storyreel_common::config::VideoPacing;
use storyreel_common::error::{StoryreelError, StoryreelResult};
use storyreel_story_model::format::CanvasSize;
use storyreel_story_model::request::{animation_file_name, Encoding};
use storyreel_story_model::story::Story;

use crate::download::Artifact;
use crate::export::{ExportContext, ExportStage, ExportStrategy};

/// Capture rate used when none is configured.
pub const DEFAULT_FPS: u32 = 30;

const BACKEND: &str = "video";

/// An in-flight recording.
pub trait SurfaceRecorder: Send {
    /// Append one sample of the capture surface.
    fn record(&mut self, surface: &RgbaImage) -> StoryreelResult<()>;

    /// Stop recording and return the encoded container bytes.
    fn finish(self: Box<Self>) -> StoryreelResult<Vec<u8>>;
}

/// Starts recordings.
pub trait RecorderFactory: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    fn start(&self, canvas: CanvasSize, fps: u32) -> StoryreelResult<Box<dyn SurfaceRecorder>>;
}

/// Records through the `ffmpeg` binary on `PATH`.
#[derive(Debug, Clone)]
pub struct FfmpegRecorderFactory {
    binary: String,
}

impl FfmpegRecorderFactory {
    pub fn new() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
        }
    }

    /// Use a specific ffmpeg executable.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfmpegRecorderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RecorderFactory for FfmpegRecorderFactory {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn is_available(&self) -> bool {
        command_exists(&self.binary)
    }

    fn start(&self, canvas: CanvasSize, fps: u32) -> StoryreelResult<Box<dyn SurfaceRecorder>> {
        if !self.is_available() {
            return Err(StoryreelError::encoder_unavailable(
                BACKEND,
                format!("{} not found on PATH", self.binary),
            ));
        }

        let output = temp_output_path();
        let args = ffmpeg_args(canvas, fps, &output);
        tracing::debug!(args = ?args, "Starting ffmpeg recorder");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                StoryreelError::encoder_unavailable(BACKEND, format!("failed to start ffmpeg: {e}"))
            })?;

        tracing::info!(
            pid = child.id(),
            canvas = %canvas,
            fps,
            "ffmpeg recorder started"
        );

        let stdin = child.stdin.take();
        let stderr = child.stderr.take().map(|stderr| {
            std::thread::spawn(move || -> String {
                let mut reader = BufReader::new(stderr);
                let mut output = String::new();
                match reader.read_to_string(&mut output) {
                    Ok(_) => output,
                    Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
                }
            })
        });

        let Some(stdin) = stdin else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(StoryreelError::encoder_unavailable(
                BACKEND,
                "failed to open ffmpeg stdin",
            ));
        };

        Ok(Box::new(FfmpegRecorder {
            child: Some(child),
            stdin: Some(stdin),
            stderr,
            output,
            frame_bytes: canvas.width as usize * canvas.height as usize * 4,
        }))
    }
}

struct FfmpegRecorder {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<String>>,
    output: PathBuf,
    frame_bytes: usize,
}

impl FfmpegRecorder {
    fn stderr_output(&mut self) -> String {
        self.stderr
            .take()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
            })
            .unwrap_or_default()
    }
}

impl SurfaceRecorder for FfmpegRecorder {
    fn record(&mut self, surface: &RgbaImage) -> StoryreelResult<()> {
        let raw = surface.as_raw();
        if raw.len() != self.frame_bytes {
            return Err(StoryreelError::encoder_runtime(
                BACKEND,
                format!(
                    "surface is {} bytes, recorder expects {}",
                    raw.len(),
                    self.frame_bytes
                ),
            ));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| StoryreelError::encoder_runtime(BACKEND, "recorder already stopped"))?;
        stdin
            .write_all(raw)
            .map_err(|e| StoryreelError::encoder_runtime(BACKEND, format!("ffmpeg pipe: {e}")))
    }

    fn finish(mut self: Box<Self>) -> StoryreelResult<Vec<u8>> {
        // Closing stdin signals end of stream.
        drop(self.stdin.take());

        let mut child = self
            .child
            .take()
            .ok_or_else(|| StoryreelError::encoder_runtime(BACKEND, "recorder already stopped"))?;
        let status = child
            .wait()
            .map_err(|e| StoryreelError::encoder_runtime(BACKEND, format!("wait on ffmpeg: {e}")))?;
        let stderr_output = self.stderr_output();

        if !status.success() {
            return Err(StoryreelError::encoder_runtime(
                BACKEND,
                format!("ffmpeg exited with {status}: {}", stderr_output.trim()),
            ));
        }

        let bytes = std::fs::read(&self.output).map_err(|e| {
            StoryreelError::encoder_runtime(BACKEND, format!("read ffmpeg output: {e}"))
        })?;
        if bytes.is_empty() {
            return Err(StoryreelError::encoder_runtime(BACKEND, "ffmpeg produced no output"));
        }
        Ok(bytes)
    }
}

impl Drop for FfmpegRecorder {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        let _ = self.stderr_output();
        let _ = std::fs::remove_file(&self.output);
    }
}

/// ffmpeg arguments that encode raw RGBA from stdin into `output`.
///
/// yuv420p needs even dimensions, so odd canvases are padded by one pixel.
pub fn ffmpeg_args(canvas: CanvasSize, fps: u32, output: &std::path::Path) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgba".into(),
        "-s".into(),
        format!("{}x{}", canvas.width, canvas.height),
        "-r".into(),
        fps.max(1).to_string(),
        "-i".into(),
        "pipe:0".into(),
        "-vf".into(),
        "pad=ceil(iw/2)*2:ceil(ih/2)*2".into(),
        "-c:v".into(),
        "libx264".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-movflags".into(),
        "+faststart".into(),
        "-f".into(),
        "mp4".into(),
        output.display().to_string(),
    ]
}

fn temp_output_path() -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("storyreel-{}-{n}.mp4", std::process::id()))
}

fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Samples the capture surface into a recorder.
pub struct VideoExporter {
    recorders: Arc<dyn RecorderFactory>,
    fps: u32,
    pacing: VideoPacing,
}

impl VideoExporter {
    pub fn new(recorders: Arc<dyn RecorderFactory>) -> Self {
        Self {
            recorders,
            fps: DEFAULT_FPS,
            pacing: VideoPacing::default(),
        }
    }

    pub fn ffmpeg() -> Self {
        Self::new(Arc::new(FfmpegRecorderFactory::new()))
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }

    pub fn with_pacing(mut self, pacing: VideoPacing) -> Self {
        self.pacing = pacing;
        self
    }
}

fn join_failed(e: tokio::task::JoinError) -> StoryreelError {
    StoryreelError::encoder_runtime(BACKEND, format!("recorder task: {e}"))
}

/// Append one sample on the blocking pool, handing the recorder back.
///
/// On error the recorder is dropped, which stops it.
async fn record_sample(
    mut recorder: Box<dyn SurfaceRecorder>,
    surface: Arc<RgbaImage>,
) -> StoryreelResult<Box<dyn SurfaceRecorder>> {
    tokio::task::spawn_blocking(move || -> StoryreelResult<Box<dyn SurfaceRecorder>> {
        recorder.record(&surface)?;
        Ok(recorder)
    })
    .await
    .map_err(join_failed)?
}

async fn finish_recording(recorder: Box<dyn SurfaceRecorder>) -> StoryreelResult<Vec<u8>> {
    tokio::task::spawn_blocking(move || recorder.finish())
        .await
        .map_err(join_failed)?
}

#[async_trait::async_trait]
impl ExportStrategy for VideoExporter {
    fn encoding(&self) -> Encoding {
        Encoding::Video
    }

    fn is_available(&self) -> bool {
        self.recorders.is_available()
    }

    async fn attempt(
        &self,
        story: &Story,
        canvas: CanvasSize,
        ctx: &ExportContext,
    ) -> StoryreelResult<Artifact> {
        let total = story.frames.len();
        let mut recorder = self.recorders.start(canvas, self.fps)?;

        let mut ticker = tokio::time::interval(capture_interval(self.fps));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut samples_written = 0u64;
        for (index, frame) in story.frames.iter().enumerate() {
            let surface = Arc::new(ctx.compositor().composite(frame, index + 1, canvas).await?);

            for _ in 0..capture_samples(frame.duration_ms, self.fps) {
                if self.pacing == VideoPacing::Realtime {
                    ticker.tick().await;
                }
                recorder = record_sample(recorder, surface.clone()).await?;
                samples_written += 1;
            }
            ctx.report(Some(Encoding::Video), ExportStage::Rendering, index + 1, total);
        }

        ctx.report(Some(Encoding::Video), ExportStage::Encoding, total, total);
        let bytes = finish_recording(recorder).await?;

        tracing::info!(
            recorder = self.recorders.name(),
            samples = samples_written,
            fps = self.fps,
            bytes = bytes.len(),
            "Video recording finished"
        );

        Ok(Artifact::new(
            animation_file_name(&story.sanitized_title(), Encoding::Video),
            Encoding::Video.mime_type(),
            bytes,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::compositor::FrameCompositor;
    use crate::test_support::{story_with, story_with_broken_frame};
    use crate::watermark::watermark_bounds;

    #[derive(Default)]
    struct Tape {
        samples: Vec<[u8; 4]>,
        watermarked: Vec<bool>,
        finished: bool,
        canvas: Option<CanvasSize>,
    }

    /// True when the surface differs from its top-left pixel only inside the
    /// watermark box, and somewhere inside it does.
    fn carries_watermark(surface: &RgbaImage) -> bool {
        let bounds = watermark_bounds(surface.width(), surface.height());
        let base = *surface.get_pixel(0, 0);
        let mut stamped = false;
        for (x, y, pixel) in surface.enumerate_pixels() {
            if *pixel != base {
                if !bounds.contains(x, y) {
                    return false;
                }
                stamped = true;
            }
        }
        stamped
    }

    /// Records the top-left pixel of every sample and whether it is stamped.
    struct TapeRecorder(Arc<Mutex<Tape>>);

    impl SurfaceRecorder for TapeRecorder {
        fn record(&mut self, surface: &RgbaImage) -> StoryreelResult<()> {
            let mut tape = self.0.lock().unwrap();
            tape.samples.push(surface.get_pixel(0, 0).0);
            tape.watermarked.push(carries_watermark(surface));
            Ok(())
        }

        fn finish(self: Box<Self>) -> StoryreelResult<Vec<u8>> {
            self.0.lock().unwrap().finished = true;
            Ok(b"fake-mp4".to_vec())
        }
    }

    struct TapeFactory {
        tape: Arc<Mutex<Tape>>,
        available: bool,
    }

    impl TapeFactory {
        fn new(available: bool) -> Self {
            Self {
                tape: Arc::default(),
                available,
            }
        }
    }

    impl RecorderFactory for TapeFactory {
        fn name(&self) -> &str {
            "tape"
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn start(&self, canvas: CanvasSize, _fps: u32) -> StoryreelResult<Box<dyn SurfaceRecorder>> {
            if !self.available {
                return Err(StoryreelError::encoder_unavailable(BACKEND, "no tape"));
            }
            self.tape.lock().unwrap().canvas = Some(canvas);
            Ok(Box::new(TapeRecorder(self.tape.clone())))
        }
    }

    fn ctx() -> ExportContext {
        ExportContext::new(FrameCompositor::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_realtime_holds_each_frame_for_its_duration() {
        let factory = Arc::new(TapeFactory::new(true));
        let tape = factory.tape.clone();
        let exporter = VideoExporter::new(factory).with_fps(30);
        let story = story_with("Bounce", true, &[(16, 16, 800); 5]);

        let start = tokio::time::Instant::now();
        let artifact = exporter
            .attempt(&story, CanvasSize::new(16, 16), &ctx())
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(artifact.file_name, "bounce.mp4");
        assert_eq!(artifact.mime_type, "video/mp4");
        let tape = tape.lock().unwrap();
        assert!(tape.finished);
        assert_eq!(tape.samples.len(), 5 * 24);
        // First tick fires immediately, so one interval short of 4s.
        assert!(elapsed.as_millis() >= 3900, "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_pacing_does_not_wait() {
        let factory = Arc::new(TapeFactory::new(true));
        let tape = factory.tape.clone();
        let exporter = VideoExporter::new(factory)
            .with_fps(10)
            .with_pacing(VideoPacing::Offline);
        let story = story_with("Quick", true, &[(8, 8, 1000), (8, 8, 20)]);

        let start = tokio::time::Instant::now();
        exporter
            .attempt(&story, CanvasSize::new(8, 8), &ctx())
            .await
            .unwrap();

        assert_eq!(start.elapsed().as_millis(), 0);
        let tape = tape.lock().unwrap();
        // 10 samples for the first frame, and the short frame still gets one.
        assert_eq!(tape.samples.len(), 11);
        assert_ne!(tape.samples[9], tape.samples[10]);
        assert_eq!(tape.canvas, Some(CanvasSize::new(8, 8)));
    }

    #[tokio::test]
    async fn test_every_sample_carries_the_watermark() {
        let factory = Arc::new(TapeFactory::new(true));
        let tape = factory.tape.clone();
        let exporter = VideoExporter::new(factory)
            .with_fps(10)
            .with_pacing(VideoPacing::Offline);
        let story = story_with("Stamped", true, &[(240, 120, 300), (240, 120, 200)]);

        exporter
            .attempt(&story, CanvasSize::new(240, 120), &ctx())
            .await
            .unwrap();

        let tape = tape.lock().unwrap();
        assert_eq!(tape.watermarked.len(), 5);
        assert!(tape.watermarked.iter().all(|&stamped| stamped));
    }

    /// Fails on the given sample, counting from zero.
    struct FailingRecorder {
        fail_at: usize,
        recorded: usize,
    }

    impl SurfaceRecorder for FailingRecorder {
        fn record(&mut self, _surface: &RgbaImage) -> StoryreelResult<()> {
            if self.recorded == self.fail_at {
                return Err(StoryreelError::encoder_runtime(BACKEND, "pipe closed"));
            }
            self.recorded += 1;
            Ok(())
        }

        fn finish(self: Box<Self>) -> StoryreelResult<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    struct FailingFactory;

    impl RecorderFactory for FailingFactory {
        fn name(&self) -> &str {
            "failing"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn start(&self, _canvas: CanvasSize, _fps: u32) -> StoryreelResult<Box<dyn SurfaceRecorder>> {
            Ok(Box::new(FailingRecorder {
                fail_at: 3,
                recorded: 0,
            }))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recorder_failure_on_blocking_pool_is_runtime_error() {
        let exporter = VideoExporter::new(Arc::new(FailingFactory));
        let story = story_with("Cut", true, &[(8, 8, 500)]);

        let err = exporter
            .attempt(&story, CanvasSize::new(8, 8), &ctx())
            .await
            .unwrap_err();

        assert!(matches!(err, StoryreelError::EncoderRuntime { .. }));
        assert!(err.is_fallback_eligible());
    }

    #[tokio::test]
    async fn test_unavailable_recorder_is_fallback_eligible() {
        let exporter = VideoExporter::new(Arc::new(TapeFactory::new(false)));
        assert!(!ExportStrategy::is_available(&exporter));

        let story = story_with("Nope", true, &[(8, 8, 100); 2]);
        let err = exporter
            .attempt(&story, CanvasSize::new(8, 8), &ctx())
            .await
            .unwrap_err();
        assert!(err.is_fallback_eligible());
    }

    #[tokio::test(start_paused = true)]
    async fn test_broken_frame_aborts_recording() {
        let factory = Arc::new(TapeFactory::new(true));
        let tape = factory.tape.clone();
        let exporter = VideoExporter::new(factory).with_pacing(VideoPacing::Offline);
        let story = story_with_broken_frame(3, 2);

        let err = exporter
            .attempt(&story, CanvasSize::new(16, 16), &ctx())
            .await
            .unwrap_err();

        assert!(matches!(err, StoryreelError::ImageLoad { frame: 3, .. }));
        assert!(!tape.lock().unwrap().finished);
    }

    #[test]
    fn test_ffmpeg_args_describe_raw_rgba_input() {
        let args = ffmpeg_args(CanvasSize::new(1080, 1920), 30, std::path::Path::new("/tmp/out.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pix_fmt rgba -s 1080x1920 -r 30 -i pipe:0"));
        assert!(joined.contains("-c:v libx264 -pix_fmt yuv420p"));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out.mp4"));
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let factory = FfmpegRecorderFactory::with_binary("storyreel-no-such-ffmpeg");
        assert!(!factory.is_available());
        let err = factory.start(CanvasSize::new(8, 8), 30).err().unwrap();
        assert!(matches!(err, StoryreelError::EncoderUnavailable { .. }));
    }

    #[test]
    fn test_temp_outputs_are_unique() {
        assert_ne!(temp_output_path(), temp_output_path());
    }
}
