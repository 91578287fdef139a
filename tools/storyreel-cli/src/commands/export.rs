//! Export a story.

use std::path::PathBuf;
use std::sync::Arc;

use storyreel_common::config::AppConfig;
use storyreel_render_engine::download::DirectoryDownloads;
use storyreel_render_engine::source::FrameSource;
use storyreel_render_engine::{ExportOutcome, ExportProgress, ExportStage, Exporter, NoticeLevel};
use storyreel_story_model::format::TargetFormat;
use storyreel_story_model::request::{Encoding, ExportRequest, ExportScope};
use storyreel_story_model::story::Story;

pub struct ExportArgs {
    pub path: PathBuf,
    pub format: String,
    pub scope: String,
    pub index: usize,
    pub encoding: String,
    pub json: bool,
}

pub async fn run(config: &AppConfig, args: ExportArgs) -> anyhow::Result<()> {
    let target_format: TargetFormat = args.format.parse().map_err(anyhow::Error::msg)?;
    let scope: ExportScope = args.scope.parse().map_err(anyhow::Error::msg)?;
    let encoding: Encoding = args.encoding.parse().map_err(anyhow::Error::msg)?;

    let story =
        Story::load(&args.path).map_err(|e| anyhow::anyhow!("Failed to load story: {e}"))?;

    let request = ExportRequest {
        target_format,
        scope,
        encoding,
        current_index: args.index,
    };

    let source = match args.path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => FrameSource::with_base_dir(dir),
        _ => FrameSource::new(),
    };
    let downloads = Arc::new(DirectoryDownloads::new(&config.output_dir));

    if !args.json {
        println!("Exporting story: {}", story.title);
        println!("  Frames: {}", story.frames.len());
        println!("  Format: {target_format}");
        println!("  Scope: {scope}");
        if story.is_animation {
            println!("  Encoding: {encoding}");
        }
        println!("  Output: {}", downloads.dir().display());
    }

    let quiet = args.json;
    let progress_cb: Box<dyn Fn(ExportProgress) + Send + Sync> = Box::new(move |p| {
        if quiet || p.stage != ExportStage::Rendering {
            return;
        }
        let backend = p.encoding.map(|e| e.to_string()).unwrap_or_else(|| "png".into());
        print!(
            "\r  [{backend}] {:.0}% ({}/{} frames)  ",
            p.progress * 100.0,
            p.frames_rendered,
            p.total_frames,
        );
    });

    let exporter = Exporter::from_config(&config.export, source, downloads)?
        .with_progress(progress_cb)
        .with_notices(Box::new(move |notice| {
            if quiet {
                return;
            }
            match notice.level {
                NoticeLevel::Info => println!("\n  {}", notice.message),
                NoticeLevel::Error => eprintln!("\n  {}", notice.message),
            }
        }));

    let report = exporter.export(&story, &request).await;
    tracing::debug!(elapsed_ms = report.elapsed_ms, "Export report ready");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    match report.outcome {
        ExportOutcome::Delivered { files, .. } => {
            if !args.json {
                println!("\nExport complete:");
                for file in &files {
                    println!("  {file}");
                }
            }
            Ok(())
        }
        ExportOutcome::Failed { error, files } => {
            if !args.json && !files.is_empty() {
                println!("\nDelivered before the failure:");
                for file in &files {
                    println!("  {file}");
                }
            }
            Err(anyhow::anyhow!("Export failed: {error}"))
        }
    }
}
