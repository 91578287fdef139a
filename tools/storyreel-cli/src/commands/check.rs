//! Check export backends and configuration.

use std::sync::Arc;

use storyreel_common::config::AppConfig;
use storyreel_render_engine::download::MemoryDownloads;
use storyreel_render_engine::source::FrameSource;
use storyreel_render_engine::Exporter;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("StoryReel System Check");
    println!("{}", "=".repeat(50));

    let exporter = match Exporter::from_config(
        &config.export,
        FrameSource::new(),
        Arc::new(MemoryDownloads::new()),
    ) {
        Ok(exporter) => {
            println!("[OK] Export configuration");
            exporter
        }
        Err(e) => {
            println!("[FAIL] Export configuration: {e}");
            return Ok(());
        }
    };

    println!(
        "     background {} / video {}fps ({:?}) / archive folder {:?}",
        config.export.background,
        config.export.video_fps,
        config.export.video_pacing,
        config.export.archive_folder
    );
    println!("     output dir: {}", config.output_dir.display());

    println!();
    let mut all_ok = true;
    for (encoding, available) in exporter.backends() {
        if available {
            println!("[OK] {encoding} backend");
        } else {
            all_ok = false;
            println!("[WARN] {encoding} backend unavailable");
        }
    }

    println!();
    if all_ok {
        println!("All export backends are available.");
    } else {
        println!("Unavailable backends are skipped through the fallback chain.");
        println!("Install ffmpeg (with libx264) to enable video export.");
    }

    Ok(())
}
