//! Show story information.

use std::path::PathBuf;

use storyreel_render_engine::source::FrameSource;
use storyreel_story_model::format::{CanvasSpec, TargetFormat};
use storyreel_story_model::request::{animation_file_name, frame_file_name, Encoding};
use storyreel_story_model::story::Story;

pub async fn run(path: PathBuf) -> anyhow::Result<()> {
    let story = Story::load(&path).map_err(|e| anyhow::anyhow!("Failed to load story: {e}"))?;
    let stem = story.sanitized_title();
    let source = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => FrameSource::with_base_dir(dir),
        _ => FrameSource::new(),
    };

    println!("Story: {}", story.title);
    println!("  Animation: {}", story.is_animation);
    println!("  Frames: {}", story.frames.len());
    println!(
        "  Total duration: {:.1}s",
        story.frames.total_duration_ms() as f64 / 1000.0
    );
    println!();

    println!("Frames:");
    for (index, frame) in story.frames.iter().enumerate() {
        let source_label = if frame.image_data.starts_with("data:") {
            "inline data".to_string()
        } else {
            frame.image_data.clone()
        };
        let size = match source.native_size(frame, index + 1).await {
            Ok(size) => size.to_string(),
            Err(e) => format!("unreadable: {e}"),
        };
        println!(
            "  {:>3}. order {} for {}ms, {size} ({source_label})",
            index + 1,
            frame.order,
            frame.duration_ms
        );
    }
    println!();

    println!("Formats:");
    for format in TargetFormat::ALL {
        match format.resolve() {
            CanvasSpec::Fixed(size) => println!("  {format}: {size}"),
            CanvasSpec::Native => println!("  {format}: first frame's size"),
        }
    }
    println!();

    println!("Artifacts:");
    if story.is_animation && story.frames.len() > 1 {
        for encoding in Encoding::ALL {
            println!("  {encoding}: {}", animation_file_name(&stem, encoding));
        }
    } else {
        for n in 1..=story.frames.len() {
            println!("  {}", frame_file_name(&stem, n));
        }
    }

    Ok(())
}
