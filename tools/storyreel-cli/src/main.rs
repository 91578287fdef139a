//! StoryReel CLI: command-line interface for inspecting and exporting stories.
//!
//! Usage:
//!   storyreel export <STORY>    Export a story as stills, video, GIF, or ZIP
//!   storyreel info <STORY>      Show story information
//!   storyreel check             Check export backends and configuration
//!   storyreel config [--init]   Show or create the config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use storyreel_common::config::{AppConfig, VideoPacing};

mod commands;

#[derive(Parser)]
#[command(
    name = "storyreel",
    about = "Export animated stories as stills, video, GIF, or frame archives",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a story
    Export {
        /// Path to the story JSON file
        path: PathBuf,

        /// Target format: original|square|reel|landscape|portrait
        #[arg(short, long, default_value = "original")]
        format: String,

        /// Which frames to export: all|current
        #[arg(long, default_value = "all")]
        scope: String,

        /// Zero-based frame index used with --scope current
        #[arg(long, default_value = "0")]
        index: usize,

        /// Preferred encoding for animations: video|gif|archive
        #[arg(short, long, default_value = "video")]
        encoding: String,

        /// Download directory (defaults to the configured output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Letterbox colour as #rrggbb
        #[arg(long)]
        background: Option<String>,

        /// Video capture rate
        #[arg(long)]
        fps: Option<u32>,

        /// Encode video without waiting out each frame's duration
        #[arg(long)]
        offline: bool,

        /// Print the export report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show story information
    Info {
        /// Path to the story JSON file
        path: PathBuf,
    },

    /// Check export backends and configuration
    Check,

    /// Show the config file, or create it with defaults
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load();

    // Initialize logging
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    storyreel_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Export {
            path,
            format,
            scope,
            index,
            encoding,
            output,
            background,
            fps,
            offline,
            json,
        } => {
            if let Some(background) = background {
                config.export.background = background;
            }
            if let Some(fps) = fps {
                config.export.video_fps = fps;
            }
            if offline {
                config.export.video_pacing = VideoPacing::Offline;
            }
            if let Some(output) = output {
                config.output_dir = output;
            }

            commands::export::run(
                &config,
                commands::export::ExportArgs {
                    path,
                    format,
                    scope,
                    index,
                    encoding,
                    json,
                },
            )
            .await
        }
        Commands::Info { path } => commands::info::run(path).await,
        Commands::Check => commands::check::run(&config),
        Commands::Config { init } => commands::config::run(&config, init),
    }
}
