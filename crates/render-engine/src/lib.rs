//! StoryReel Render Engine
//!
//! Turns a story's frame sequence into one downloadable artifact. Every
//! frame is composited onto a canvas sized by the target format, then fed
//! to one of three encoding backends.
//!
//! # Pipeline Architecture
//!
//! ```text
//! frame.imageData ──┐
//!                   ├── Decode (FrameSource)
//! target format ────┘         │
//!                             ├── Background + Scale-to-fit + Center
//!                             ├── Watermark
//!                             ▼
//!          ┌──────────── composited surface ─────────────┐
//!          ▼                    ▼                         ▼
//!   Video (ffmpeg) ──fail──▶ GIF encoder ──fail──▶ ZIP of PNGs
//!          │                    │                         │
//!          └────────────────────┴──── DownloadSink ◀──────┘
//! ```
//!
//! Stills (`scope = current`, or stories that are not animations) skip the
//! encoder chain and are downloaded as individual PNG files.

pub mod archive;
pub mod compositor;
pub mod download;
pub mod export;
pub mod gif;
pub mod layers;
pub mod single;
pub mod source;
pub mod video;
pub mod watermark;

#[cfg(test)]
mod test_support;

pub use export::*;
