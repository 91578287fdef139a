//! StoryReel Story Model
//!
//! Defines the core data contracts for StoryReel exports:
//! - **Story:** Title, animation flag, and the ordered frame sequence
//! - **Format:** Aspect-ratio presets and their canvas dimensions
//! - **Request:** Export scope, encoding choice, and artifact naming
//!
//! Stories are supplied wholesale at export time and never mutated by
//! the render pipeline.

pub mod format;
pub mod request;
pub mod story;

pub use format::*;
pub use request::*;
pub use story::*;
