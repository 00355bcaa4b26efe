//! storyreel library crate.
//!
//! Generates one video clip per storyboard scene with fal.ai and assembles
//! the clips into a single video with FFmpeg.

pub mod config;
pub mod error;
pub mod fal;
pub mod media;
pub mod storyboard;

pub use error::StoryboardError;
