//! Top-level error type for a storyboard run.

use crate::media::MediaError;
use crate::storyboard::SceneFailure;

/// Why a storyboard run did not produce a video.
///
/// Per-scene generation errors are not represented here: they are recorded
/// in the run result and only surface as `AllScenesFailed` when nothing
/// survived.
#[derive(Debug, thiserror::Error)]
pub enum StoryboardError {
    /// Rejected before any generation call was made.
    #[error("invalid storyboard: {0}")]
    Validation(String),

    #[error("all {} scenes failed to generate", failures.len())]
    AllScenesFailed { failures: Vec<SceneFailure> },

    /// The media tool failed after clips were generated.
    #[error("assembly failed: {0}")]
    Assembly(#[source] MediaError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoryboardError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<MediaError> for StoryboardError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::InvalidInput(message) => Self::Validation(message),
            other => Self::Assembly(other),
        }
    }
}
