//! Storyboard runs: turn an ordered list of scene descriptions into one video.
//!
//! A run validates its inputs up front, generates one clip per scene through a
//! [`SceneGenerator`], keeps the surviving clips in scene order, joins them
//! with the configured transition and optionally lays a music track under the
//! result. See [`Orchestrator::run`].

mod generator;
mod orchestrator;
mod references;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::fal::{AspectRatio, ClipDuration, Resolution};
use crate::media::TransitionKind;

pub use crate::error::StoryboardError;
pub use crate::media::ClipHandle;
pub use generator::{ClipSettings, FalSceneGenerator, SceneGenerator};
pub use orchestrator::{build_prompt, Orchestrator, DEFAULT_CONCURRENCY};
pub use references::{
    load_references, validate_reference_count, with_reference_note, ReferenceImage,
    MAX_REFERENCE_IMAGES,
};

/// Default overlap between adjacent clips for crossfade and fade, in seconds.
pub const DEFAULT_TRANSITION_DURATION: f64 = 0.5;

/// Default background music gain.
pub const DEFAULT_MUSIC_VOLUME: f32 = 0.3;

/// One scene to generate.
#[derive(Debug, Clone)]
pub struct SceneRequest {
    /// Zero-based position in the storyboard.
    pub index: usize,
    pub description: String,
    pub character_prefix: Option<String>,
    pub style_prefix: Option<String>,
    /// Shared by every scene of a run when present.
    pub references: Option<Arc<[ReferenceImage]>>,
}

impl SceneRequest {
    /// The full prompt sent to the generator.
    pub fn prompt(&self) -> String {
        build_prompt(
            &self.description,
            self.style_prefix.as_deref(),
            self.character_prefix.as_deref(),
        )
    }
}

#[derive(Debug, Clone)]
pub enum SceneOutcome {
    Clip(ClipHandle),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SceneResult {
    pub index: usize,
    pub outcome: SceneOutcome,
    pub elapsed: Duration,
}

impl SceneResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, SceneOutcome::Clip(_))
    }
}

/// A scene that produced no clip, with the generator's message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneFailure {
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneTiming {
    pub index: usize,
    pub elapsed: Duration,
}

/// Audio settings for a run.
#[derive(Debug, Clone)]
pub struct AudioOptions {
    /// Ask the generator for clips with native audio.
    pub generate_audio: bool,
    pub background_music: Option<PathBuf>,
    /// Gain applied to the music, in `[0, 1]`.
    pub music_volume: f32,
}

impl Default for AudioOptions {
    fn default() -> Self {
        Self {
            generate_audio: true,
            background_music: None,
            music_volume: DEFAULT_MUSIC_VOLUME,
        }
    }
}

/// Everything a single run needs.
#[derive(Debug, Clone)]
pub struct StoryboardConfig {
    pub scenes: Vec<String>,
    pub style: Option<String>,
    pub character: Option<String>,
    /// One to three reference images. `None` uses the text-only model.
    pub reference_images: Option<Vec<PathBuf>>,
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
    pub clip_duration: ClipDuration,
    pub transition: TransitionKind,
    pub transition_duration: f64,
    pub audio: AudioOptions,
    pub output: PathBuf,
}

impl StoryboardConfig {
    pub fn new(scenes: Vec<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            scenes,
            style: None,
            character: None,
            reference_images: None,
            aspect_ratio: AspectRatio::default(),
            resolution: Resolution::default(),
            clip_duration: ClipDuration::default(),
            transition: TransitionKind::default(),
            transition_duration: DEFAULT_TRANSITION_DURATION,
            audio: AudioOptions::default(),
            output: output.into(),
        }
    }

    /// Scene requests in storyboard order.
    pub fn scene_requests(&self, references: Option<Arc<[ReferenceImage]>>) -> Vec<SceneRequest> {
        self.scenes
            .iter()
            .enumerate()
            .map(|(index, description)| SceneRequest {
                index,
                description: description.clone(),
                character_prefix: self.character.clone(),
                style_prefix: self.style.clone(),
                references: references.clone(),
            })
            .collect()
    }

    pub(crate) fn clip_settings(&self) -> ClipSettings {
        ClipSettings {
            aspect_ratio: self.aspect_ratio,
            resolution: self.resolution,
            duration: self.clip_duration,
            generate_audio: self.audio.generate_audio,
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct StoryboardResult {
    pub output: PathBuf,
    pub total_elapsed: Duration,
    /// Per-scene generation time, in scene order.
    pub scene_timings: Vec<SceneTiming>,
    pub success_count: usize,
    pub failure_count: usize,
    pub failures: Vec<SceneFailure>,
}

impl StoryboardResult {
    /// True when some scenes were dropped from the final video.
    pub fn is_partial(&self) -> bool {
        self.failure_count > 0
    }
}
