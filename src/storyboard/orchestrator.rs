use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::{self, StreamExt};

use super::generator::{ClipSettings, SceneGenerator};
use super::references::{load_references, validate_reference_count, ReferenceImage};
use super::{
    SceneFailure, SceneOutcome, SceneRequest, SceneResult, SceneTiming, StoryboardConfig,
    StoryboardResult,
};
use crate::error::StoryboardError;
use crate::media::{validate_volume, AudioMixer, ClipHandle, Compositor, MediaTool};

/// Scenes generated at once unless configured otherwise.
pub const DEFAULT_CONCURRENCY: usize = 1;

const WORKSPACE_PREFIX: &str = "storyreel-";

/// Combine the optional style and character prefixes with a scene description.
///
/// `build_prompt("walks in", Some("Pixar"), Some("A red fox."))` gives
/// `"Pixar style. A red fox. walks in"`.
pub fn build_prompt(description: &str, style: Option<&str>, character: Option<&str>) -> String {
    fn non_blank(s: Option<&str>) -> Option<&str> {
        s.map(str::trim).filter(|s| !s.is_empty())
    }

    let mut parts = Vec::with_capacity(3);
    if let Some(style) = non_blank(style) {
        parts.push(format!("{} style.", style.trim_end_matches('.')));
    }
    if let Some(character) = non_blank(character) {
        parts.push(format!("{}.", character.trim_end_matches('.')));
    }
    parts.push(description.trim().to_string());
    parts.join(" ")
}

/// Drives a storyboard run from validation to the final file.
pub struct Orchestrator {
    generator: Arc<dyn SceneGenerator>,
    media: Arc<dyn MediaTool>,
    work_root: PathBuf,
    concurrency: usize,
}

impl Orchestrator {
    pub fn new(generator: Arc<dyn SceneGenerator>, media: Arc<dyn MediaTool>) -> Self {
        Self {
            generator,
            media,
            work_root: std::env::temp_dir(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Directory under which each run creates its private workspace.
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_root = dir.into();
        self
    }

    /// Maximum scenes in flight. Zero is rejected when the run starts.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Check everything that can be checked without calling the generator.
    pub async fn validate(&self, config: &StoryboardConfig) -> Result<(), StoryboardError> {
        if config.scenes.is_empty() {
            return Err(StoryboardError::validation("storyboard has no scenes"));
        }
        if self.concurrency == 0 {
            return Err(StoryboardError::validation("concurrency must be at least 1"));
        }
        if let Some(i) = config.scenes.iter().position(|s| s.trim().is_empty()) {
            return Err(StoryboardError::validation(format!(
                "scene {} has an empty description",
                i + 1
            )));
        }
        if let Some(paths) = &config.reference_images {
            validate_reference_count(paths.len())?;
        }
        validate_volume(config.audio.music_volume)?;
        if config.transition.needs_durations()
            && !(config.transition_duration.is_finite() && config.transition_duration > 0.0)
        {
            return Err(StoryboardError::validation(format!(
                "transition duration must be positive, got {}",
                config.transition_duration
            )));
        }
        if let Some(music) = &config.audio.background_music {
            if !tokio::fs::try_exists(music).await.unwrap_or(false) {
                return Err(StoryboardError::validation(format!(
                    "background music not found: {}",
                    music.display()
                )));
            }
        }
        if !self.media.is_available().await {
            return Err(StoryboardError::validation(
                "media tool is not available; install FFmpeg and make sure it is on PATH",
            ));
        }
        Ok(())
    }

    /// Generate every scene, assemble the survivors in scene order and write
    /// `config.output`.
    ///
    /// Scenes that fail to generate are skipped and reported in the result.
    /// Intermediate files live in a private workspace that is removed before
    /// this returns, whether the run succeeded or not.
    ///
    /// # Errors
    ///
    /// - `Validation` for bad inputs, before any generation call
    /// - `AllScenesFailed` when no clip was produced
    /// - `Assembly` when the media tool fails
    pub async fn run(&self, config: &StoryboardConfig) -> Result<StoryboardResult, StoryboardError> {
        let started = Instant::now();
        self.validate(config).await?;

        let references: Option<Arc<[ReferenceImage]>> = match &config.reference_images {
            Some(paths) => Some(load_references(paths).await?.into()),
            None => None,
        };

        tokio::fs::create_dir_all(&self.work_root).await?;
        let workspace = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(&self.work_root)?;
        log::debug!("Workspace: {}", workspace.path().display());

        let outcome = self
            .generate_and_assemble(config, references, workspace.path(), started)
            .await;

        let workspace_path = workspace.path().to_path_buf();
        if let Err(e) = workspace.close() {
            log::warn!(
                "Failed to remove workspace {}: {}",
                workspace_path.display(),
                e
            );
        }
        outcome
    }

    async fn generate_and_assemble(
        &self,
        config: &StoryboardConfig,
        references: Option<Arc<[ReferenceImage]>>,
        workspace: &Path,
        started: Instant,
    ) -> Result<StoryboardResult, StoryboardError> {
        let requests = config.scene_requests(references);
        let results = self
            .generate_scenes(&requests, &config.clip_settings(), workspace)
            .await;

        let scene_timings: Vec<SceneTiming> = results
            .iter()
            .map(|r| SceneTiming {
                index: r.index,
                elapsed: r.elapsed,
            })
            .collect();

        let mut clips: Vec<ClipHandle> = Vec::new();
        let mut failures: Vec<SceneFailure> = Vec::new();
        for result in results {
            match result.outcome {
                SceneOutcome::Clip(clip) => clips.push(clip),
                SceneOutcome::Failed(message) => failures.push(SceneFailure {
                    index: result.index,
                    message,
                }),
            }
        }

        if clips.is_empty() {
            log::error!("All {} scenes failed", failures.len());
            return Err(StoryboardError::AllScenesFailed { failures });
        }
        if !failures.is_empty() {
            log::warn!(
                "{} of {} scenes failed; assembling the remaining {}",
                failures.len(),
                requests.len(),
                clips.len()
            );
        }

        let with_audio = config.audio.generate_audio;
        let compositor = Compositor::new(&*self.media, workspace);

        let output = match &config.audio.background_music {
            Some(music) => {
                let assembled = workspace.join("assembled.mp4");
                compositor
                    .assemble(
                        &clips,
                        config.transition,
                        config.transition_duration,
                        with_audio,
                        &assembled,
                    )
                    .await?;
                AudioMixer::new(&*self.media)
                    .mix(
                        &assembled,
                        music,
                        config.audio.music_volume,
                        with_audio,
                        &config.output,
                    )
                    .await?
            }
            None => {
                compositor
                    .assemble(
                        &clips,
                        config.transition,
                        config.transition_duration,
                        with_audio,
                        &config.output,
                    )
                    .await?
            }
        };

        let total_elapsed = started.elapsed();
        log::info!(
            "Wrote {} ({} scenes) in {:.1}s",
            output.display(),
            clips.len(),
            total_elapsed.as_secs_f64()
        );

        Ok(StoryboardResult {
            output,
            total_elapsed,
            scene_timings,
            success_count: clips.len(),
            failure_count: failures.len(),
            failures,
        })
    }

    /// Results are returned in scene order regardless of completion order.
    async fn generate_scenes(
        &self,
        requests: &[SceneRequest],
        settings: &ClipSettings,
        workspace: &Path,
    ) -> Vec<SceneResult> {
        let total = requests.len();
        let mut slots: Vec<Option<SceneResult>> = (0..total).map(|_| None).collect();

        let mut pending = stream::iter(
            requests
                .iter()
                .map(|request| self.generate_scene(request, settings, workspace, total)),
        )
        .buffer_unordered(self.concurrency);

        while let Some(result) = pending.next().await {
            let index = result.index;
            slots[index] = Some(result);
        }

        slots.into_iter().flatten().collect()
    }

    async fn generate_scene(
        &self,
        request: &SceneRequest,
        settings: &ClipSettings,
        workspace: &Path,
        total: usize,
    ) -> SceneResult {
        let dest = workspace.join(format!("scene_{:03}.mp4", request.index));
        let prompt = request.prompt();
        log::info!("Generating scene {}/{}", request.index + 1, total);
        log::debug!("Scene {} prompt: {}", request.index + 1, prompt);

        let started = Instant::now();
        let result = match &request.references {
            Some(refs) => {
                self.generator
                    .generate_clip_with_references(&prompt, settings, refs, &dest)
                    .await
            }
            None => self.generator.generate_clip(&prompt, settings, &dest).await,
        };
        let elapsed = started.elapsed();

        let outcome = match result {
            Ok(()) if tokio::fs::try_exists(&dest).await.unwrap_or(false) => {
                log::info!(
                    "Scene {}/{} done in {:.1}s",
                    request.index + 1,
                    total,
                    elapsed.as_secs_f64()
                );
                SceneOutcome::Clip(ClipHandle::new(dest))
            }
            Ok(()) => {
                log::warn!("Scene {}/{} produced no clip", request.index + 1, total);
                SceneOutcome::Failed("generator returned no clip".to_string())
            }
            Err(e) => {
                log::warn!("Scene {}/{} failed: {}", request.index + 1, total, e);
                SceneOutcome::Failed(e.to_string())
            }
        };

        SceneResult {
            index: request.index,
            outcome,
            elapsed,
        }
    }
}
