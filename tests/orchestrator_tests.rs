//! End-to-end storyboard runs against in-memory generator and media doubles.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use storyreel::fal::FalError;
use storyreel::media::{MediaError, MediaTool, TransitionKind};
use storyreel::storyboard::{
    ClipSettings, Orchestrator, ReferenceImage, SceneGenerator, StoryboardConfig, StoryboardError,
};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MockGenerator {
    /// Scenes whose prompt contains one of these fail.
    fail_on: Vec<String>,
    /// Scenes whose prompt contains one of these succeed without writing a file.
    empty_on: Vec<String>,
    delays: Vec<(String, Duration)>,
    prompts: Mutex<Vec<String>>,
    reference_labels: Mutex<Vec<Vec<String>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockGenerator {
    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    async fn produce(&self, prompt: &str, dest: &Path) -> Result<(), FalError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some((_, delay)) = self.delays.iter().find(|(key, _)| prompt.contains(key.as_str())) {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_on.iter().any(|key| prompt.contains(key.as_str())) {
            return Err(FalError::GenerationFailed("model rejected the scene".to_string()));
        }
        if self.empty_on.iter().any(|key| prompt.contains(key.as_str())) {
            return Ok(());
        }
        tokio::fs::write(dest, b"clip").await?;
        Ok(())
    }
}

#[async_trait]
impl SceneGenerator for MockGenerator {
    async fn generate_clip(&self, prompt: &str, _settings: &ClipSettings, dest: &Path) -> Result<(), FalError> {
        self.produce(prompt, dest).await
    }

    async fn generate_clip_with_references(
        &self,
        prompt: &str,
        _settings: &ClipSettings,
        references: &[ReferenceImage],
        dest: &Path,
    ) -> Result<(), FalError> {
        self.reference_labels
            .lock()
            .unwrap()
            .push(references.iter().map(|r| r.label.clone()).collect());
        self.produce(prompt, dest).await
    }
}

struct MockMedia {
    available: bool,
    fail_runs: bool,
    clip_duration: f64,
    runs: Mutex<Vec<Vec<String>>>,
    manifests: Mutex<Vec<String>>,
}

impl Default for MockMedia {
    fn default() -> Self {
        Self {
            available: true,
            fail_runs: false,
            clip_duration: 8.0,
            runs: Mutex::new(Vec::new()),
            manifests: Mutex::new(Vec::new()),
        }
    }
}

impl MockMedia {
    fn runs(&self) -> Vec<Vec<String>> {
        self.runs.lock().unwrap().clone()
    }

    fn manifests(&self) -> Vec<String> {
        self.manifests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaTool for MockMedia {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn probe_duration(&self, _path: &Path) -> Result<f64, MediaError> {
        Ok(self.clip_duration)
    }

    async fn run(&self, args: &[String]) -> Result<(), MediaError> {
        self.runs.lock().unwrap().push(args.to_vec());

        // The workspace is gone by the time assertions run, so keep the text.
        if let Some(pos) = args.iter().position(|a| a == "concat") {
            if let Some(manifest) = args[pos..].iter().skip_while(|a| *a != "-i").nth(1) {
                let text = std::fs::read_to_string(manifest)?;
                self.manifests.lock().unwrap().push(text);
            }
        }

        if self.fail_runs {
            return Err(MediaError::ProcessFailed {
                tool: "ffmpeg".to_string(),
                exit_code: Some(1),
                stderr: "Invalid data found when processing input".to_string(),
            });
        }
        if let Some(output) = args.last() {
            std::fs::write(output, b"video")?;
        }
        Ok(())
    }
}

struct Harness {
    generator: Arc<MockGenerator>,
    media: Arc<MockMedia>,
    work: TempDir,
    out: TempDir,
}

impl Harness {
    fn new(generator: MockGenerator, media: MockMedia) -> Self {
        Self {
            generator: Arc::new(generator),
            media: Arc::new(media),
            work: TempDir::new().unwrap(),
            out: TempDir::new().unwrap(),
        }
    }

    fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.generator.clone(), self.media.clone()).with_work_dir(self.work.path())
    }

    fn config(&self, scenes: &[&str]) -> StoryboardConfig {
        StoryboardConfig::new(
            scenes.iter().map(|s| s.to_string()).collect(),
            self.out.path().join("story.mp4"),
        )
    }

    fn workspace_entries(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.work.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    fn write_file(&self, name: &str) -> PathBuf {
        let path = self.out.path().join(name);
        std::fs::write(&path, b"data").unwrap();
        path
    }
}

fn input_files(args: &[String]) -> Vec<String> {
    args.windows(2)
        .filter(|w| w[0] == "-i")
        .map(|w| w[1].clone())
        .collect()
}

fn scene_order(manifest: &str) -> Vec<String> {
    manifest
        .lines()
        .filter_map(|line| line.rsplit('/').next())
        .filter(|name| name.starts_with("scene_"))
        .map(|name| name.trim_end_matches('\'').to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Successful runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_three_scenes_crossfade() {
    let h = Harness::new(MockGenerator::default(), MockMedia::default());
    let mut config = h.config(&["fox wakes", "fox runs", "fox sleeps"]);
    config.transition = TransitionKind::Crossfade;
    config.transition_duration = 0.5;

    let result = h.orchestrator().run(&config).await.unwrap();

    assert_eq!(result.success_count, 3);
    assert_eq!(result.failure_count, 0);
    assert!(result.failures.is_empty());
    assert_eq!(result.output, config.output);
    assert!(config.output.exists());
    assert_eq!(result.scene_timings.len(), 3);

    let runs = h.media.runs();
    assert_eq!(runs.len(), 1);
    let inputs = input_files(&runs[0]);
    assert_eq!(inputs.len(), 3);
    assert!(inputs[0].ends_with("scene_000.mp4"));
    assert!(inputs[1].ends_with("scene_001.mp4"));
    assert!(inputs[2].ends_with("scene_002.mp4"));

    let graph = &runs[0][runs[0].iter().position(|a| a == "-filter_complex").unwrap() + 1];
    assert!(graph.contains("offset=7.500"));
    assert!(graph.contains("offset=15.000"));
    assert!(graph.contains("acrossfade"));
}

#[tokio::test]
async fn test_one_failed_scene_is_skipped_with_cut() {
    let generator = MockGenerator {
        fail_on: vec!["scene two".to_string()],
        ..Default::default()
    };
    let h = Harness::new(generator, MockMedia::default());
    let config = h.config(&["scene one", "scene two", "scene three", "scene four"]);

    let result = h.orchestrator().run(&config).await.unwrap();

    assert_eq!(result.success_count, 3);
    assert_eq!(result.failure_count, 1);
    assert_eq!(result.failures[0].index, 1);
    assert!(result.failures[0].message.contains("model rejected"));
    assert!(result.is_partial());

    assert_eq!(h.media.runs().len(), 1);
    let manifests = h.media.manifests();
    assert_eq!(manifests.len(), 1);
    assert_eq!(
        scene_order(&manifests[0]),
        vec!["scene_000.mp4", "scene_002.mp4", "scene_003.mp4"]
    );
}

#[tokio::test]
async fn test_middle_scene_failure_with_crossfade() {
    let generator = MockGenerator {
        fail_on: vec!["scene two".to_string()],
        ..Default::default()
    };
    let h = Harness::new(generator, MockMedia::default());
    let mut config = h.config(&["scene one", "scene two", "scene three"]);
    config.transition = TransitionKind::Crossfade;
    config.transition_duration = 0.5;

    let result = h.orchestrator().run(&config).await.unwrap();

    assert_eq!(result.success_count, 2);
    assert_eq!(result.failure_count, 1);
    assert_eq!(result.failures[0].index, 1);
    assert!(config.output.exists());

    let runs = h.media.runs();
    assert_eq!(runs.len(), 1);
    let names: Vec<String> = input_files(&runs[0])
        .iter()
        .filter_map(|p| Path::new(p).file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    assert_eq!(names, vec!["scene_000.mp4", "scene_002.mp4"]);

    let graph = &runs[0][runs[0].iter().position(|a| a == "-filter_complex").unwrap() + 1];
    assert!(graph.contains("offset=7.500"));
    assert_eq!(graph.matches("xfade=").count(), 1);
}

#[tokio::test]
async fn test_order_follows_scene_index_not_completion() {
    let generator = MockGenerator {
        delays: vec![
            ("slow".to_string(), Duration::from_millis(150)),
            ("medium".to_string(), Duration::from_millis(75)),
            ("fast".to_string(), Duration::from_millis(10)),
        ],
        ..Default::default()
    };
    let h = Harness::new(generator, MockMedia::default());
    let config = h.config(&["slow", "medium", "fast"]);

    let result = h
        .orchestrator()
        .with_concurrency(3)
        .run(&config)
        .await
        .unwrap();

    assert_eq!(result.success_count, 3);
    assert_eq!(h.generator.max_in_flight.load(Ordering::SeqCst), 3);
    let indices: Vec<usize> = result.scene_timings.iter().map(|t| t.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(
        scene_order(&h.media.manifests()[0]),
        vec!["scene_000.mp4", "scene_001.mp4", "scene_002.mp4"]
    );
}

#[tokio::test]
async fn test_sequential_by_default() {
    let generator = MockGenerator {
        delays: vec![("a".to_string(), Duration::from_millis(20))],
        ..Default::default()
    };
    let h = Harness::new(generator, MockMedia::default());

    h.orchestrator().run(&h.config(&["a", "a", "a"])).await.unwrap();

    assert_eq!(h.generator.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_prompts_carry_style_and_character() {
    let h = Harness::new(MockGenerator::default(), MockMedia::default());
    let mut config = h.config(&["walks into the forest"]);
    config.style = Some("Pixar".to_string());
    config.character = Some("A small red fox.".to_string());

    h.orchestrator().run(&config).await.unwrap();

    assert_eq!(
        h.generator.prompts.lock().unwrap().as_slice(),
        ["Pixar style. A small red fox. walks into the forest"]
    );
}

#[tokio::test]
async fn test_single_scene_is_copied_without_media_run() {
    let h = Harness::new(MockGenerator::default(), MockMedia::default());
    let config = h.config(&["only scene"]);

    let result = h.orchestrator().run(&config).await.unwrap();

    assert_eq!(result.success_count, 1);
    assert!(h.media.runs().is_empty());
    assert_eq!(std::fs::read(&config.output).unwrap(), b"clip");
}

#[tokio::test]
async fn test_references_reach_every_scene() {
    let h = Harness::new(MockGenerator::default(), MockMedia::default());
    let mut config = h.config(&["one", "two"]);
    config.reference_images = Some(vec![h.write_file("front.png"), h.write_file("side.jpg")]);

    h.orchestrator().run(&config).await.unwrap();

    let labels = h.generator.reference_labels.lock().unwrap().clone();
    assert_eq!(labels.len(), 2);
    for scene in labels {
        assert_eq!(scene, vec!["reference image 1", "reference image 2"]);
    }
}

#[tokio::test]
async fn test_background_music_is_mixed_into_output() {
    let h = Harness::new(MockGenerator::default(), MockMedia::default());
    let mut config = h.config(&["one", "two"]);
    config.audio.background_music = Some(h.write_file("theme.mp3"));
    config.audio.music_volume = 0.2;

    let result = h.orchestrator().run(&config).await.unwrap();

    let runs = h.media.runs();
    assert_eq!(runs.len(), 2);
    let mix = &runs[1];
    let inputs = input_files(mix);
    assert!(inputs[0].ends_with("assembled.mp4"));
    assert!(inputs[1].ends_with("theme.mp3"));
    assert!(mix.iter().any(|a| a.contains("volume=0.2000")));
    assert_eq!(mix.last().unwrap(), &config.output.display().to_string());
    assert!(result.output.exists());
}

#[tokio::test]
async fn test_volume_boundaries_are_accepted() {
    for volume in [0.0_f32, 1.0] {
        let h = Harness::new(MockGenerator::default(), MockMedia::default());
        let mut config = h.config(&["one", "two"]);
        config.audio.background_music = Some(h.write_file("theme.mp3"));
        config.audio.music_volume = volume;

        let result = h.orchestrator().run(&config).await;
        assert!(result.is_ok(), "volume {} rejected", volume);
    }
}

#[tokio::test]
async fn test_silent_clips_use_video_only_graph() {
    let h = Harness::new(MockGenerator::default(), MockMedia::default());
    let mut config = h.config(&["one", "two"]);
    config.transition = TransitionKind::Fade;
    config.audio.generate_audio = false;

    h.orchestrator().run(&config).await.unwrap();

    let runs = h.media.runs();
    assert!(runs[0].iter().any(|a| a == "-an"));
    assert!(runs[0].iter().any(|a| a.contains("concat=n=2:v=1:a=0")));
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_all_scenes_failing() {
    let generator = MockGenerator {
        fail_on: vec!["scene".to_string()],
        ..Default::default()
    };
    let h = Harness::new(generator, MockMedia::default());
    let config = h.config(&["scene a", "scene b"]);

    let err = h.orchestrator().run(&config).await.unwrap_err();

    match err {
        StoryboardError::AllScenesFailed { failures } => {
            assert_eq!(failures.len(), 2);
            assert_eq!(failures[0].index, 0);
            assert_eq!(failures[1].index, 1);
        }
        other => panic!("expected AllScenesFailed, got {:?}", other),
    }
    assert!(h.media.runs().is_empty());
    assert!(!config.output.exists());
    assert!(h.workspace_entries().is_empty());
}

#[tokio::test]
async fn test_generator_without_clip_counts_as_failure() {
    let generator = MockGenerator {
        empty_on: vec!["ghost".to_string()],
        ..Default::default()
    };
    let h = Harness::new(generator, MockMedia::default());

    let result = h
        .orchestrator()
        .run(&h.config(&["real", "ghost", "real again"]))
        .await
        .unwrap();

    assert_eq!(result.success_count, 2);
    assert_eq!(result.failures[0].index, 1);
}

#[tokio::test]
async fn test_assembly_failure_still_removes_workspace() {
    let media = MockMedia {
        fail_runs: true,
        ..Default::default()
    };
    let h = Harness::new(MockGenerator::default(), media);
    let config = h.config(&["one", "two", "three"]);

    let err = h.orchestrator().run(&config).await.unwrap_err();

    assert!(matches!(err, StoryboardError::Assembly(_)));
    assert_eq!(h.media.runs().len(), 1);
    assert!(h.workspace_entries().is_empty());
}

#[tokio::test]
async fn test_workspace_removed_after_success() {
    let h = Harness::new(MockGenerator::default(), MockMedia::default());

    h.orchestrator().run(&h.config(&["one", "two"])).await.unwrap();

    assert!(h.workspace_entries().is_empty());
}

#[tokio::test]
async fn test_transition_longer_than_clip_is_assembly_error() {
    let media = MockMedia {
        clip_duration: 0.4,
        ..Default::default()
    };
    let h = Harness::new(MockGenerator::default(), media);
    let mut config = h.config(&["one", "two"]);
    config.transition = TransitionKind::Crossfade;
    config.transition_duration = 0.5;

    let err = h.orchestrator().run(&config).await.unwrap_err();

    assert!(matches!(err, StoryboardError::Assembly(MediaError::InvalidPlan(_))));
    assert!(h.media.runs().is_empty());
}

// ---------------------------------------------------------------------------
// Fail-fast validation: no generation or media calls
// ---------------------------------------------------------------------------

async fn assert_rejected(h: &Harness, config: &StoryboardConfig) {
    let err = h.orchestrator().run(config).await.unwrap_err();
    assert!(
        matches!(err, StoryboardError::Validation(_)),
        "expected validation error, got {:?}",
        err
    );
    assert_eq!(h.generator.calls(), 0);
    assert!(h.media.runs().is_empty());
}

#[tokio::test]
async fn test_empty_storyboard_rejected() {
    let h = Harness::new(MockGenerator::default(), MockMedia::default());
    assert_rejected(&h, &h.config(&[])).await;
}

#[tokio::test]
async fn test_blank_scene_rejected() {
    let h = Harness::new(MockGenerator::default(), MockMedia::default());
    assert_rejected(&h, &h.config(&["one", "   "])).await;
}

#[tokio::test]
async fn test_reference_count_out_of_range_rejected() {
    let h = Harness::new(MockGenerator::default(), MockMedia::default());

    let mut config = h.config(&["one"]);
    config.reference_images = Some(Vec::new());
    assert_rejected(&h, &config).await;

    let image = h.write_file("ref.png");
    config.reference_images = Some(vec![image.clone(), image.clone(), image.clone(), image]);
    assert_rejected(&h, &config).await;
}

#[tokio::test]
async fn test_unreadable_reference_rejected() {
    let h = Harness::new(MockGenerator::default(), MockMedia::default());
    let mut config = h.config(&["one"]);
    config.reference_images = Some(vec![h.out.path().join("missing.png")]);
    assert_rejected(&h, &config).await;
}

#[tokio::test]
async fn test_music_volume_out_of_range_rejected() {
    let h = Harness::new(MockGenerator::default(), MockMedia::default());
    let mut config = h.config(&["one"]);
    config.audio.background_music = Some(h.write_file("theme.mp3"));

    for volume in [-0.1_f32, 1.5] {
        config.audio.music_volume = volume;
        assert_rejected(&h, &config).await;
    }
}

#[tokio::test]
async fn test_missing_music_rejected() {
    let h = Harness::new(MockGenerator::default(), MockMedia::default());
    let mut config = h.config(&["one"]);
    config.audio.background_music = Some(h.out.path().join("missing.mp3"));
    assert_rejected(&h, &config).await;
}

#[tokio::test]
async fn test_non_positive_transition_rejected() {
    let h = Harness::new(MockGenerator::default(), MockMedia::default());
    let mut config = h.config(&["one", "two"]);
    config.transition = TransitionKind::Crossfade;
    config.transition_duration = 0.0;
    assert_rejected(&h, &config).await;
}

#[tokio::test]
async fn test_zero_concurrency_rejected() {
    let h = Harness::new(MockGenerator::default(), MockMedia::default());
    let err = h
        .orchestrator()
        .with_concurrency(0)
        .run(&h.config(&["one"]))
        .await
        .unwrap_err();
    assert!(matches!(err, StoryboardError::Validation(_)));
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn test_unavailable_media_tool_rejected() {
    let media = MockMedia {
        available: false,
        ..Default::default()
    };
    let h = Harness::new(MockGenerator::default(), media);
    assert_rejected(&h, &h.config(&["one", "two"])).await;
}

#[test]
fn test_scene_order_helper() {
    let manifest = "ffconcat version 1.0\nfile '/w/scene_000.mp4'\nfile '/w/scene_002.mp4'\n";
    assert_eq!(scene_order(manifest), vec!["scene_000.mp4", "scene_002.mp4"]);
}
