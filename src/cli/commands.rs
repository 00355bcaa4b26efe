//! Subcommand handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use storyreel::config::{self, Config};
use storyreel::fal::FAL_API_KEY_ENV;
use storyreel::media::{AudioMixer, ClipHandle, Compositor, MediaTool};
use storyreel::storyboard::{
    AudioOptions, FalSceneGenerator, Orchestrator, StoryboardConfig, StoryboardError,
    StoryboardResult,
};

use super::args::{AssembleArgs, ConfigAction, GenerateArgs, MixArgs};

const API_KEY_HELP: &str = "FAL_API_KEY is not set.\n\n\
    Pass --api-key, or add your key to a .env file:\n\
        echo 'FAL_API_KEY=your-api-key-here' >> .env\n\n\
    Get your API key at: https://fal.ai/";

/// Parse a scenes file: one scene per line, skipping blanks and `#` comments.
pub fn parse_scenes(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn resolve_api_key(flag: Option<String>) -> Result<String, String> {
    flag.or_else(|| std::env::var(FAL_API_KEY_ENV).ok())
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| API_KEY_HELP.to_string())
}

/// Merge settings: CLI args > config file > built-in defaults.
pub fn storyboard_config(args: &GenerateArgs, scenes: Vec<String>, cfg: &Config) -> StoryboardConfig {
    StoryboardConfig {
        scenes,
        style: args.style.clone(),
        character: args.character.clone(),
        reference_images: (!args.references.is_empty()).then(|| args.references.clone()),
        aspect_ratio: args
            .aspect_ratio
            .map(Into::into)
            .unwrap_or(cfg.generation.aspect_ratio),
        resolution: args
            .resolution
            .map(Into::into)
            .unwrap_or(cfg.generation.resolution),
        clip_duration: args
            .duration
            .map(Into::into)
            .unwrap_or(cfg.generation.duration),
        transition: args
            .transition
            .map(Into::into)
            .unwrap_or(cfg.assembly.transition),
        transition_duration: args
            .transition_duration
            .unwrap_or(cfg.assembly.transition_duration),
        audio: AudioOptions {
            generate_audio: !args.no_audio && cfg.generation.generate_audio,
            background_music: args.music.clone(),
            music_volume: args
                .music_volume
                .unwrap_or(cfg.assembly.music_volume as f32),
        },
        output: args.output.clone(),
    }
}

/// Run the full pipeline.
pub async fn run_generate(args: GenerateArgs, cfg: &Config) -> Result<(), String> {
    let scenes = match &args.scenes_file {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read scenes file '{}': {}", path.display(), e))?;
            parse_scenes(&contents)
        }
        None => args.scenes.clone(),
    };
    let story = storyboard_config(&args, scenes, cfg);

    let api_key = resolve_api_key(args.api_key.clone())?;
    let client = cfg
        .fal_client(api_key)
        .map_err(|e| format!("Failed to create fal.ai client: {}", e))?;

    let orchestrator = Orchestrator::new(
        Arc::new(FalSceneGenerator::new(client)),
        Arc::new(cfg.media_tool()),
    )
    .with_work_dir(cfg.work_dir())
    .with_concurrency(args.concurrency.unwrap_or(cfg.generation.concurrency));

    println!(
        "Generating {} scene(s) into {}",
        story.scenes.len(),
        story.output.display()
    );

    match orchestrator.run(&story).await {
        Ok(result) => {
            print_summary(&result);
            Ok(())
        }
        Err(StoryboardError::AllScenesFailed { failures }) => {
            for failure in &failures {
                eprintln!("  Scene {}: {}", failure.index + 1, failure.message);
            }
            Err(format!("All {} scenes failed to generate", failures.len()))
        }
        Err(e) => Err(e.to_string()),
    }
}

fn print_summary(result: &StoryboardResult) {
    println!();
    println!("Storyboard ready!");
    println!("  Output: {}", result.output.display());
    println!("  Total time: {:.1}s", result.total_elapsed.as_secs_f64());
    println!(
        "  Scenes: {} succeeded, {} failed",
        result.success_count, result.failure_count
    );
    for timing in &result.scene_timings {
        println!(
            "    Scene {}: {:.1}s",
            timing.index + 1,
            timing.elapsed.as_secs_f64()
        );
    }
    if result.is_partial() {
        println!();
        println!("Skipped scenes:");
        for failure in &result.failures {
            println!("  Scene {}: {}", failure.index + 1, failure.message);
        }
    }
}

async fn require_tool(tool: &dyn MediaTool) -> Result<(), String> {
    if tool.is_available().await {
        Ok(())
    } else {
        Err("FFmpeg not found. Install FFmpeg and make sure ffmpeg and ffprobe are on PATH".to_string())
    }
}

/// Join existing clips.
pub async fn run_assemble(args: AssembleArgs, cfg: &Config) -> Result<(), String> {
    for clip in &args.clips {
        if !clip.exists() {
            return Err(format!("Clip not found: {}", clip.display()));
        }
    }

    let tool = cfg.media_tool();
    require_tool(&tool).await?;

    let work_root = cfg.work_dir();
    std::fs::create_dir_all(&work_root)
        .map_err(|e| format!("Failed to create work dir '{}': {}", work_root.display(), e))?;
    let workspace = tempfile::Builder::new()
        .prefix("storyreel-")
        .tempdir_in(&work_root)
        .map_err(|e| format!("Failed to create workspace: {}", e))?;

    let clips: Vec<ClipHandle> = args.clips.iter().map(|p| ClipHandle::new(p.clone())).collect();
    let output = Compositor::new(&tool, workspace.path())
        .assemble(
            &clips,
            args.transition.map(Into::into).unwrap_or(cfg.assembly.transition),
            args.transition_duration
                .unwrap_or(cfg.assembly.transition_duration),
            !args.no_audio,
            &args.output,
        )
        .await
        .map_err(|e| format!("Assembly failed: {}", e))?;

    println!("Assembled {} clips into {}", clips.len(), output.display());
    Ok(())
}

/// Overlay music onto an existing video.
pub async fn run_mix(args: MixArgs, cfg: &Config) -> Result<(), String> {
    let tool = cfg.media_tool();
    require_tool(&tool).await?;

    let output = AudioMixer::new(&tool)
        .mix(
            &args.video,
            &args.music,
            args.music_volume
                .unwrap_or(cfg.assembly.music_volume as f32),
            !args.no_source_audio,
            &args.output,
        )
        .await
        .map_err(|e| e.to_string())?;

    println!("Wrote {}", output.display());
    Ok(())
}

/// Handle config subcommand actions.
pub fn handle_config_action(action: ConfigAction, path: Option<&Path>, cfg: &Config) -> Result<(), String> {
    let config_path: PathBuf = path.map(PathBuf::from).unwrap_or_else(config::default_path);

    match action {
        ConfigAction::Show => {
            if config_path.exists() {
                println!("# Config file: {} (exists)", config_path.display());
            } else {
                println!("# Config file: {} (not found, using defaults)", config_path.display());
            }
            println!();
            print!("{}", cfg.to_toml().map_err(|e| e.to_string())?);
        }
        ConfigAction::Init => {
            Config::write_default(&config_path).map_err(|e| match e {
                config::ConfigError::AlreadyExists(_) => format!(
                    "{}\nUse 'storyreel config show' to view current settings.",
                    e
                ),
                other => other.to_string(),
            })?;
            println!("Created config file: {}", config_path.display());
        }
    }
    Ok(())
}
