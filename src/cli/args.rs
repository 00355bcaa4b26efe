//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::enums::{AspectRatioArg, DurationArg, ResolutionArg, TransitionArg};

/// Generate a storyboard video from scene descriptions
#[derive(Parser, Debug)]
#[command(name = "storyreel")]
#[command(version, about = "Generate and assemble storyboard videos with fal.ai and FFmpeg", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate one clip per scene and assemble them
    Generate(GenerateArgs),
    /// Join existing clips with a transition
    Assemble(AssembleArgs),
    /// Overlay background music onto an existing video
    Mix(MixArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
pub struct GenerateArgs {
    /// Scene description, repeated once per scene in order
    #[arg(long = "scene", value_name = "TEXT")]
    pub scenes: Vec<String>,

    /// File with one scene per line ('#' comments and blank lines skipped)
    #[arg(long, value_name = "FILE", conflicts_with = "scenes")]
    pub scenes_file: Option<PathBuf>,

    /// Visual style prepended to every scene
    #[arg(long)]
    pub style: Option<String>,

    /// Character description prepended to every scene
    #[arg(long)]
    pub character: Option<String>,

    /// Reference image for character consistency (up to 3)
    #[arg(long = "reference", value_name = "PATH")]
    pub references: Vec<PathBuf>,

    #[arg(long, value_enum)]
    pub aspect_ratio: Option<AspectRatioArg>,

    #[arg(long, value_enum)]
    pub resolution: Option<ResolutionArg>,

    /// Length of each clip
    #[arg(long, value_enum)]
    pub duration: Option<DurationArg>,

    /// Generate silent clips
    #[arg(long)]
    pub no_audio: bool,

    #[arg(long, value_enum)]
    pub transition: Option<TransitionArg>,

    /// Transition overlap in seconds
    #[arg(long, value_name = "SECS")]
    pub transition_duration: Option<f64>,

    /// Background music file
    #[arg(long, value_name = "PATH")]
    pub music: Option<PathBuf>,

    /// Background music gain (0.0-1.0)
    #[arg(long)]
    pub music_volume: Option<f32>,

    /// Output video path
    #[arg(long, short, default_value = "storyboard.mp4")]
    pub output: PathBuf,

    /// Scenes generated in parallel
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// fal.ai API key (defaults to FAL_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct AssembleArgs {
    /// Clips to join, in order
    #[arg(required = true, value_name = "CLIP")]
    pub clips: Vec<PathBuf>,

    #[arg(long, value_enum)]
    pub transition: Option<TransitionArg>,

    /// Transition overlap in seconds
    #[arg(long, value_name = "SECS")]
    pub transition_duration: Option<f64>,

    /// Clips have no audio track
    #[arg(long)]
    pub no_audio: bool,

    /// Output video path
    #[arg(long, short, default_value = "assembled.mp4")]
    pub output: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct MixArgs {
    /// Video to put music under
    pub video: PathBuf,

    /// Music file
    pub music: PathBuf,

    /// Background music gain (0.0-1.0)
    #[arg(long)]
    pub music_volume: Option<f32>,

    /// The video has no audio track of its own
    #[arg(long)]
    pub no_source_audio: bool,

    /// Output video path
    #[arg(long, short, default_value = "mixed.mp4")]
    pub output: PathBuf,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create default config file
    Init,
}
