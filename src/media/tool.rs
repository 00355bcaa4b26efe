//! External media tool invocation.
//!
//! The compositor and mixer only build argument vectors; running them is
//! delegated to a [`MediaTool`], which for real runs is [`FfmpegTool`].

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

/// Number of stderr lines kept when a tool invocation fails.
const STDERR_TAIL_LINES: usize = 20;

/// Errors that can occur while invoking the media tool.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("{tool} not found. Install FFmpeg and make sure it is on PATH")]
    ToolNotFound { tool: String },

    #[error("failed to spawn {tool}: {source}")]
    SpawnFailed {
        tool: String,
        source: std::io::Error,
    },

    #[error("{tool} exited with code {exit_code:?}\n{stderr}")]
    ProcessFailed {
        tool: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("could not probe duration of '{}': {message}", path.display())]
    ProbeFailed { path: PathBuf, message: String },

    #[error("{0}")]
    InvalidInput(String),

    #[error("invalid transition plan: {0}")]
    InvalidPlan(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A process-backed media tool (FFmpeg or a test double).
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Whether the tool can be invoked at all.
    async fn is_available(&self) -> bool;

    /// Duration of a media file in seconds.
    async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError>;

    /// Run one invocation with the given arguments, waiting for it to exit.
    async fn run(&self, args: &[String]) -> Result<(), MediaError>;
}

/// `ffmpeg` / `ffprobe` executed as child processes.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegTool {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegTool {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg
    }

    pub fn ffprobe_path(&self) -> &Path {
        &self.ffprobe
    }

    async fn output(&self, program: &Path, args: &[String]) -> Result<std::process::Output, MediaError> {
        let tool = program.display().to_string();
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MediaError::ToolNotFound { tool }
                } else {
                    MediaError::SpawnFailed { tool, source: e }
                }
            })
    }

    async fn responds_to_version(&self, program: &Path) -> bool {
        matches!(
            self.output(program, &["-version".to_string()]).await,
            Ok(output) if output.status.success()
        )
    }
}

#[async_trait]
impl MediaTool for FfmpegTool {
    async fn is_available(&self) -> bool {
        self.responds_to_version(&self.ffmpeg).await && self.responds_to_version(&self.ffprobe).await
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError> {
        let output = self.output(&self.ffprobe, &probe_args(path)).await?;

        if !output.status.success() {
            return Err(MediaError::ProbeFailed {
                path: path.to_path_buf(),
                message: stderr_tail(&output.stderr),
            });
        }

        parse_probe_output(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            MediaError::ProbeFailed {
                path: path.to_path_buf(),
                message: "ffprobe returned no duration".to_string(),
            }
        })
    }

    async fn run(&self, args: &[String]) -> Result<(), MediaError> {
        log::debug!("{} {}", self.ffmpeg.display(), args.join(" "));

        let output = self.output(&self.ffmpeg, args).await?;

        if !output.status.success() {
            return Err(MediaError::ProcessFailed {
                tool: self.ffmpeg.display().to_string(),
                exit_code: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            });
        }
        Ok(())
    }
}

fn probe_args(path: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-show_entries".to_string(),
        "format=duration".to_string(),
        "-of".to_string(),
        "default=noprint_wrappers=1:nokey=1".to_string(),
        path.display().to_string(),
    ]
}

/// Parse ffprobe's bare duration output. Rejects `N/A` and non-positive values.
fn parse_probe_output(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
