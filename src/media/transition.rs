//! Transition compositor: joins ordered clips into one video.
//!
//! Cut uses FFmpeg's concat demuxer with a manifest file. Crossfade and fade
//! need every clip's duration, so they run in two phases: probe durations,
//! then build a [`TransitionPlan`] and render it as a filter graph.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::filter_graph::{FilterGraph, Pad};
use super::tool::{MediaError, MediaTool};

/// How two adjacent clips are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    #[default]
    Cut,
    Crossfade,
    Fade,
}

impl TransitionKind {
    pub fn needs_durations(self) -> bool {
        !matches!(self, Self::Cut)
    }
}

/// A generated or stored clip: where it lives and, once probed, how long it is.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipHandle {
    pub path: PathBuf,
    pub duration: Option<f64>,
}

impl ClipHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            duration: None,
        }
    }

    pub fn with_duration(path: impl Into<PathBuf>, duration: f64) -> Self {
        Self {
            path: path.into(),
            duration: Some(duration),
        }
    }
}

/// Offsets at which each adjacent pair starts blending.
///
/// Pair `i` starts at the running length of everything already joined minus
/// one transition: `offset[0] = d0 - t`, `offset[i] = offset[i-1] + d[i] - t`.
pub fn crossfade_offsets(durations: &[f64], transition: f64) -> Vec<f64> {
    let mut offsets = Vec::with_capacity(durations.len().saturating_sub(1));
    let mut running = 0.0;
    for duration in durations.iter().take(durations.len().saturating_sub(1)) {
        running += duration - transition;
        offsets.push(running);
    }
    offsets
}

/// Ordered clips with their probed durations and derived pair offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    kind: TransitionKind,
    transition: f64,
    clips: Vec<PathBuf>,
    durations: Vec<f64>,
    offsets: Vec<f64>,
}

impl TransitionPlan {
    /// Build a plan for a crossfade or fade over probed clips.
    ///
    /// # Errors
    ///
    /// `MediaError::InvalidPlan` if any clip is unprobed, the transition is not
    /// positive, or the transition is not shorter than every clip.
    pub fn new(kind: TransitionKind, transition: f64, clips: &[ClipHandle]) -> Result<Self, MediaError> {
        if clips.is_empty() {
            return Err(MediaError::InvalidPlan("no clips to assemble".to_string()));
        }
        if !(transition.is_finite() && transition > 0.0) {
            return Err(MediaError::InvalidPlan(format!(
                "transition duration must be positive, got {}",
                transition
            )));
        }

        let mut durations = Vec::with_capacity(clips.len());
        for clip in clips {
            let duration = clip.duration.ok_or_else(|| {
                MediaError::InvalidPlan(format!("clip '{}' has not been probed", clip.path.display()))
            })?;
            if clips.len() > 1 && transition >= duration {
                return Err(MediaError::InvalidPlan(format!(
                    "transition of {:.3}s is not shorter than clip '{}' ({:.3}s)",
                    transition,
                    clip.path.display(),
                    duration
                )));
            }
            durations.push(duration);
        }

        Ok(Self {
            kind,
            transition,
            offsets: crossfade_offsets(&durations, transition),
            clips: clips.iter().map(|c| c.path.clone()).collect(),
            durations,
        })
    }

    pub fn kind(&self) -> TransitionKind {
        self.kind
    }

    pub fn clips(&self) -> &[PathBuf] {
        &self.clips
    }

    pub fn durations(&self) -> &[f64] {
        &self.durations
    }

    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }

    /// Length of the assembled output in seconds.
    pub fn total_duration(&self) -> f64 {
        let sum: f64 = self.durations.iter().sum();
        match self.kind {
            TransitionKind::Crossfade => {
                sum - self.transition * self.durations.len().saturating_sub(1) as f64
            }
            _ => sum,
        }
    }

    /// Render the plan as a filter graph ending in `vout` (and `aout`).
    pub fn filter_graph(&self, with_audio: bool) -> FilterGraph {
        match self.kind {
            TransitionKind::Fade => self.fade_graph(with_audio),
            _ => self.crossfade_graph(with_audio),
        }
    }

    fn crossfade_graph(&self, with_audio: bool) -> FilterGraph {
        let mut graph = FilterGraph::new();
        let last = self.clips.len() - 1;
        let t = self.transition;

        let mut video = Pad::video(0);
        let mut audio = Pad::audio(0);
        for (i, offset) in self.offsets.iter().enumerate() {
            let next = i + 1;
            let (v_out, a_out) = if next == last {
                ("vout".to_string(), "aout".to_string())
            } else {
                (format!("xv{}", next), format!("xa{}", next))
            };

            video = graph.add(
                &[&video, &Pad::video(next)],
                format!("xfade=transition=fade:duration={:.3}:offset={:.3}", t, offset),
                &v_out,
            );
            if with_audio {
                audio = graph.add(
                    &[&audio, &Pad::audio(next)],
                    format!("acrossfade=d={:.3}:c1=qsin:c2=qsin", t),
                    &a_out,
                );
            }
        }
        graph
    }

    fn fade_graph(&self, with_audio: bool) -> FilterGraph {
        let mut graph = FilterGraph::new();
        let last = self.clips.len() - 1;
        let t = self.transition;

        let mut segments = Vec::with_capacity(self.clips.len() * 2);
        for (i, duration) in self.durations.iter().enumerate() {
            let mut video = vec!["setpts=PTS-STARTPTS".to_string()];
            let mut audio = vec!["asetpts=PTS-STARTPTS".to_string()];
            if i > 0 {
                video.push(format!("fade=t=in:st=0:d={:.3}", t));
                audio.push(format!("afade=t=in:st=0:d={:.3}", t));
            }
            if i < last {
                video.push(format!("fade=t=out:st={:.3}:d={:.3}", duration - t, t));
                audio.push(format!("afade=t=out:st={:.3}:d={:.3}", duration - t, t));
            }

            segments.push(graph.add(&[&Pad::video(i)], video.join(","), &format!("fv{}", i)));
            if with_audio {
                segments.push(graph.add(&[&Pad::audio(i)], audio.join(","), &format!("fa{}", i)));
            }
        }

        let inputs: Vec<&Pad> = segments.iter().collect();
        let mut outputs = vec![Pad::named("vout")];
        if with_audio {
            outputs.push(Pad::named("aout"));
        }
        graph.add_multi(
            &inputs,
            format!(
                "concat=n={}:v=1:a={}",
                self.clips.len(),
                if with_audio { 1 } else { 0 }
            ),
            &outputs,
        );
        graph
    }
}

/// Escape a path for an ffconcat `file '...'` line.
fn escape_manifest_path(path: &Path) -> String {
    path.display().to_string().replace('\'', "'\\''")
}

/// Build the concat demuxer manifest, one `file` line per clip in order.
pub fn concat_manifest(clips: &[PathBuf]) -> String {
    let mut manifest = String::from("ffconcat version 1.0\n");
    for clip in clips {
        manifest.push_str(&format!("file '{}'\n", escape_manifest_path(clip)));
    }
    manifest
}

fn base_args() -> Vec<String> {
    ["-y", "-hide_banner", "-loglevel", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn concat_args(manifest: &Path, output: &Path) -> Vec<String> {
    let mut args = base_args();
    args.extend(
        ["-f", "concat", "-safe", "0", "-i"]
            .iter()
            .map(|s| s.to_string()),
    );
    args.push(manifest.display().to_string());
    args.extend(["-c", "copy"].iter().map(|s| s.to_string()));
    args.push(output.display().to_string());
    args
}

fn graph_args(plan: &TransitionPlan, with_audio: bool, output: &Path) -> Vec<String> {
    let mut args = base_args();
    for clip in plan.clips() {
        args.push("-i".to_string());
        args.push(clip.display().to_string());
    }
    args.push("-filter_complex".to_string());
    args.push(plan.filter_graph(with_audio).render());
    args.push("-map".to_string());
    args.push(Pad::named("vout").bracketed());
    if with_audio {
        args.push("-map".to_string());
        args.push(Pad::named("aout").bracketed());
        args.extend(["-c:a", "aac", "-b:a", "192k"].iter().map(|s| s.to_string()));
    } else {
        args.push("-an".to_string());
    }
    args.extend(
        [
            "-c:v", "libx264", "-pix_fmt", "yuv420p", "-preset", "medium", "-crf", "18",
            "-movflags", "+faststart",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.push(output.display().to_string());
    args
}

fn absolute(path: &Path) -> Result<PathBuf, MediaError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Assembles ordered clips through a [`MediaTool`].
///
/// Intermediate files (the concat manifest) are written to `work_dir`.
pub struct Compositor<'a> {
    tool: &'a dyn MediaTool,
    work_dir: PathBuf,
}

impl<'a> Compositor<'a> {
    pub fn new(tool: &'a dyn MediaTool, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            work_dir: work_dir.into(),
        }
    }

    /// Probe every clip that does not yet carry a duration.
    pub async fn probe_durations(&self, clips: &[ClipHandle]) -> Result<Vec<ClipHandle>, MediaError> {
        let mut probed = Vec::with_capacity(clips.len());
        for clip in clips {
            let duration = match clip.duration {
                Some(d) => d,
                None => self.tool.probe_duration(&clip.path).await?,
            };
            log::debug!("{}: {:.3}s", clip.path.display(), duration);
            probed.push(ClipHandle::with_duration(clip.path.clone(), duration));
        }
        Ok(probed)
    }

    /// Join `clips`, in the given order, into a single video at `output`.
    ///
    /// A single clip is copied through unchanged. Tool failures are returned
    /// as-is and never retried.
    pub async fn assemble(
        &self,
        clips: &[ClipHandle],
        kind: TransitionKind,
        transition: f64,
        with_audio: bool,
        output: &Path,
    ) -> Result<PathBuf, MediaError> {
        if clips.is_empty() {
            return Err(MediaError::InvalidPlan("no clips to assemble".to_string()));
        }
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        if clips.len() == 1 {
            log::info!("Single clip, copying to {}", output.display());
            tokio::fs::copy(&clips[0].path, output).await?;
            return Ok(output.to_path_buf());
        }

        log::info!(
            "Assembling {} clips with {:?} transition into {}",
            clips.len(),
            kind,
            output.display()
        );

        let args = match kind {
            TransitionKind::Cut => {
                let mut paths = Vec::with_capacity(clips.len());
                for clip in clips {
                    paths.push(absolute(&clip.path)?);
                }
                let manifest = self.work_dir.join("concat.txt");
                tokio::fs::write(&manifest, concat_manifest(&paths)).await?;
                concat_args(&manifest, output)
            }
            TransitionKind::Crossfade | TransitionKind::Fade => {
                let probed = self.probe_durations(clips).await?;
                let plan = TransitionPlan::new(kind, transition, &probed)?;
                log::debug!("Transition offsets: {:?}", plan.offsets());
                graph_args(&plan, with_audio, output)
            }
        };

        self.tool.run(&args).await?;
        Ok(output.to_path_buf())
    }
}
