//! Background music overlay.

use std::path::{Path, PathBuf};

use super::tool::{MediaError, MediaTool};

/// Check a gain fraction is within `[0, 1]`.
pub fn validate_volume(volume: f32) -> Result<(), MediaError> {
    if !(0.0..=1.0).contains(&volume) {
        return Err(MediaError::InvalidInput(format!(
            "music volume must be between 0.0 and 1.0, got {}",
            volume
        )));
    }
    Ok(())
}

/// Filter program mixing input 1 (music) under input 0 (video audio).
///
/// Without source audio the attenuated music becomes the only track.
pub fn mix_filter(volume: f32, video_has_audio: bool) -> String {
    if video_has_audio {
        format!(
            "[1:a]volume={:.4}[bg];[0:a][bg]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[aout]",
            volume
        )
    } else {
        format!("[1:a]volume={:.4}[aout]", volume)
    }
}

fn mix_args(video: &Path, music: &Path, volume: f32, video_has_audio: bool, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = ["-y", "-hide_banner", "-loglevel", "error", "-i"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    args.push(video.display().to_string());
    args.push("-i".to_string());
    args.push(music.display().to_string());
    args.push("-filter_complex".to_string());
    args.push(mix_filter(volume, video_has_audio));
    args.extend(
        [
            "-map", "0:v", "-map", "[aout]", "-c:v", "copy", "-c:a", "aac", "-b:a", "192k",
            "-shortest",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.push(output.display().to_string());
    args
}

/// Overlays a background track onto an assembled video.
pub struct AudioMixer<'a> {
    tool: &'a dyn MediaTool,
}

impl<'a> AudioMixer<'a> {
    pub fn new(tool: &'a dyn MediaTool) -> Self {
        Self { tool }
    }

    /// Mix `music` under `video` at `volume`, writing `output`.
    ///
    /// The video stream is copied; only audio is re-encoded.
    ///
    /// # Errors
    ///
    /// `MediaError::InvalidInput` if either input is missing or the volume is
    /// out of range, checked before the tool runs.
    pub async fn mix(
        &self,
        video: &Path,
        music: &Path,
        volume: f32,
        video_has_audio: bool,
        output: &Path,
    ) -> Result<PathBuf, MediaError> {
        validate_volume(volume)?;
        for (what, path) in [("video", video), ("music", music)] {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                return Err(MediaError::InvalidInput(format!(
                    "{} file not found: {}",
                    what,
                    path.display()
                )));
            }
        }
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        log::info!(
            "Mixing background music {} at volume {:.2}",
            music.display(),
            volume
        );
        self.tool
            .run(&mix_args(video, music, volume, video_has_audio, output))
            .await?;
        Ok(output.to_path_buf())
    }
}
