//! Recording media tool double shared by the media unit tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use super::tool::{MediaError, MediaTool};

/// Records every invocation. `run` writes a placeholder file at the final
/// argument (the output path) so callers see a produced file.
#[derive(Default)]
pub struct RecordingTool {
    pub durations: HashMap<PathBuf, f64>,
    pub fail_runs: bool,
    pub runs: Mutex<Vec<Vec<String>>>,
    pub manifests: Mutex<Vec<String>>,
    pub probes: Mutex<Vec<PathBuf>>,
}

impl RecordingTool {
    pub fn with_durations(durations: &[(&Path, f64)]) -> Self {
        Self {
            durations: durations
                .iter()
                .map(|(p, d)| (p.to_path_buf(), *d))
                .collect(),
            ..Self::default()
        }
    }

    pub fn runs(&self) -> Vec<Vec<String>> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaTool for RecordingTool {
    async fn is_available(&self) -> bool {
        true
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError> {
        self.probes.lock().unwrap().push(path.to_path_buf());
        self.durations
            .get(path)
            .copied()
            .ok_or_else(|| MediaError::ProbeFailed {
                path: path.to_path_buf(),
                message: "unknown clip".to_string(),
            })
    }

    async fn run(&self, args: &[String]) -> Result<(), MediaError> {
        self.runs.lock().unwrap().push(args.to_vec());

        if let Some(pos) = args.iter().position(|a| a == "concat") {
            if let Some(manifest) = args.iter().skip(pos).skip_while(|a| *a != "-i").nth(1) {
                let text = std::fs::read_to_string(manifest)?;
                self.manifests.lock().unwrap().push(text);
            }
        }

        if self.fail_runs {
            return Err(MediaError::ProcessFailed {
                tool: "ffmpeg".to_string(),
                exit_code: Some(1),
                stderr: "simulated failure".to_string(),
            });
        }

        if let Some(output) = args.last() {
            std::fs::write(output, b"assembled")?;
        }
        Ok(())
    }
}
