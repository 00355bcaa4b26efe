use std::path::Path;

use async_trait::async_trait;

use super::references::{with_reference_note, ReferenceImage};
use crate::fal::{AspectRatio, ClipDuration, FalClient, FalError, Resolution, VideoRequest};

/// Per-clip generation parameters shared by every scene of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipSettings {
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
    pub duration: ClipDuration,
    pub generate_audio: bool,
}

impl Default for ClipSettings {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::default(),
            resolution: Resolution::default(),
            duration: ClipDuration::default(),
            generate_audio: true,
        }
    }
}

impl ClipSettings {
    fn request(&self, prompt: &str) -> VideoRequest {
        VideoRequest {
            aspect_ratio: self.aspect_ratio,
            resolution: self.resolution,
            duration: self.duration,
            generate_audio: self.generate_audio,
            ..VideoRequest::new(prompt)
        }
    }
}

/// Produces one video clip per prompt, written to `dest`.
///
/// Implementations must leave `dest` absent on failure.
#[async_trait]
pub trait SceneGenerator: Send + Sync {
    async fn generate_clip(&self, prompt: &str, settings: &ClipSettings, dest: &Path) -> Result<(), FalError>;

    async fn generate_clip_with_references(
        &self,
        prompt: &str,
        settings: &ClipSettings,
        references: &[ReferenceImage],
        dest: &Path,
    ) -> Result<(), FalError>;
}

/// [`SceneGenerator`] backed by the fal.ai queue API.
pub struct FalSceneGenerator {
    client: FalClient,
}

impl FalSceneGenerator {
    pub fn new(client: FalClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &FalClient {
        &self.client
    }

    async fn generate(&self, request: VideoRequest, dest: &Path) -> Result<(), FalError> {
        match self.client.generate_to_file(&request, dest).await {
            Ok(_) => Ok(()),
            Err(e) => {
                // A half-written download must not be mistaken for a clip.
                let _ = tokio::fs::remove_file(dest).await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl SceneGenerator for FalSceneGenerator {
    async fn generate_clip(&self, prompt: &str, settings: &ClipSettings, dest: &Path) -> Result<(), FalError> {
        self.generate(settings.request(prompt), dest).await
    }

    async fn generate_clip_with_references(
        &self,
        prompt: &str,
        settings: &ClipSettings,
        references: &[ReferenceImage],
        dest: &Path,
    ) -> Result<(), FalError> {
        let mut request = settings.request(&with_reference_note(prompt, references));
        request.image_urls = references.iter().map(|r| r.data_uri.clone()).collect();
        self.generate(request, dest).await
    }
}
