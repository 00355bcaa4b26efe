//! Request body and parameter enums for fal.ai video generation.

use serde::{Deserialize, Serialize};

/// Output aspect ratio accepted by the video models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
        }
    }
}

/// Output resolution accepted by the video models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "720p")]
    Hd,
    #[serde(rename = "1080p")]
    FullHd,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hd => "720p",
            Self::FullHd => "1080p",
        }
    }
}

/// Clip length. The service only accepts a few discrete values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClipDuration {
    #[serde(rename = "4s")]
    Four,
    #[serde(rename = "6s")]
    Six,
    #[default]
    #[serde(rename = "8s")]
    Eight,
}

impl ClipDuration {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Four => "4s",
            Self::Six => "6s",
            Self::Eight => "8s",
        }
    }

    pub fn seconds(self) -> u32 {
        match self {
            Self::Four => 4,
            Self::Six => 6,
            Self::Eight => 8,
        }
    }
}

/// Request body for a single clip generation.
///
/// `image_urls` is only sent to the reference-to-video endpoint and is
/// omitted from the body when empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoRequest {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
    pub duration: ClipDuration,
    pub generate_audio: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub image_urls: Vec<String>,
}

impl VideoRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: AspectRatio::default(),
            resolution: Resolution::default(),
            duration: ClipDuration::default(),
            generate_audio: true,
            image_urls: Vec::new(),
        }
    }

    /// Whether this request targets the reference-to-video endpoint.
    pub fn has_references(&self) -> bool {
        !self.image_urls.is_empty()
    }
}
