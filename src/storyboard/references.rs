//! Reference images for character consistency.
//!
//! Images are sent inline as base64 `data:` URIs, so no upload step is needed.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::prelude::*;

use crate::error::StoryboardError;

pub const MAX_REFERENCE_IMAGES: usize = 3;

/// A loaded reference image, ready to send.
#[derive(Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    /// "reference image N", 1-based.
    pub label: String,
    pub path: PathBuf,
    pub mime_type: &'static str,
    pub data_uri: String,
}

impl fmt::Debug for ReferenceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceImage")
            .field("label", &self.label)
            .field("path", &self.path)
            .field("mime_type", &self.mime_type)
            .field("data_uri_len", &self.data_uri.len())
            .finish()
    }
}

/// Reject sets outside `1..=MAX_REFERENCE_IMAGES`.
pub fn validate_reference_count(count: usize) -> Result<(), StoryboardError> {
    if count == 0 || count > MAX_REFERENCE_IMAGES {
        return Err(StoryboardError::validation(format!(
            "expected 1 to {} reference images, got {}",
            MAX_REFERENCE_IMAGES, count
        )));
    }
    Ok(())
}

fn mime_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Read and encode each image, labelled in the order given.
pub async fn load_references(paths: &[PathBuf]) -> Result<Vec<ReferenceImage>, StoryboardError> {
    validate_reference_count(paths.len())?;

    let mut images = Vec::with_capacity(paths.len());
    for (i, path) in paths.iter().enumerate() {
        let mime_type = mime_type_for(path).ok_or_else(|| {
            StoryboardError::validation(format!(
                "unsupported reference image type: {} (expected png, jpg or webp)",
                path.display()
            ))
        })?;

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            StoryboardError::validation(format!(
                "cannot read reference image {}: {}",
                path.display(),
                e
            ))
        })?;
        if bytes.is_empty() {
            return Err(StoryboardError::validation(format!(
                "reference image is empty: {}",
                path.display()
            )));
        }

        let label = format!("reference image {}", i + 1);
        log::debug!("Loaded {} from {} ({} bytes)", label, path.display(), bytes.len());

        images.push(ReferenceImage {
            label,
            path: path.clone(),
            mime_type,
            data_uri: format!("data:{};base64,{}", mime_type, BASE64_STANDARD.encode(&bytes)),
        });
    }
    Ok(images)
}

/// Append a sentence naming the attached images by label, so the model can
/// tie `image_urls` to the prompt.
///
/// `"the hero waves"` with two images gives
/// `"the hero waves. Keep the character consistent with reference image 1 and reference image 2."`
pub fn with_reference_note(prompt: &str, references: &[ReferenceImage]) -> String {
    let labels: Vec<&str> = references.iter().map(|r| r.label.as_str()).collect();
    let named = match labels.split_last() {
        None => return prompt.to_string(),
        Some((last, [])) => last.to_string(),
        Some((last, rest)) => format!("{} and {}", rest.join(", "), last),
    };
    format!(
        "{}. Keep the character consistent with {}.",
        prompt.trim_end().trim_end_matches('.'),
        named
    )
}
