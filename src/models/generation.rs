use crate::error::{GenAiError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct ImageGenerationRequest {
    pub prompt: String,
    pub reference_image: Option<ReferenceImage>,
    pub model_id: Option<String>,
}

/// A user-selected reference image, held as a base64 data URL so it can be
/// embedded inline in a chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceImage {
    data_url: String,
}

impl ReferenceImage {
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            data_url: format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes)),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mime_type = match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("png") => "image/png",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            other => {
                return Err(GenAiError::RequestError(format!(
                    "Unsupported reference image type: {}",
                    other.unwrap_or("none")
                )))
            }
        };

        let bytes = std::fs::read(path).map_err(|e| {
            GenAiError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Ok(Self::from_bytes(mime_type, &bytes))
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }
}

/// Final state of a completed generation, snapshotted when the stream closes.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub image_url: String,
    pub progress: u32,
    pub model: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_encoding() {
        let image = ReferenceImage::from_bytes("image/png", b"abc");
        assert_eq!(image.data_url(), "data:image/png;base64,YWJj");
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let err = ReferenceImage::from_file("photo.tiff").unwrap_err();
        assert!(err.to_string().contains("Unsupported reference image type"));
    }
}
