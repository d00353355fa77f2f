//! Model layer: the [`LanguageModel`] seam and the policies built on it.
//!
//! Every stage of the pipeline talks to models through [`LanguageModel`], a
//! narrow async trait with a text call and a media call. The production
//! implementation ([`provider::EdgequakeModel`]) wraps an edgequake-llm
//! provider; tests substitute deterministic stubs.
//!
//! ```text
//! LanguageModel ◀── EdgequakeModel (edgequake-llm, timeouts)
//!      ▲
//!      ├── Escalation     primary → secondary → degrade
//!      ├── BooleanOracle  yes/no gate, any failure = "no"
//!      └── schema         fence stripping + JSON question sets
//! ```

pub mod escalation;
pub mod oracle;
pub mod provider;
pub mod schema;

pub use escalation::{EscalateOn, Escalated, Escalation, EscalationFailure};
pub use oracle::BooleanOracle;
pub use provider::{resolve_models, EdgequakeModel};

use crate::error::ModelError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A text/multimodal completion service.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Identifier for logs, e.g. `gemini/gemini-2.0-flash`.
    fn name(&self) -> &str;

    /// Complete a text prompt.
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;

    /// Complete a prompt about an attached audio or image file.
    async fn complete_with_media(
        &self,
        media: &MediaPart,
        prompt: &str,
    ) -> Result<String, ModelError>;
}

/// Which tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelTier {
    Primary,
    Secondary,
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelTier::Primary => f.write_str("primary"),
            ModelTier::Secondary => f.write_str("secondary"),
        }
    }
}

/// The small model tried first and the large model used on escalation.
#[derive(Clone)]
pub struct ModelPair {
    pub primary: Arc<dyn LanguageModel>,
    pub secondary: Arc<dyn LanguageModel>,
}

impl ModelPair {
    pub fn new(primary: Arc<dyn LanguageModel>, secondary: Arc<dyn LanguageModel>) -> Self {
        Self { primary, secondary }
    }
}

impl fmt::Debug for ModelPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelPair")
            .field("primary", &self.primary.name())
            .field("secondary", &self.secondary.name())
            .finish()
    }
}

/// An inline media attachment: base64 payload plus MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPart {
    pub mime: String,
    pub data_b64: String,
}

impl MediaPart {
    pub fn from_bytes(bytes: &[u8], mime: impl Into<String>) -> Self {
        let data_b64 = STANDARD.encode(bytes);
        tracing::debug!("Encoded media → {} bytes base64", data_b64.len());
        Self {
            mime: mime.into(),
            data_b64,
        }
    }

    /// Read and encode a file; MIME type is taken from the extension.
    pub async fn from_path(path: &std::path::Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::from_bytes(&bytes, mime_for_path(path)))
    }
}

/// MIME type for the audio, video and image extensions the crate handles.
pub fn mime_for_path(path: &std::path::Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "mp4" | "mpeg4" => "video/mp4",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn media_part_encodes_base64() {
        let part = MediaPart::from_bytes(b"hello", "audio/mpeg");
        assert_eq!(part.data_b64, "aGVsbG8=");
        assert_eq!(part.mime, "audio/mpeg");
    }

    #[test]
    fn mime_lookup_is_case_insensitive() {
        assert_eq!(mime_for_path(Path::new("talk.MP3")), "audio/mpeg");
        assert_eq!(mime_for_path(Path::new("scan.jpeg")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("noext")), "application/octet-stream");
    }
}
