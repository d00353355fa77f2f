//! Image strategy: OCR through a vision-capable model.
//!
//! Unlike every other model call in the crate, the image call escalates only
//! on server-side failures; a refused or malformed request is not retried.

use super::ExtractorRegistry;
use crate::error::ExtractionError;
use crate::llm::MediaPart;
use crate::prompts::IMAGE_PROMPT;
use std::path::Path;

impl ExtractorRegistry {
    pub(super) async fn image(&self, reference: &str) -> Result<String, ExtractionError> {
        self.status.info("Extracting text from image");
        let part = MediaPart::from_path(Path::new(reference))
            .await
            .map_err(|_| ExtractionError::NotFound {
                reference: reference.to_string(),
            })?;

        let result = self
            .vision
            .attempt("image", |model| {
                let part = part.clone();
                async move { model.complete_with_media(&part, IMAGE_PROMPT).await }
            })
            .await
            .map_err(|e| ExtractionError::Model {
                detail: e.to_string(),
            })?;

        if result.tier == crate::llm::ModelTier::Secondary {
            self.status
                .info("Text extracted with the larger model");
        }
        Ok(result.value)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::{ExtractorRegistry, Source, SourceKind};
    use crate::error::{ExtractionError, ModelError};
    use crate::llm::testing::{pair, ScriptedModel};

    fn png() -> tempfile::NamedTempFile {
        let f = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        std::fs::write(f.path(), b"\x89PNG fake").unwrap();
        f
    }

    #[tokio::test]
    async fn server_error_retries_on_large_model() {
        let small = ScriptedModel::failing("small", ModelError::Transient("500 internal".into()));
        let large = ScriptedModel::replying("large", "Slide title\nBullet one");
        let reg = ExtractorRegistry::new(pair(&small, &large), collaborators(), &fast_config());
        let file = png();

        let out = reg
            .extract(&Source::new(SourceKind::Image, file.path().to_str().unwrap()))
            .await;

        assert!(out.succeeded);
        assert_eq!(out.text, "Slide title\nBullet one");
        assert_eq!(large.call_count(), 1);
    }

    #[tokio::test]
    async fn client_error_does_not_escalate() {
        let small = ScriptedModel::failing("small", ModelError::Service("400 bad image".into()));
        let large = ScriptedModel::replying("large", "unused");
        let reg = ExtractorRegistry::new(pair(&small, &large), collaborators(), &fast_config());
        let file = png();

        let out = reg
            .extract(&Source::new(SourceKind::Image, file.path().to_str().unwrap()))
            .await;

        assert!(!out.succeeded);
        assert!(matches!(out.error, Some(ExtractionError::Model { .. })));
        assert_eq!(large.call_count(), 0);
    }
}
