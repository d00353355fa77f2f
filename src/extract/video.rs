//! Video strategy: demux the audio track to a temp file and transcribe it.

use super::ExtractorRegistry;
use crate::error::ExtractionError;
use std::path::Path;

impl ExtractorRegistry {
    pub(super) async fn video(&self, reference: &str) -> Result<String, ExtractionError> {
        let video = Path::new(reference);
        if !video.exists() {
            return Err(ExtractionError::NotFound {
                reference: reference.to_string(),
            });
        }
        self.status.info("Extracting audio from video");

        // Removed when dropped at the end of this function.
        let audio = tempfile::Builder::new()
            .prefix("quiz-video-audio-")
            .suffix(".mp3")
            .tempfile()
            .map_err(|e| ExtractionError::media("tempfile", e))?;
        self.collab.media.extract_audio(video, audio.path()).await?;
        self.status.info("Audio extracted successfully");

        self.transcriber.transcribe(audio.path()).await
    }
}
