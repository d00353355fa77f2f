//! Media probing and cutting through ffprobe / ffmpeg subprocesses.

use crate::error::ExtractionError;
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Duration probing, segment cutting and audio demuxing.
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Duration of a media file in seconds.
    async fn probe_duration(&self, path: &Path) -> Result<f64, ExtractionError>;

    /// Copy `length_secs` of audio starting at `start_secs` into `output`.
    async fn extract_segment(
        &self,
        input: &Path,
        start_secs: u64,
        length_secs: u64,
        output: &Path,
    ) -> Result<(), ExtractionError>;

    /// Demux the audio track of a video into `output` (mp3).
    async fn extract_audio(&self, video: &Path, output: &Path) -> Result<(), ExtractionError>;
}

/// [`MediaTool`] backed by the ffmpeg command-line tools.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegTool {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<String, ExtractionError> {
        debug!("Running {} {}", program, args.join(" "));
        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExtractionError::media(program, format!("failed to start: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::media(
                program,
                format!("exit status {}: {}", output.status, stderr.trim()),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for FfmpegTool {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

/// Parse ffprobe's `format=duration` output.
pub(crate) fn parse_duration(stdout: &str) -> Result<f64, ExtractionError> {
    let value = stdout.trim();
    value
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| ExtractionError::media("ffprobe", format!("unreadable duration '{value}'")))
}

#[async_trait]
impl MediaTool for FfmpegTool {
    async fn probe_duration(&self, path: &Path) -> Result<f64, ExtractionError> {
        let path = path.to_string_lossy();
        let stdout = self
            .run(
                &self.ffprobe,
                &[
                    "-v",
                    "error",
                    "-show_entries",
                    "format=duration",
                    "-of",
                    "default=noprint_wrappers=1:nokey=1",
                    &path,
                ],
            )
            .await?;
        parse_duration(&stdout)
    }

    async fn extract_segment(
        &self,
        input: &Path,
        start_secs: u64,
        length_secs: u64,
        output: &Path,
    ) -> Result<(), ExtractionError> {
        let start = start_secs.to_string();
        let length = length_secs.to_string();
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.run(
            &self.ffmpeg,
            &[
                "-y", "-v", "error", "-ss", &start, "-t", &length, "-i", &input, "-vn", "-c:a",
                "libmp3lame", &output,
            ],
        )
        .await
        .map(|_| ())
    }

    async fn extract_audio(&self, video: &Path, output: &Path) -> Result<(), ExtractionError> {
        let video = video.to_string_lossy();
        let output = output.to_string_lossy();
        self.run(
            &self.ffmpeg,
            &[
                "-y", "-v", "error", "-i", &video, "-vn", "-c:a", "libmp3lame", "-q:a", "4",
                &output,
            ],
        )
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ffprobe_duration() {
        assert_eq!(parse_duration("3601.25\n").unwrap(), 3601.25);
        assert!(parse_duration("N/A").is_err());
        assert!(parse_duration("-4").is_err());
    }

    #[tokio::test]
    async fn missing_binary_is_media_error() {
        let tool = FfmpegTool::new("ffmpeg-does-not-exist-xyz", "ffprobe-does-not-exist-xyz");
        let err = tool
            .probe_duration(Path::new("whatever.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Media { .. }));
    }
}
