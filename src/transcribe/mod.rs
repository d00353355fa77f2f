//! Audio transcription: probe, segment, transcribe in a small worker pool.
//!
//! ```text
//! file ──▶ probe D ──▶ plan ceil(D/L) spans ──▶ pool(2) ──▶ join by index
//!                                          │
//!                         per span: cut → encode → primary ─fail→ secondary ─fail→ " "
//! ```
//!
//! Each worker cuts its span into its own `segment_{i}_*.mp3` temp file inside
//! a per-job temp directory. The file handle is dropped on every exit path of
//! the worker, which deletes it; the directory goes when the job ends.
//!
//! Segments finish out of order. Progress counts completions; the transcript
//! is joined in segment index order.

pub mod media;

pub use media::{FfmpegTool, MediaTool};

use crate::error::ExtractionError;
use crate::llm::{EscalateOn, Escalation, MediaPart, ModelPair};
use crate::progress::StatusReporter;
use crate::prompts::TRANSCRIPTION_PROMPT;
use crate::question::TranscriptSegment;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Placeholder text for a segment that failed on both tiers.
pub const BLANK_SEGMENT: &str = " ";

/// One planned span of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSpan {
    pub index: usize,
    pub start_secs: u64,
    pub length_secs: u64,
    /// The input is short enough to send as-is, no cutting.
    pub whole_file: bool,
}

/// Split a duration into fixed-length spans.
///
/// A duration up to `segment_secs` yields one whole-file span; longer inputs
/// yield `ceil(duration / segment_secs)` spans starting at `i * segment_secs`.
pub fn plan_segments(duration_secs: f64, segment_secs: u64) -> Vec<SegmentSpan> {
    let segment_secs = segment_secs.max(1);
    if duration_secs <= segment_secs as f64 {
        return vec![SegmentSpan {
            index: 0,
            start_secs: 0,
            length_secs: segment_secs,
            whole_file: true,
        }];
    }
    let count = (duration_secs / segment_secs as f64).ceil() as usize;
    (0..count)
        .map(|index| SegmentSpan {
            index,
            start_secs: index as u64 * segment_secs,
            length_secs: segment_secs,
            whole_file: false,
        })
        .collect()
}

/// The transcription engine.
#[derive(Clone)]
pub struct Transcriber {
    escalation: Escalation,
    media: Arc<dyn MediaTool>,
    workers: usize,
    segment_secs: u64,
    status: StatusReporter,
}

impl Transcriber {
    pub(crate) fn new(
        models: ModelPair,
        media: Arc<dyn MediaTool>,
        workers: usize,
        segment_secs: u64,
        status: StatusReporter,
    ) -> Self {
        Self {
            escalation: Escalation::new(models, EscalateOn::AnyFailure),
            media,
            workers: workers.max(1),
            segment_secs,
            status,
        }
    }

    pub fn media(&self) -> &Arc<dyn MediaTool> {
        &self.media
    }

    /// Transcribe an audio file into one text.
    ///
    /// Fails only when the file cannot be probed or the scratch directory
    /// cannot be created. Segment failures degrade to [`BLANK_SEGMENT`].
    pub async fn transcribe(&self, path: &Path) -> Result<String, ExtractionError> {
        let segments = self.transcribe_segments(path).await?;
        Ok(segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" "))
    }

    /// Transcribe into index-ordered segments.
    pub async fn transcribe_segments(
        &self,
        path: &Path,
    ) -> Result<Vec<TranscriptSegment>, ExtractionError> {
        if !path.exists() {
            return Err(ExtractionError::NotFound {
                reference: path.display().to_string(),
            });
        }

        let duration = self.media.probe_duration(path).await?;
        let plan = plan_segments(duration, self.segment_secs);
        let total = plan.len();

        if total > 1 {
            self.status
                .info(format!("Splitting audio into {total} segments"));
        }
        self.status
            .info(format!("Transcribing audio: {total} segment(s)"));

        let scratch = tempfile::Builder::new()
            .prefix("quiz-audio-")
            .tempdir()
            .map_err(|e| ExtractionError::media("tempdir", e))?;
        let scratch_dir = scratch.path().to_path_buf();
        let source = path.to_path_buf();

        let mut in_flight = stream::iter(plan)
            .map(|span| {
                let source = source.clone();
                let scratch_dir = scratch_dir.clone();
                async move { self.transcribe_span(&source, span, &scratch_dir).await }
            })
            .buffer_unordered(self.workers);

        let mut segments = Vec::with_capacity(total);
        while let Some(segment) = in_flight.next().await {
            segments.push(segment);
            self.status
                .progress(segments.len(), total, "Transcribing audio");
        }
        drop(in_flight);
        drop(scratch);

        segments.sort_by_key(|s| s.index);
        Ok(segments)
    }

    async fn transcribe_span(
        &self,
        source: &Path,
        span: SegmentSpan,
        scratch_dir: &Path,
    ) -> TranscriptSegment {
        let label = format!("segment {}", span.index + 1);
        let text = match self.segment_text(source, span, scratch_dir, &label).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Audio {label} failed, leaving it blank: {e}");
                BLANK_SEGMENT.to_string()
            }
        };
        TranscriptSegment {
            index: span.index,
            text,
        }
    }

    async fn segment_text(
        &self,
        source: &Path,
        span: SegmentSpan,
        scratch_dir: &Path,
        label: &str,
    ) -> Result<String, ExtractionError> {
        // Held until the end of this function; dropping it removes the file.
        let mut cut: Option<tempfile::NamedTempFile> = None;
        let media_path: PathBuf = if span.whole_file {
            source.to_path_buf()
        } else {
            let file = tempfile::Builder::new()
                .prefix(&format!("segment_{}_", span.index + 1))
                .suffix(".mp3")
                .tempfile_in(scratch_dir)
                .map_err(|e| ExtractionError::media("tempfile", e))?;
            let path = file.path().to_path_buf();
            cut = Some(file);
            self.media
                .extract_segment(source, span.start_secs, span.length_secs, &path)
                .await?;
            debug!("Audio {label} cut at {}s", span.start_secs);
            path
        };

        let part = MediaPart::from_path(&media_path)
            .await
            .map_err(|e| ExtractionError::media("read", e))?;

        let result = self
            .escalation
            .attempt(label, |model| {
                let part = part.clone();
                async move { model.complete_with_media(&part, TRANSCRIPTION_PROMPT).await }
            })
            .await;
        drop(cut);

        result
            .map(|escalated| escalated.value)
            .map_err(|e| ExtractionError::Model {
                detail: e.to_string(),
            })
    }
}
