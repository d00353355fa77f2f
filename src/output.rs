//! Result types returned by the quiz entry points.

use crate::extract::{Extraction, Source};
use crate::question::Question;
use serde::{Deserialize, Serialize};

/// Everything a quiz run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizOutput {
    /// Validated, choice-shuffled questions in no particular order.
    pub questions: Vec<Question>,
    /// One entry per input source, in input order.
    pub sources: Vec<SourceReport>,
    pub stats: QuizStats,
}

/// What happened to one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    pub source: Source,
    pub succeeded: bool,
    /// Characters of extracted text.
    pub chars: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Extraction> for SourceReport {
    fn from(e: &Extraction) -> Self {
        Self {
            source: e.source.clone(),
            succeeded: e.succeeded,
            chars: e.text.chars().count(),
            error: e.error.as_ref().map(|err| err.to_string()),
        }
    }
}

/// Counters for one dispatcher run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    /// Chunks handed to the dispatcher.
    pub total_chunks: usize,
    /// Whitespace-only chunks skipped without a model call.
    pub skipped_chunks: usize,
    /// Chunks whose graph run produced no valid question.
    pub empty_chunks: usize,
    /// Records dropped by per-record validation.
    pub rejected_questions: usize,
    pub questions: usize,
    pub duration_ms: u64,
}

/// Counters for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizStats {
    pub sources: usize,
    pub sources_succeeded: usize,
    pub text_chars: usize,
    pub chunks: usize,
    pub skipped_chunks: usize,
    pub empty_chunks: usize,
    pub rejected_questions: usize,
    pub questions: usize,
    pub extract_duration_ms: u64,
    pub generate_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl QuizStats {
    pub(crate) fn absorb(&mut self, dispatch: &DispatchStats) {
        self.chunks = dispatch.total_chunks;
        self.skipped_chunks = dispatch.skipped_chunks;
        self.empty_chunks = dispatch.empty_chunks;
        self.rejected_questions = dispatch.rejected_questions;
        self.questions = dispatch.questions;
        self.generate_duration_ms = dispatch.duration_ms;
    }
}

/// Validated questions from one chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkQuestions {
    pub chunk_index: usize,
    pub questions: Vec<Question>,
    /// Records dropped by validation.
    pub rejected: usize,
}
