//! # edgequake-quiz
//!
//! Turn documents, web pages, videos and podcasts into verified
//! multiple-choice quizzes with LLMs, and turn quiz answers into a
//! performance report.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Source (pdf, docx, url, wiki, youtube, audio, …)
//!  │
//!  ├─ 1. Extract   registry strategy per kind (parsers, captions, transcription, OCR)
//!  ├─ 2. Normalize line endings, invisible characters
//!  ├─ 3. Chunk     ≤ 5000 tokens, zero overlap
//!  ├─ 4. Generate  per chunk: generate → verify, small model first, large on failure
//!  ├─ 5. Collect   validate each record, shuffle choices, append to the pool
//!  └─ 6. Output    questions + per-source and per-run stats
//!
//! ExamResult ──▶ feedback per 20 answers ──▶ aggregate ──▶ final Markdown report
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_quiz::{generate_quiz, QuizConfig, Source};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = QuizConfig::builder().language("English").build()?;
//!     let sources = vec![
//!         "pdf:lecture.pdf".parse::<Source>()?,
//!         "wiki:Alan Turing".parse::<Source>()?,
//!     ];
//!     let output = generate_quiz(&sources, &config).await?;
//!     for q in &output.questions {
//!         println!("{}", q.question());
//!         for choice in q.labeled_choices() {
//!             println!("  {choice}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `quizgen` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-quiz = { version = "0.1", default-features = false }
//! ```
//!
//! ## External tools
//!
//! Audio and video sources need `ffmpeg` and `ffprobe` on `PATH`; the YouTube
//! audio fallback and the podcast matcher need `yt-dlp`. PDF parsing uses
//! pdfium, fetched on first use by `pdfium-auto`.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod llm;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod question;
pub mod session;
pub mod stream;
pub mod transcribe;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{QuizConfig, QuizConfigBuilder, EXAM_CHUNK_TOKENS, LIGHT_CHUNK_TOKENS};
pub use error::{ExtractionError, ModelError, QuizError};
pub use extract::{Collaborators, Extraction, ExtractorRegistry, Source, SourceKind};
pub use llm::{BooleanOracle, EscalateOn, Escalation, LanguageModel, MediaPart, ModelPair, ModelTier};
pub use output::{ChunkQuestions, DispatchStats, QuizOutput, QuizStats, SourceReport};
pub use pipeline::{Chunk, Chunker, Dispatcher, QuestionGraph, QuestionPool, Report, ReportPipeline};
pub use progress::{NoopProgressCallback, ProgressCallback, QuizProgressCallback, StatusLevel};
pub use question::{AnswerRecord, ExamResult, Question, QuestionSet, RawQuestion, TranscriptSegment};
pub use session::{generate_quiz, generate_quiz_sync, write_questions, QuizSession};
pub use stream::{generate_stream, QuestionStream};
pub use transcribe::Transcriber;
