//! Pipeline stages from extracted text to questions, and from answers to a
//! report.
//!
//! ## Data Flow
//!
//! ```text
//! text ──▶ chunk ──▶ dispatch ──┬──▶ generate ──▶ verify ──┬──▶ pool
//!                               │      (per chunk, concurrent)│
//!                               └─────────────────────────────┘
//!
//! answers ──▶ report (feedback batches ──▶ aggregate ──▶ final)
//! ```
//!
//! 1. [`chunk`]    : token-bounded partition of the normalized text
//! 2. [`generate`] : the per-chunk generate → verify graph
//! 3. [`dispatch`] : concurrent fan-out and the shared question pool
//! 4. [`report`]   : the three-stage performance report

pub mod chunk;
pub mod dispatch;
pub mod generate;
pub mod report;

pub use chunk::{normalize_text, Chunk, Chunker, TiktokenCounter, TokenCounter};
pub use dispatch::{DispatchOutcome, Dispatcher, QuestionPool};
pub use generate::{ChunkState, QuestionGraph};
pub use report::{Report, ReportPipeline};
