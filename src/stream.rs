//! Streaming API: emit each chunk's verified questions as soon as they are
//! ready.
//!
//! Unlike the eager [`crate::session::generate_quiz`], which returns only after
//! every chunk finishes, [`generate_stream`] yields [`ChunkQuestions`] items
//! in completion order. Extraction and chunking still happen up front; only
//! the generation stage is streamed.

use crate::config::QuizConfig;
use crate::error::QuizError;
use crate::extract::Source;
use crate::output::ChunkQuestions;
use crate::pipeline::Chunk;
use crate::session::QuizSession;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-chunk question sets.
pub type QuestionStream = Pin<Box<dyn Stream<Item = ChunkQuestions> + Send>>;

/// Generate questions from `sources`, streaming them chunk by chunk.
///
/// # Returns
/// - `Ok(QuestionStream)`, possibly yielding empty sets for unproductive chunks
/// - `Err(QuizError)` for fatal errors (no provider, tokenizer, every source
///   failed)
pub async fn generate_stream(
    sources: &[Source],
    config: &QuizConfig,
) -> Result<QuestionStream, QuizError> {
    let session = QuizSession::new(config.clone())?;
    session.stream(sources).await
}

impl QuizSession {
    /// Extract and chunk `sources`, then stream the generation stage.
    pub async fn stream(&self, sources: &[Source]) -> Result<QuestionStream, QuizError> {
        info!("Starting streaming generation from {} source(s)", sources.len());
        let extractions = self.extract(sources).await;
        let succeeded = extractions.iter().filter(|e| e.succeeded).count();
        if succeeded == 0 {
            return Err(QuizError::NoContentProduced {
                sources: sources.len(),
                succeeded,
            });
        }
        Ok(stream_chunks(self, self.chunk(&extractions)))
    }
}

fn stream_chunks(session: &QuizSession, chunks: Vec<Chunk>) -> QuestionStream {
    let chunks: Vec<Chunk> = chunks.into_iter().filter(|c| !c.is_blank()).collect();
    let width = session
        .config()
        .generation_concurrency
        .unwrap_or(chunks.len())
        .max(1);
    let total = chunks.len();
    let dispatcher = session.dispatcher().clone();
    let status = session.status().clone();

    let s = stream::iter(chunks)
        .map(move |chunk| {
            let dispatcher = dispatcher.clone();
            async move { dispatcher.process(&chunk).await }
        })
        .buffer_unordered(width)
        .enumerate()
        .map(move |(done, item)| {
            status.progress(done + 1, total, "Generating questions");
            item
        });
    Box::pin(s)
}
