//! Concurrent dispatcher: every chunk through the question graph, results
//! into one shared pool.
//!
//! Chunks run concurrently (all at once unless `generation_concurrency` is
//! set) and finish in any order. Each finished chunk's records are validated
//! one by one; a malformed record is dropped and counted, the rest of its
//! chunk is kept. Survivors have their choices shuffled and are appended to a
//! [`QuestionPool`].

use super::chunk::Chunk;
use super::generate::QuestionGraph;
use crate::config::QuizConfig;
use crate::output::{ChunkQuestions, DispatchStats};
use crate::progress::StatusReporter;
use crate::question::Question;
use futures::stream::{self, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info};

/// Append-only, thread-safe question collection.
///
/// Clones share the same storage. Questions can be added and read but never
/// removed or reordered.
#[derive(Clone, Default)]
pub struct QuestionPool {
    inner: Arc<Mutex<Vec<Question>>>,
}

impl QuestionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&self, questions: impl IntoIterator<Item = Question>) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(questions);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Vec<Question> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Take the contents, cloning only if another handle is still alive.
    pub fn into_questions(self) -> Vec<Question> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(PoisonError::into_inner),
            Err(shared) => shared.lock().unwrap_or_else(PoisonError::into_inner).clone(),
        }
    }
}

/// Questions plus counters from one dispatcher run.
#[derive(Debug, Clone, Default)]
pub struct DispatchOutcome {
    pub questions: Vec<Question>,
    pub stats: DispatchStats,
}

/// Fans chunks out to the question graph.
#[derive(Clone)]
pub struct Dispatcher {
    graph: QuestionGraph,
    language: String,
    concurrency: Option<usize>,
    shuffle: bool,
    seed: Option<u64>,
    status: StatusReporter,
}

impl Dispatcher {
    pub fn new(graph: QuestionGraph, config: &QuizConfig) -> Self {
        Self {
            graph,
            language: config.language.clone(),
            concurrency: config.generation_concurrency,
            shuffle: config.shuffle_choices,
            seed: None,
            status: StatusReporter::new(config.progress_callback.clone()),
        }
    }

    /// Fix the shuffle RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Run the graph over one chunk, validate each record and shuffle the
    /// survivors.
    pub async fn process(&self, chunk: &Chunk) -> ChunkQuestions {
        let (kept, rejected) = self.graph.run(&chunk.text, &self.language).await.validate();
        let mut questions = kept.questions;
        if self.shuffle {
            let mut rng = match self.seed {
                Some(seed) => StdRng::seed_from_u64(seed ^ chunk.index as u64),
                None => StdRng::from_entropy(),
            };
            for q in questions.iter_mut() {
                q.shuffle_choices(&mut rng);
            }
        }
        debug!(
            "Chunk {}: {} question(s) kept, {rejected} rejected",
            chunk.index,
            questions.len()
        );
        ChunkQuestions {
            chunk_index: chunk.index,
            questions,
            rejected,
        }
    }

    /// Process every chunk and return the merged questions.
    pub async fn run(&self, chunks: &[Chunk]) -> DispatchOutcome {
        let pool = QuestionPool::new();
        let stats = self.run_into(chunks, &pool).await;
        DispatchOutcome {
            questions: pool.into_questions(),
            stats,
        }
    }

    /// Process every chunk, appending to a caller-owned pool.
    pub async fn run_into(&self, chunks: &[Chunk], pool: &QuestionPool) -> DispatchStats {
        let start = Instant::now();
        let mut stats = DispatchStats {
            total_chunks: chunks.len(),
            ..Default::default()
        };

        let work: Vec<&Chunk> = chunks.iter().filter(|c| !c.is_blank()).collect();
        stats.skipped_chunks = chunks.len() - work.len();
        let total = work.len();
        let width = self.concurrency.unwrap_or(total).max(1);
        info!("Generating questions from {total} chunk(s), concurrency {width}");
        self.status
            .info(format!("Generating questions from {total} chunk(s)"));

        let mut finished = stream::iter(work)
            .map(|chunk| self.process(chunk))
            .buffer_unordered(width);

        let mut completed = 0;
        while let Some(batch) = finished.next().await {
            completed += 1;
            stats.rejected_questions += batch.rejected;
            if batch.questions.is_empty() {
                stats.empty_chunks += 1;
            }
            stats.questions += batch.questions.len();
            pool.extend(batch.questions);
            self.status
                .progress(completed, total, "Generating questions");
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Generated {} question(s) from {} chunk(s) in {}ms",
            stats.questions, total, stats.duration_ms
        );
        stats
    }
}
