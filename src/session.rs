//! Eager entry points and the session object that owns a run's components.
//!
//! A [`QuizSession`] is built once from a [`QuizConfig`] and holds everything
//! a run needs: the model pair, the extractor registry, the chunker, the
//! dispatcher and the report pipeline. Nothing lives in globals, so two
//! sessions with different settings can run side by side.
//!
//! Use [`crate::stream::generate_stream`] instead when you want questions
//! chunk by chunk as they are verified.

use crate::config::QuizConfig;
use crate::error::QuizError;
use crate::extract::{Collaborators, Extraction, ExtractorRegistry, Source};
use crate::llm::{resolve_models, ModelPair};
use crate::output::{QuizOutput, QuizStats, SourceReport};
use crate::pipeline::{normalize_text, Chunk, Chunker, Dispatcher, QuestionGraph, Report, ReportPipeline};
use crate::progress::StatusReporter;
use crate::question::{ExamResult, Question};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Everything a quiz run needs, built once per configuration.
pub struct QuizSession {
    config: QuizConfig,
    models: ModelPair,
    registry: ExtractorRegistry,
    chunker: Chunker,
    dispatcher: Dispatcher,
    status: StatusReporter,
}

impl QuizSession {
    /// Resolve models and build the production collaborators.
    pub fn new(config: QuizConfig) -> Result<Self, QuizError> {
        let models = resolve_models(&config)?;
        let collab = Collaborators::from_config(&config)?;
        let chunker = Chunker::tiktoken(config.chunk_tokens)?;
        Ok(Self::with_parts(config, models, collab, chunker))
    }

    /// Assemble a session from explicit parts.
    pub fn with_parts(
        config: QuizConfig,
        models: ModelPair,
        collab: Collaborators,
        chunker: Chunker,
    ) -> Self {
        let registry = ExtractorRegistry::new(models.clone(), collab, &config);
        let dispatcher = Dispatcher::new(QuestionGraph::new(models.clone()), &config);
        let status = StatusReporter::new(config.progress_callback.clone());
        debug!("Session ready: {:?}", models);
        Self {
            config,
            models,
            registry,
            chunker,
            dispatcher,
            status,
        }
    }

    pub fn config(&self) -> &QuizConfig {
        &self.config
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub(crate) fn status(&self) -> &StatusReporter {
        &self.status
    }

    /// Extract every source in input order. Failures are recorded, not raised.
    pub async fn extract(&self, sources: &[Source]) -> Vec<Extraction> {
        let mut out = Vec::with_capacity(sources.len());
        for source in sources {
            out.push(self.registry.extract(source).await);
        }
        out
    }

    /// Chunk each successful extraction separately; indices run across all
    /// of them.
    pub fn chunk(&self, extractions: &[Extraction]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for extraction in extractions.iter().filter(|e| e.succeeded) {
            chunks.extend(self.chunker.split(&normalize_text(&extraction.text)));
        }
        for (index, chunk) in chunks.iter_mut().enumerate() {
            chunk.index = index;
        }
        chunks
    }

    /// Extract, chunk and generate.
    ///
    /// # Errors
    /// [`QuizError::NoContentProduced`] when no question survived, whether
    /// because every source failed or every chunk came back empty.
    pub async fn generate(&self, sources: &[Source]) -> Result<QuizOutput, QuizError> {
        let total_start = Instant::now();
        info!("Starting quiz generation from {} source(s)", sources.len());

        // ── Extract ──────────────────────────────────────────────────────
        let extract_start = Instant::now();
        let extractions = self.extract(sources).await;
        let extract_duration_ms = extract_start.elapsed().as_millis() as u64;

        // ── Chunk ────────────────────────────────────────────────────────
        let chunks = self.chunk(&extractions);
        self.status
            .info(format!("Document split into {} chunk(s)", chunks.len()));

        // ── Generate ─────────────────────────────────────────────────────
        let outcome = self.dispatcher.run(&chunks).await;

        let reports: Vec<SourceReport> = extractions.iter().map(SourceReport::from).collect();
        let mut stats = QuizStats {
            sources: sources.len(),
            sources_succeeded: reports.iter().filter(|r| r.succeeded).count(),
            text_chars: reports.iter().map(|r| r.chars).sum(),
            extract_duration_ms,
            ..Default::default()
        };
        stats.absorb(&outcome.stats);
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

        if outcome.questions.is_empty() {
            return Err(QuizError::NoContentProduced {
                sources: stats.sources,
                succeeded: stats.sources_succeeded,
            });
        }

        info!(
            "Quiz complete: {} question(s) from {}/{} source(s), {}ms total",
            stats.questions, stats.sources_succeeded, stats.sources, stats.total_duration_ms
        );
        Ok(QuizOutput {
            questions: outcome.questions,
            sources: reports,
            stats,
        })
    }

    /// Build the three-stage report for a finished exam. Uses the primary
    /// model only.
    pub async fn report(&self, result: &ExamResult) -> Result<Report, QuizError> {
        ReportPipeline::new(self.models.primary.clone(), &self.config)
            .run(result)
            .await
    }
}

/// Generate a quiz from `sources` with a fresh session.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(QuizOutput)` even if some sources failed (see `output.sources`).
///
/// # Errors
/// Returns `Err(QuizError)` only for fatal errors: no provider, invalid
/// tokenizer, or no question produced at all.
pub async fn generate_quiz(sources: &[Source], config: &QuizConfig) -> Result<QuizOutput, QuizError> {
    QuizSession::new(config.clone())?.generate(sources).await
}

/// Synchronous wrapper around [`generate_quiz`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_quiz_sync(sources: &[Source], config: &QuizConfig) -> Result<QuizOutput, QuizError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| QuizError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate_quiz(sources, config))
}

/// Write questions as `{"questions": [...]}` JSON.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_questions(questions: &[Question], path: impl AsRef<Path>) -> Result<(), QuizError> {
    let path = path.as_ref();
    let write_err = |source: std::io::Error| QuizError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let body = serde_json::to_string_pretty(&serde_json::json!({ "questions": questions }))
        .map_err(|e| QuizError::Internal(format!("serialise questions: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, body).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::testing::{collaborators, StubDocuments};
    use crate::extract::SourceKind;
    use crate::llm::testing::{pair, ScriptedModel};
    use crate::pipeline::chunk::testing::WordCounter;
    use crate::question::QuestionSet;
    use std::sync::Arc;

    fn session(model: &Arc<ScriptedModel>, collab: Collaborators) -> QuizSession {
        let config = QuizConfig::builder().chunk_tokens(100).build().unwrap();
        QuizSession::with_parts(
            config,
            pair(model, model),
            collab,
            Chunker::new(Arc::new(WordCounter), 100),
        )
    }

    #[tokio::test]
    async fn failed_sources_are_reported_not_raised() {
        let model = ScriptedModel::replying("m", crate::pipeline::generate::testing::PARIS_REPLY);
        let s = session(&model, collaborators());
        let sources = [
            Source::new(SourceKind::Text, "The capital of France is Paris."),
            Source::new(SourceKind::Youtube, "not a video"),
        ];

        let out = s.generate(&sources).await.unwrap();

        assert_eq!(out.questions.len(), 1);
        assert_eq!(out.stats.sources, 2);
        assert_eq!(out.stats.sources_succeeded, 1);
        assert!(!out.sources[1].succeeded);
        assert!(out.sources[1].error.is_some());
    }

    #[tokio::test]
    async fn no_questions_is_fatal() {
        let model = ScriptedModel::replying("m", r#"{"questions": []}"#);
        let s = session(&model, collaborators());
        let err = s
            .generate(&[Source::new(SourceKind::Text, "Nothing to ask about here.")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QuizError::NoContentProduced {
                sources: 1,
                succeeded: 1
            }
        ));
    }

    #[tokio::test]
    async fn chunk_indices_run_across_sources() {
        let model = ScriptedModel::replying("m", "");
        let mut collab = collaborators();
        collab.documents = Arc::new(StubDocuments {
            passages: vec!["word ".repeat(150)],
        });
        let s = session(&model, collab);
        let extractions = s
            .extract(&[
                Source::new(SourceKind::Pdf, "a.pdf"),
                Source::new(SourceKind::Text, "short text"),
            ])
            .await;

        let chunks = s.chunk(&extractions);

        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(chunks[2].text, "short text");
    }

    #[tokio::test]
    async fn written_file_round_trips_through_question_set() {
        let model = ScriptedModel::replying("m", crate::pipeline::generate::testing::PARIS_REPLY);
        let s = session(&model, collaborators());
        let out = s
            .generate(&[Source::new(SourceKind::Text, "The capital of France is Paris.")])
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("quiz.json");
        write_questions(&out.questions, &path).await.unwrap();

        let read: QuestionSet = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(read.questions, out.questions);
        assert!(!path.with_extension("json.tmp").exists());
    }
}
