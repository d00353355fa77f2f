//! The per-chunk question graph: `generate → verify → done`.
//!
//! Both nodes ask for JSON in the question-set shape and go through the same
//! [`Escalation`] policy: a call that fails or returns output that does not
//! parse as a question set is retried once on the large model. When both
//! tiers fail the node leaves an empty set behind and the chunk contributes
//! nothing.
//!
//! The graph is a straight line. There is no loop back from verify and no
//! branch other than skipping verify when there is nothing to verify.

use crate::llm::schema::parse_question_set;
use crate::llm::{EscalateOn, Escalation, ModelPair};
use crate::prompts::{question_prompt, verify_prompt};
use crate::question::RawQuestionSet;
use tracing::{debug, warn};

/// State threaded through the graph for one chunk.
#[derive(Debug, Clone, Default)]
pub struct ChunkState {
    pub language: String,
    pub context: String,
    /// Output of the generate node. `None` until it has run.
    pub candidates: Option<RawQuestionSet>,
    /// Output of the verify node. `None` until it has run.
    pub verified: Option<RawQuestionSet>,
}

impl ChunkState {
    pub fn new(context: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            context: context.into(),
            ..Default::default()
        }
    }

    /// The verified set, or empty if verification never produced one.
    pub fn into_output(self) -> RawQuestionSet {
        self.verified.unwrap_or_default()
    }
}

/// Runs generate and verify for a chunk.
#[derive(Clone)]
pub struct QuestionGraph {
    escalation: Escalation,
}

impl QuestionGraph {
    pub fn new(models: ModelPair) -> Self {
        Self {
            escalation: Escalation::new(models, EscalateOn::AnyFailure),
        }
    }

    /// Run the whole graph over one chunk of text.
    pub async fn run(&self, context: &str, language: &str) -> RawQuestionSet {
        let mut state = ChunkState::new(context, language);
        self.generate(&mut state).await;
        self.verify(&mut state).await;
        state.into_output()
    }

    /// Generate node: candidate questions from the context.
    pub async fn generate(&self, state: &mut ChunkState) {
        let prompt = question_prompt(&state.context, &state.language);
        let candidates = self.structured_call("generate", prompt).await;
        debug!("generate: {} candidate(s)", candidates.questions.len());
        state.candidates = Some(candidates);
    }

    /// Verify node: keep only questions answerable from the context alone.
    pub async fn verify(&self, state: &mut ChunkState) {
        let candidates = match state.candidates.as_ref() {
            Some(set) if !set.questions.is_empty() => set,
            _ => {
                state.verified = Some(RawQuestionSet::default());
                return;
            }
        };
        let candidates_json = match serde_json::to_string(candidates) {
            Ok(json) => json,
            Err(e) => {
                warn!("verify: cannot serialise candidates: {e}");
                state.verified = Some(RawQuestionSet::default());
                return;
            }
        };
        let prompt = verify_prompt(&state.context, &candidates_json, &state.language);
        let verified = self.structured_call("verify", prompt).await;
        debug!(
            "verify: kept {} of {}",
            verified.questions.len(),
            candidates.questions.len()
        );
        state.verified = Some(verified);
    }

    async fn structured_call(&self, label: &str, prompt: String) -> RawQuestionSet {
        let result = self
            .escalation
            .attempt(label, |model| {
                let prompt = prompt.clone();
                async move {
                    let reply = model.complete(&prompt).await?;
                    parse_question_set(&reply)
                }
            })
            .await;
        match result {
            Ok(escalated) => escalated.value,
            Err(e) => {
                warn!("{label}: dropping chunk output, {e}");
                RawQuestionSet::default()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    /// A schema-valid reply with one question about Paris.
    pub(crate) const PARIS_REPLY: &str = r#"{"questions": [{
        "question": "What is the capital of France?",
        "choices": ["Paris", "Lyon", "Marseille", "Nice"],
        "correctness": [true, false, false, false],
        "explanation": "The text states that the capital of France is Paris."
    }]}"#;
}
