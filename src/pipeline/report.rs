//! Three-stage performance report.
//!
//! ```text
//! answers ──▶ batches of 20 ──▶ feedback × ⌈n/20⌉ ──▶ aggregate ──▶ final
//!                                  (one call each)      (one call)   (one call)
//! ```
//!
//! The summary table is rendered here, not by the model, so the counts in the
//! final document always match the exam. All three stages use the primary
//! model only; any failure ends the run with [`QuizError::ReportFailed`].

use crate::config::QuizConfig;
use crate::error::QuizError;
use crate::llm::LanguageModel;
use crate::progress::StatusReporter;
use crate::prompts::{aggregate_prompt, feedback_prompt, final_report_prompt};
use crate::question::{AnswerRecord, ExamResult};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::info;

/// A finished report and the intermediate texts it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Deterministic Markdown summary table.
    pub summary: String,
    /// One feedback text per batch, in batch order.
    pub batch_feedback: Vec<String>,
    /// The aggregated review.
    pub narrative: String,
    /// The final Markdown document.
    pub markdown: String,
}

/// Markdown table with total, correct, incorrect and accuracy.
pub fn summary_table(result: &ExamResult) -> String {
    format!(
        "| Total Questions | Correct Answers | Incorrect Answers | Accuracy |\n\
         |:---:|:---:|:---:|:---:|\n\
         | {} | {} | {} | {:.1}% |",
        result.total_questions,
        result.correct_count,
        result.wrong_count,
        result.accuracy()
    )
}

/// Render answer records the way the feedback prompt expects them.
pub fn format_records(records: &[AnswerRecord]) -> String {
    let mut out = String::new();
    for r in records {
        let _ = write!(
            out,
            "\nQuestion: {}\n\nStudent's Answer: {}\n\nCorrect Answer: {}\n\nExplanation: {}\n\n",
            r.question, r.chosen, r.correct, r.explanation
        );
    }
    out
}

/// Runs the report stages against one model.
#[derive(Clone)]
pub struct ReportPipeline {
    model: Arc<dyn LanguageModel>,
    language: String,
    batch_size: usize,
    status: StatusReporter,
}

impl ReportPipeline {
    pub fn new(model: Arc<dyn LanguageModel>, config: &QuizConfig) -> Self {
        Self {
            model,
            language: config.language.clone(),
            batch_size: config.report_batch_size.max(1),
            status: StatusReporter::new(config.progress_callback.clone()),
        }
    }

    pub async fn run(&self, result: &ExamResult) -> Result<Report, QuizError> {
        let batch_feedback = self.feedback(&result.answers).await?;
        let narrative = self.aggregate(&batch_feedback).await?;
        let summary = summary_table(result);
        self.status.info("Writing final report");
        let markdown = self
            .call("final", final_report_prompt(&summary, &narrative, &self.language))
            .await?;
        info!(
            "Report ready: {} batch(es), {} chars",
            batch_feedback.len(),
            markdown.len()
        );
        Ok(Report {
            summary,
            batch_feedback,
            narrative,
            markdown,
        })
    }

    /// Stage 1: one call per batch, each prompt holding only its batch.
    pub async fn feedback(&self, answers: &[AnswerRecord]) -> Result<Vec<String>, QuizError> {
        let batches: Vec<&[AnswerRecord]> = answers.chunks(self.batch_size).collect();
        let total = batches.len();
        let mut out = Vec::with_capacity(total);
        for (i, batch) in batches.into_iter().enumerate() {
            let prompt = feedback_prompt(&format_records(batch), &self.language);
            out.push(self.call("feedback", prompt).await?);
            self.status.progress(i + 1, total, "Reviewing answers");
        }
        Ok(out)
    }

    /// Stage 2: fold the batch feedback into one narrative.
    pub async fn aggregate(&self, feedback: &[String]) -> Result<String, QuizError> {
        self.call("aggregate", aggregate_prompt(&feedback.join("\n\n"), &self.language))
            .await
    }

    async fn call(&self, stage: &'static str, prompt: String) -> Result<String, QuizError> {
        self.model
            .complete(&prompt)
            .await
            .map(|reply| reply.trim().to_string())
            .map_err(|e| QuizError::ReportFailed {
                stage,
                detail: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::llm::testing::ScriptedModel;

    fn answers(n: usize) -> Vec<AnswerRecord> {
        (0..n)
            .map(|i| AnswerRecord {
                question: format!("Question number {i}?"),
                chosen: if i % 3 == 0 { "wrong".into() } else { "right".into() },
                correct: "right".into(),
                explanation: format!("Because of fact {i}."),
            })
            .collect()
    }

    fn pipeline(model: &Arc<ScriptedModel>) -> ReportPipeline {
        let config = QuizConfig::builder().build().unwrap();
        ReportPipeline::new(model.clone(), &config)
    }

    #[tokio::test]
    async fn twenty_five_answers_make_two_feedback_calls() {
        let model = ScriptedModel::replying("m", "feedback text");
        let report = pipeline(&model)
            .run(&ExamResult::from_answers(answers(25)))
            .await
            .unwrap();

        assert_eq!(report.batch_feedback.len(), 2);
        let prompts = model.prompts.lock().unwrap();
        let feedback_calls = prompts
            .iter()
            .filter(|p| p.contains("Student's Answer:"))
            .count();
        assert_eq!(feedback_calls, 2);
        assert_eq!(prompts.len(), 4);
    }

    #[tokio::test]
    async fn each_batch_prompt_holds_only_its_records() {
        let model = ScriptedModel::replying("m", "ok");
        pipeline(&model)
            .feedback(&answers(25))
            .await
            .unwrap();

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("Question number 19?"));
        assert!(!prompts[0].contains("Question number 20?"));
        assert!(prompts[1].contains("Question number 20?"));
        assert!(!prompts[1].contains("Question number 0?"));
    }

    #[tokio::test]
    async fn final_stage_receives_rendered_summary() {
        let model = ScriptedModel::replying("m", "# Report");
        let result = ExamResult::from_answers(answers(3));
        let report = pipeline(&model).run(&result).await.unwrap();

        assert_eq!(report.markdown, "# Report");
        assert!(report.summary.contains("| 3 | 2 | 1 | 66.7% |"));
        let prompts = model.prompts.lock().unwrap();
        assert!(prompts.last().unwrap().contains(&report.summary));
    }

    #[tokio::test]
    async fn model_failure_is_a_missing_report() {
        let model = ScriptedModel::replying("m", "fine");
        model.push(Ok("batch".into()));
        model.push(Err(ModelError::Transient("503".into())));
        let err = pipeline(&model)
            .run(&ExamResult::from_answers(answers(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, QuizError::ReportFailed { stage: "aggregate", .. }));
    }

    #[test]
    fn records_use_labelled_fields() {
        let text = format_records(&answers(1));
        assert!(text.contains("Question: Question number 0?"));
        assert!(text.contains("Student's Answer: wrong"));
        assert!(text.contains("Correct Answer: right"));
        assert!(text.contains("Explanation: Because of fact 0."));
    }
}
