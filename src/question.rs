//! Question data model.
//!
//! A [`Question`] can only be obtained through [`Question::try_from`] on a
//! [`RawQuestion`], so every value of the type satisfies the invariant:
//! non-empty text, exactly four non-empty choices, and a correctness mask of
//! four booleans with exactly one `true`. The fields are private; the only
//! mutation allowed after validation is [`Question::shuffle_choices`], which
//! permutes choices and correctness together.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of choices every question carries.
pub const CHOICE_COUNT: usize = 4;

const LABELS: [char; CHOICE_COUNT] = ['A', 'B', 'C', 'D'];

/// A question record as produced by the model, before validation.
///
/// Accepts the legacy field names `answers` and `explain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawQuestion {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default, alias = "answers")]
    pub correctness: Vec<bool>,
    #[serde(default, alias = "explain")]
    pub explanation: String,
}

/// Why a [`RawQuestion`] was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestionRejection {
    #[error("question text is empty")]
    EmptyQuestion,

    #[error("expected 4 choices, got {0}")]
    ChoiceCount(usize),

    #[error("choice {0} is empty")]
    EmptyChoice(usize),

    #[error("expected 4 correctness flags, got {0}")]
    CorrectnessCount(usize),

    #[error("expected exactly one correct choice, got {0}")]
    CorrectCount(usize),
}

/// A validated multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawQuestion", into = "RawQuestion")]
pub struct Question {
    question: String,
    choices: Vec<String>,
    correctness: Vec<bool>,
    explanation: String,
}

impl TryFrom<RawQuestion> for Question {
    type Error = QuestionRejection;

    fn try_from(raw: RawQuestion) -> Result<Self, Self::Error> {
        let question = raw.question.trim().to_string();
        if question.is_empty() {
            return Err(QuestionRejection::EmptyQuestion);
        }
        if raw.choices.len() != CHOICE_COUNT {
            return Err(QuestionRejection::ChoiceCount(raw.choices.len()));
        }
        let choices: Vec<String> = raw.choices.iter().map(|c| c.trim().to_string()).collect();
        if let Some(i) = choices.iter().position(|c| c.is_empty()) {
            return Err(QuestionRejection::EmptyChoice(i));
        }
        if raw.correctness.len() != CHOICE_COUNT {
            return Err(QuestionRejection::CorrectnessCount(raw.correctness.len()));
        }
        let correct = raw.correctness.iter().filter(|&&b| b).count();
        if correct != 1 {
            return Err(QuestionRejection::CorrectCount(correct));
        }
        Ok(Self {
            question,
            choices,
            correctness: raw.correctness,
            explanation: raw.explanation.trim().to_string(),
        })
    }
}

impl From<Question> for RawQuestion {
    fn from(q: Question) -> Self {
        Self {
            question: q.question,
            choices: q.choices,
            correctness: q.correctness,
            explanation: q.explanation,
        }
    }
}

impl Question {
    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    pub fn correctness(&self) -> &[bool] {
        &self.correctness
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    /// Index of the single correct choice.
    pub fn correct_index(&self) -> usize {
        self.correctness.iter().position(|&b| b).unwrap_or(0)
    }

    pub fn correct_choice(&self) -> &str {
        &self.choices[self.correct_index()]
    }

    /// Label (`'A'`..`'D'`) of the correct choice in the current order.
    pub fn correct_label(&self) -> char {
        LABELS[self.correct_index()]
    }

    /// Choices prefixed `A) `, `B) `, ... for display.
    pub fn labeled_choices(&self) -> Vec<String> {
        LABELS
            .iter()
            .zip(&self.choices)
            .map(|(label, choice)| format!("{label}) {choice}"))
            .collect()
    }

    /// Permute choices and correctness flags with the same permutation.
    pub fn shuffle_choices<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut order: Vec<usize> = (0..CHOICE_COUNT).collect();
        order.shuffle(rng);
        self.choices = order.iter().map(|&i| self.choices[i].clone()).collect();
        self.correctness = order.iter().map(|&i| self.correctness[i]).collect();
    }

    /// Record an answer given by choice index. `None` if the index is out of range.
    pub fn answer(&self, chosen: usize) -> Option<AnswerRecord> {
        let chosen = self.choices.get(chosen)?;
        Some(AnswerRecord {
            question: self.question.clone(),
            chosen: chosen.clone(),
            correct: self.correct_choice().to_string(),
            explanation: self.explanation.clone(),
        })
    }
}

/// Questions generated from one chunk, or merged from many.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionSet {
    pub questions: Vec<Question>,
}

impl QuestionSet {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

impl IntoIterator for QuestionSet {
    type Item = Question;
    type IntoIter = std::vec::IntoIter<Question>;

    fn into_iter(self) -> Self::IntoIter {
        self.questions.into_iter()
    }
}

/// Schema-shaped model output, before per-record validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawQuestionSet {
    pub questions: Vec<RawQuestion>,
}

impl RawQuestionSet {
    /// Validate each record independently; returns kept questions and the
    /// number rejected.
    pub fn validate(self) -> (QuestionSet, usize) {
        let mut kept = Vec::with_capacity(self.questions.len());
        let mut rejected = 0;
        for raw in self.questions {
            match Question::try_from(raw) {
                Ok(q) => kept.push(q),
                Err(e) => {
                    tracing::debug!("Dropping malformed question: {}", e);
                    rejected += 1;
                }
            }
        }
        (QuestionSet::new(kept), rejected)
    }
}

impl From<QuestionSet> for RawQuestionSet {
    fn from(set: QuestionSet) -> Self {
        Self {
            questions: set.questions.into_iter().map(RawQuestion::from).collect(),
        }
    }
}

/// One answered question. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question: String,
    #[serde(alias = "student_answer")]
    pub chosen: String,
    #[serde(alias = "answers")]
    pub correct: String,
    #[serde(alias = "explain")]
    pub explanation: String,
}

impl AnswerRecord {
    pub fn is_correct(&self) -> bool {
        self.chosen.trim() == self.correct.trim()
    }
}

/// Outcome of one exam, consumed by the report pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamResult {
    pub total_questions: usize,
    pub correct_count: usize,
    pub wrong_count: usize,
    pub answers: Vec<AnswerRecord>,
}

impl ExamResult {
    /// Derive the counters from the records.
    pub fn from_answers(answers: Vec<AnswerRecord>) -> Self {
        let correct_count = answers.iter().filter(|a| a.is_correct()).count();
        Self {
            total_questions: answers.len(),
            correct_count,
            wrong_count: answers.len() - correct_count,
            answers,
        }
    }

    /// Percentage of correct answers, 0.0 for an empty exam.
    pub fn accuracy(&self) -> f64 {
        if self.total_questions == 0 {
            0.0
        } else {
            self.correct_count as f64 * 100.0 / self.total_questions as f64
        }
    }
}

/// Text of one transcribed audio segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub index: usize,
    pub text: String,
}
