//! The boolean oracle: a yes/no question answered by a model.
//!
//! Uncertainty is a hard "no". Any model failure on both tiers, or a reply
//! that is neither `{"answer": bool}` nor a bare boolean, yields `false`, so
//! gates built on the oracle fail closed.

use super::schema::strip_code_fences;
use super::{EscalateOn, Escalation, ModelPair};
use crate::error::ModelError;
use crate::prompts::oracle_prompt;
use serde::Deserialize;
use tracing::debug;

#[derive(Deserialize)]
struct OracleAnswer {
    answer: bool,
}

/// Parse an oracle reply.
pub fn parse_answer(reply: &str) -> Result<bool, ModelError> {
    let body = strip_code_fences(reply);
    if let Ok(parsed) = serde_json::from_str::<OracleAnswer>(body) {
        return Ok(parsed.answer);
    }
    match body.trim().trim_end_matches('.').to_ascii_lowercase().as_str() {
        "true" | "yes" => Ok(true),
        "false" | "no" => Ok(false),
        _ => Err(ModelError::Schema(format!(
            "expected {{\"answer\": bool}}, got: {}",
            body.chars().take(80).collect::<String>()
        ))),
    }
}

/// Yes/no gate shared by Wikipedia and podcast matching.
#[derive(Clone)]
pub struct BooleanOracle {
    escalation: Escalation,
}

impl BooleanOracle {
    pub fn new(models: ModelPair) -> Self {
        Self {
            escalation: Escalation::new(models, EscalateOn::AnyFailure),
        }
    }

    pub async fn ask(&self, question: &str) -> bool {
        let prompt = oracle_prompt(question);
        let result = self
            .escalation
            .attempt("oracle", |model| {
                let prompt = prompt.clone();
                async move {
                    let reply = model.complete(&prompt).await?;
                    parse_answer(&reply)
                }
            })
            .await;
        match result {
            Ok(answer) => {
                debug!("Oracle answered {} ({} tier)", answer.value, answer.tier);
                answer.value
            }
            Err(e) => {
                debug!("Oracle undecided, treating as false: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::{pair, ScriptedModel};

    #[test]
    fn parses_json_and_bare_answers() {
        assert!(parse_answer(r#"{"answer": true}"#).unwrap());
        assert!(!parse_answer("```json\n{\"answer\": false}\n```").unwrap());
        assert!(parse_answer("True.").unwrap());
        assert!(parse_answer("maybe").is_err());
    }

    #[tokio::test]
    async fn garbage_on_both_tiers_is_false() {
        let small = ScriptedModel::replying("small", "I think so?");
        let large = ScriptedModel::replying("large", "hard to say");
        let oracle = BooleanOracle::new(pair(&small, &large));
        assert!(!oracle.ask("Is this a thing?").await);
        assert_eq!(large.call_count(), 1);
    }

    #[tokio::test]
    async fn service_failure_is_false() {
        let small = ScriptedModel::failing("small", ModelError::Transient("503".into()));
        let large = ScriptedModel::failing("large", ModelError::Timeout { secs: 1 });
        let oracle = BooleanOracle::new(pair(&small, &large));
        assert!(!oracle.ask("Anything?").await);
    }

    #[tokio::test]
    async fn primary_yes_is_true() {
        let small = ScriptedModel::replying("small", r#"{"answer": true}"#);
        let large = ScriptedModel::replying("large", r#"{"answer": false}"#);
        let oracle = BooleanOracle::new(pair(&small, &large));
        assert!(oracle.ask("Is Paris in France?").await);
        assert_eq!(large.call_count(), 0);
    }
}
