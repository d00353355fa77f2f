//! Two-tier escalation: try the primary model, retry once on the secondary,
//! then let the caller degrade.
//!
//! The policy object owns the model pair so call sites only describe the
//! call. A logical call escalates at most once; there is no third attempt and
//! no backoff.

use super::{LanguageModel, ModelPair, ModelTier};
use crate::error::ModelError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Which primary failures justify a secondary attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalateOn {
    /// Any failure: service, schema, timeout.
    AnyFailure,
    /// Only server-side conditions ([`ModelError::is_transient`]).
    TransientOnly,
}

/// A value and the tier that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Escalated<T> {
    pub value: T,
    pub tier: ModelTier,
}

/// Both tiers failed, or the primary failure did not qualify for escalation.
#[derive(Debug, Clone, Error)]
pub struct EscalationFailure {
    pub primary: ModelError,
    pub secondary: Option<ModelError>,
}

impl fmt::Display for EscalationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "primary model failed ({})", self.primary)?;
        if let Some(ref secondary) = self.secondary {
            write!(f, "; secondary model failed ({secondary})")?;
        }
        Ok(())
    }
}

/// Small → large retry policy.
#[derive(Clone)]
pub struct Escalation {
    models: ModelPair,
    trigger: EscalateOn,
}

impl Escalation {
    pub fn new(models: ModelPair, trigger: EscalateOn) -> Self {
        Self { models, trigger }
    }

    pub fn primary(&self) -> &Arc<dyn LanguageModel> {
        &self.models.primary
    }

    pub fn secondary(&self) -> &Arc<dyn LanguageModel> {
        &self.models.secondary
    }

    /// Run `call` against the primary model and, if it fails in a way the
    /// trigger accepts, exactly once against the secondary.
    pub async fn attempt<T, F, Fut>(
        &self,
        label: &str,
        mut call: F,
    ) -> Result<Escalated<T>, EscalationFailure>
    where
        F: FnMut(Arc<dyn LanguageModel>) -> Fut,
        Fut: Future<Output = Result<T, ModelError>>,
    {
        let primary_err = match call(Arc::clone(&self.models.primary)).await {
            Ok(value) => {
                return Ok(Escalated {
                    value,
                    tier: ModelTier::Primary,
                })
            }
            Err(e) => e,
        };

        if self.trigger == EscalateOn::TransientOnly && !primary_err.is_transient() {
            warn!("{label}: {} failed, not escalating: {primary_err}", self.models.primary.name());
            return Err(EscalationFailure {
                primary: primary_err,
                secondary: None,
            });
        }

        warn!(
            "{label}: {} failed ({primary_err}), escalating to {}",
            self.models.primary.name(),
            self.models.secondary.name()
        );

        match call(Arc::clone(&self.models.secondary)).await {
            Ok(value) => Ok(Escalated {
                value,
                tier: ModelTier::Secondary,
            }),
            Err(secondary_err) => {
                warn!("{label}: {} failed as well: {secondary_err}", self.models.secondary.name());
                Err(EscalationFailure {
                    primary: primary_err,
                    secondary: Some(secondary_err),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::{pair, ScriptedModel};

    #[tokio::test]
    async fn primary_success_never_touches_secondary() {
        let small = ScriptedModel::replying("small", "ok");
        let large = ScriptedModel::replying("large", "unused");
        let esc = Escalation::new(pair(&small, &large), EscalateOn::AnyFailure);

        let out = esc
            .attempt("test", |m| async move { m.complete("hi").await })
            .await
            .unwrap();

        assert_eq!(out.value, "ok");
        assert_eq!(out.tier, ModelTier::Primary);
        assert_eq!(large.call_count(), 0);
    }

    #[tokio::test]
    async fn failure_escalates_exactly_once() {
        let small = ScriptedModel::failing("small", ModelError::Service("400".into()));
        let large = ScriptedModel::failing("large", ModelError::Transient("503".into()));
        let esc = Escalation::new(pair(&small, &large), EscalateOn::AnyFailure);

        let err = esc
            .attempt("test", |m| async move { m.complete("hi").await })
            .await
            .unwrap_err();

        assert_eq!(small.call_count(), 1);
        assert_eq!(large.call_count(), 1);
        assert!(err.secondary.is_some());
    }

    #[tokio::test]
    async fn transient_only_skips_permanent_errors() {
        let small = ScriptedModel::failing("small", ModelError::Service("401".into()));
        let large = ScriptedModel::replying("large", "ok");
        let esc = Escalation::new(pair(&small, &large), EscalateOn::TransientOnly);

        let err = esc
            .attempt("image", |m| async move { m.complete("hi").await })
            .await
            .unwrap_err();

        assert!(err.secondary.is_none());
        assert_eq!(large.call_count(), 0);
    }

    #[tokio::test]
    async fn transient_only_escalates_server_errors() {
        let small = ScriptedModel::failing("small", ModelError::Transient("500".into()));
        let large = ScriptedModel::replying("large", "text");
        let esc = Escalation::new(pair(&small, &large), EscalateOn::TransientOnly);

        let out = esc
            .attempt("image", |m| async move { m.complete("hi").await })
            .await
            .unwrap();

        assert_eq!(out.tier, ModelTier::Secondary);
        assert_eq!(out.value, "text");
    }

    #[tokio::test]
    async fn post_processing_failure_counts_as_failure() {
        let small = ScriptedModel::replying("small", "not json");
        let large = ScriptedModel::replying("large", "42");
        let esc = Escalation::new(pair(&small, &large), EscalateOn::AnyFailure);

        let out = esc
            .attempt("parse", |m| async move {
                let text = m.complete("number?").await?;
                text.trim()
                    .parse::<u32>()
                    .map_err(|e| ModelError::Schema(e.to_string()))
            })
            .await
            .unwrap();

        assert_eq!(out.value, 42);
        assert_eq!(out.tier, ModelTier::Secondary);
    }
}
