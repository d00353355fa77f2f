//! edgequake-llm backed [`LanguageModel`] and provider resolution.
//!
//! Every call is wrapped in `tokio::time::timeout`: text prompts get
//! `api_timeout_secs`, audio and image prompts get `media_timeout_secs`.
//! A timeout surfaces as [`ModelError::Timeout`], which the escalation policy
//! treats as transient.

use super::{LanguageModel, MediaPart, ModelPair};
use crate::config::{QuizConfig, DEFAULT_ESCALATION_MODEL, DEFAULT_PRIMARY_MODEL, DEFAULT_PROVIDER};
use crate::error::{ModelError, QuizError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A [`LanguageModel`] backed by an edgequake-llm provider.
pub struct EdgequakeModel {
    label: String,
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    text_timeout: Duration,
    media_timeout: Duration,
}

impl EdgequakeModel {
    pub fn new(label: impl Into<String>, provider: Arc<dyn LLMProvider>, config: &QuizConfig) -> Self {
        Self {
            label: label.into(),
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            text_timeout: Duration::from_secs(config.api_timeout_secs.max(1)),
            media_timeout: Duration::from_secs(config.media_timeout_secs.max(1)),
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }

    async fn chat(&self, messages: Vec<ChatMessage>, limit: Duration) -> Result<String, ModelError> {
        let start = Instant::now();
        let options = self.options();
        match tokio::time::timeout(limit, self.provider.chat(&messages, Some(&options))).await {
            Err(_) => Err(ModelError::Timeout {
                secs: limit.as_secs(),
            }),
            Ok(Err(e)) => Err(ModelError::classify(e.to_string())),
            Ok(Ok(response)) => {
                debug!(
                    "{}: {} input tokens, {} output tokens, {:?}",
                    self.label,
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                Ok(response.content)
            }
        }
    }
}

#[async_trait]
impl LanguageModel for EdgequakeModel {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        self.chat(vec![ChatMessage::user(prompt)], self.text_timeout)
            .await
    }

    async fn complete_with_media(
        &self,
        media: &MediaPart,
        prompt: &str,
    ) -> Result<String, ModelError> {
        let attachment = ImageData::new(media.data_b64.clone(), media.mime.clone());
        self.chat(
            vec![ChatMessage::user_with_images(prompt, vec![attachment])],
            self.media_timeout,
        )
        .await
    }
}

// ── Resolution ──────────────────────────────────────────────────────────

/// Default (primary, escalation) model ids for a provider.
pub fn default_models(provider: &str) -> (&'static str, &'static str) {
    match provider {
        "openai" => ("gpt-4.1-mini", "gpt-4.1"),
        "anthropic" => ("claude-3-5-haiku-latest", "claude-sonnet-4-20250514"),
        "mistral" => ("mistral-small-latest", "mistral-large-latest"),
        _ => (DEFAULT_PRIMARY_MODEL, DEFAULT_ESCALATION_MODEL),
    }
}

fn create_model(
    provider_name: &str,
    model: &str,
    config: &QuizConfig,
) -> Result<Arc<dyn LanguageModel>, QuizError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        QuizError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok(Arc::new(EdgequakeModel::new(
        format!("{provider_name}/{model}"),
        provider,
        config,
    )))
}

fn named_pair(
    provider_name: &str,
    primary: Option<&str>,
    escalation: Option<&str>,
    config: &QuizConfig,
) -> Result<ModelPair, QuizError> {
    let (default_primary, default_escalation) = default_models(provider_name);
    let primary = primary.unwrap_or(default_primary);
    let escalation = escalation.unwrap_or(default_escalation);
    info!("Models: {provider_name}/{primary} → {provider_name}/{escalation}");
    Ok(ModelPair::new(
        create_model(provider_name, primary, config)?,
        create_model(provider_name, escalation, config)?,
    ))
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Resolve the primary and escalation models, most specific first:
///
/// 1. **Pre-built pair** (`config.models`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model` /
///    `config.escalation_model` or the provider's defaults.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`);
///    the escalation model comes from `EDGEQUAKE_ESCALATION_MODEL` or config.
/// 4. **Key detection**: `GEMINI_API_KEY`/`GOOGLE_API_KEY` selects Gemini,
///    then `OPENAI_API_KEY` selects OpenAI.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`); both tiers share
///    the detected provider.
pub fn resolve_models(config: &QuizConfig) -> Result<ModelPair, QuizError> {
    if let Some(ref models) = config.models {
        return Ok(models.clone());
    }

    if let Some(ref name) = config.provider_name {
        return named_pair(
            name,
            config.model.as_deref(),
            config.escalation_model.as_deref(),
            config,
        );
    }

    if let (Some(prov), Some(model)) = (
        env_nonempty("EDGEQUAKE_LLM_PROVIDER"),
        env_nonempty("EDGEQUAKE_MODEL"),
    ) {
        let escalation = config
            .escalation_model
            .clone()
            .or_else(|| env_nonempty("EDGEQUAKE_ESCALATION_MODEL"));
        return named_pair(&prov, Some(&model), escalation.as_deref(), config);
    }

    if env_nonempty("GEMINI_API_KEY").is_some() || env_nonempty("GOOGLE_API_KEY").is_some() {
        return named_pair(
            DEFAULT_PROVIDER,
            config.model.as_deref(),
            config.escalation_model.as_deref(),
            config,
        );
    }

    if env_nonempty("OPENAI_API_KEY").is_some() {
        return named_pair(
            "openai",
            config.model.as_deref(),
            config.escalation_model.as_deref(),
            config,
        );
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| QuizError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;
    let model: Arc<dyn LanguageModel> =
        Arc::new(EdgequakeModel::new("auto", llm_provider, config));
    Ok(ModelPair::new(model.clone(), model))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_defaults() {
        assert_eq!(
            default_models("gemini"),
            ("gemini-2.0-flash", "gemini-2.5-pro")
        );
    }

    #[test]
    fn unknown_provider_falls_back_to_gemini_pair() {
        assert_eq!(default_models("xai").0, DEFAULT_PRIMARY_MODEL);
    }

    #[test]
    fn prebuilt_pair_wins() {
        use crate::llm::testing::{pair, ScriptedModel};
        let a = ScriptedModel::replying("stub/a", "x");
        let b = ScriptedModel::replying("stub/b", "y");
        let config = QuizConfig::builder()
            .provider_name("does-not-exist")
            .models(pair(&a, &b))
            .build()
            .unwrap();
        let resolved = resolve_models(&config).unwrap();
        assert_eq!(resolved.primary.name(), "stub/a");
        assert_eq!(resolved.secondary.name(), "stub/b");
    }
}
