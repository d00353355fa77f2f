//! Configuration types for quiz generation.
//!
//! Every knob lives in [`QuizConfig`], built via [`QuizConfigBuilder`]. One
//! struct makes it easy to share a config across the concurrent workers of a
//! run and to log exactly which settings produced a given question set.

use crate::error::QuizError;
use crate::llm::ModelPair;
use crate::progress::ProgressCallback;
use std::fmt;

/// Token budget per chunk for full exam creation.
pub const EXAM_CHUNK_TOKENS: usize = 5000;

/// Token budget per chunk for the lighter, quicker variant.
pub const LIGHT_CHUNK_TOKENS: usize = 2000;

/// Provider used when nothing else is configured or detected.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Small, fast model tried first for every call.
pub const DEFAULT_PRIMARY_MODEL: &str = "gemini-2.0-flash";

/// Larger model used once when the primary fails.
pub const DEFAULT_ESCALATION_MODEL: &str = "gemini-2.5-pro";

/// Configuration for extraction, generation and reporting.
///
/// Built via [`QuizConfig::builder()`] or using [`QuizConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_quiz::QuizConfig;
///
/// let config = QuizConfig::builder()
///     .language("French")
///     .chunk_tokens(2000)
///     .model("gemini-2.0-flash")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct QuizConfig {
    /// Output language for questions and reports. Default: "English".
    pub language: String,

    /// Maximum tokens per chunk. Default: 5000.
    ///
    /// Large enough that one chunk holds a coherent section of a chapter,
    /// small enough that the generation prompt plus the JSON answer fit in the
    /// context of a flash-class model. Use [`LIGHT_CHUNK_TOKENS`] for quicker,
    /// denser question sets.
    pub chunk_tokens: usize,

    /// Upper bound on concurrently processed chunks. Default: None (all chunks
    /// at once).
    pub generation_concurrency: Option<usize>,

    /// Shuffle each validated question's choices. Default: true.
    ///
    /// Models tend to put the correct answer first; shuffling removes that bias.
    pub shuffle_choices: bool,

    /// Concurrent transcription workers. Default: 2.
    ///
    /// Each worker holds an ffmpeg child process and a multi-megabyte upload,
    /// so this pool stays small regardless of segment count.
    pub transcription_workers: usize,

    /// Audio segment length in seconds. Default: 1200 (20 minutes).
    pub segment_secs: u64,

    /// Caption fetch attempts before falling back to audio. Default: 3.
    pub transcript_attempts: u32,

    /// Delay between caption fetch attempts in milliseconds. Default: 1000.
    pub transcript_retry_delay_ms: u64,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic").
    /// If None, uses environment detection.
    pub provider_name: Option<String>,

    /// Primary (small) model identifier. If None, uses [`DEFAULT_PRIMARY_MODEL`].
    pub model: Option<String>,

    /// Escalation (large) model identifier. If None, uses [`DEFAULT_ESCALATION_MODEL`].
    pub escalation_model: Option<String>,

    /// Pre-constructed model pair. Takes precedence over provider/model names.
    pub models: Option<ModelPair>,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 8192.
    ///
    /// A 5000-token chunk typically yields 8–15 questions with explanations,
    /// around 3000 output tokens; 8192 leaves room for verbose languages.
    pub max_tokens: usize,

    /// Timeout for text model calls in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Timeout for audio and image model calls in seconds. Default: 600.
    ///
    /// A 20-minute audio segment takes far longer to transcribe than a text
    /// prompt takes to answer.
    pub media_timeout_secs: u64,

    /// Timeout for HTTP downloads (web pages, Wikipedia, captions). Default: 120.
    pub download_timeout_secs: u64,

    /// Answer records per feedback call in the report pipeline. Default: 20.
    pub report_batch_size: usize,

    /// Wikipedia language edition. Default: "en".
    pub wiki_language: String,

    /// Wikipedia pages loaded per search. Default: 2.
    pub wiki_max_docs: usize,

    /// Spotify client id. Falls back to `SPOTIFY_CLIENT_ID`.
    pub spotify_client_id: Option<String>,

    /// Spotify client secret. Falls back to `SPOTIFY_CLIENT_SECRET`.
    pub spotify_client_secret: Option<String>,

    /// ffmpeg executable. Default: "ffmpeg".
    pub ffmpeg_path: String,

    /// ffprobe executable. Default: "ffprobe".
    pub ffprobe_path: String,

    /// yt-dlp executable. Default: "yt-dlp".
    pub ytdlp_path: String,

    /// Optional status/progress sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            language: "English".to_string(),
            chunk_tokens: EXAM_CHUNK_TOKENS,
            generation_concurrency: None,
            shuffle_choices: true,
            transcription_workers: 2,
            segment_secs: 1200,
            transcript_attempts: 3,
            transcript_retry_delay_ms: 1000,
            provider_name: None,
            model: None,
            escalation_model: None,
            models: None,
            temperature: 0.0,
            max_tokens: 8192,
            api_timeout_secs: 120,
            media_timeout_secs: 600,
            download_timeout_secs: 120,
            report_batch_size: 20,
            wiki_language: "en".to_string(),
            wiki_max_docs: 2,
            spotify_client_id: None,
            spotify_client_secret: None,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            ytdlp_path: "yt-dlp".to_string(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for QuizConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizConfig")
            .field("language", &self.language)
            .field("chunk_tokens", &self.chunk_tokens)
            .field("generation_concurrency", &self.generation_concurrency)
            .field("shuffle_choices", &self.shuffle_choices)
            .field("transcription_workers", &self.transcription_workers)
            .field("segment_secs", &self.segment_secs)
            .field("transcript_attempts", &self.transcript_attempts)
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("escalation_model", &self.escalation_model)
            .field("models", &self.models.as_ref().map(|_| "<ModelPair>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("media_timeout_secs", &self.media_timeout_secs)
            .field("report_batch_size", &self.report_batch_size)
            .field("wiki_language", &self.wiki_language)
            .field(
                "spotify_client_secret",
                &self.spotify_client_secret.as_ref().map(|_| "<redacted>"),
            )
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn QuizProgressCallback>"),
            )
            .finish()
    }
}

impl QuizConfig {
    /// Create a new builder for `QuizConfig`.
    pub fn builder() -> QuizConfigBuilder {
        QuizConfigBuilder {
            config: Self::default(),
        }
    }

    /// Spotify credentials from config, then environment.
    pub fn spotify_credentials(&self) -> Option<(String, String)> {
        let id = self
            .spotify_client_id
            .clone()
            .or_else(|| std::env::var("SPOTIFY_CLIENT_ID").ok())
            .filter(|s| !s.is_empty())?;
        let secret = self
            .spotify_client_secret
            .clone()
            .or_else(|| std::env::var("SPOTIFY_CLIENT_SECRET").ok())
            .filter(|s| !s.is_empty())?;
        Some((id, secret))
    }
}

/// Builder for [`QuizConfig`].
#[derive(Debug)]
pub struct QuizConfigBuilder {
    config: QuizConfig,
}

impl QuizConfigBuilder {
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.config.language = language.into();
        self
    }

    pub fn chunk_tokens(mut self, n: usize) -> Self {
        self.config.chunk_tokens = n;
        self
    }

    pub fn generation_concurrency(mut self, n: usize) -> Self {
        self.config.generation_concurrency = Some(n.max(1));
        self
    }

    pub fn shuffle_choices(mut self, v: bool) -> Self {
        self.config.shuffle_choices = v;
        self
    }

    pub fn transcription_workers(mut self, n: usize) -> Self {
        self.config.transcription_workers = n.max(1);
        self
    }

    pub fn segment_secs(mut self, secs: u64) -> Self {
        self.config.segment_secs = secs;
        self
    }

    pub fn transcript_attempts(mut self, n: u32) -> Self {
        self.config.transcript_attempts = n.max(1);
        self
    }

    pub fn transcript_retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.transcript_retry_delay_ms = ms;
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn escalation_model(mut self, model: impl Into<String>) -> Self {
        self.config.escalation_model = Some(model.into());
        self
    }

    pub fn models(mut self, models: ModelPair) -> Self {
        self.config.models = Some(models);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn media_timeout_secs(mut self, secs: u64) -> Self {
        self.config.media_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn report_batch_size(mut self, n: usize) -> Self {
        self.config.report_batch_size = n;
        self
    }

    pub fn wiki_language(mut self, lang: impl Into<String>) -> Self {
        self.config.wiki_language = lang.into();
        self
    }

    pub fn wiki_max_docs(mut self, n: usize) -> Self {
        self.config.wiki_max_docs = n.max(1);
        self
    }

    pub fn spotify_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.config.spotify_client_id = Some(client_id.into());
        self.config.spotify_client_secret = Some(client_secret.into());
        self
    }

    pub fn ffmpeg_path(mut self, path: impl Into<String>) -> Self {
        self.config.ffmpeg_path = path.into();
        self
    }

    pub fn ffprobe_path(mut self, path: impl Into<String>) -> Self {
        self.config.ffprobe_path = path.into();
        self
    }

    pub fn ytdlp_path(mut self, path: impl Into<String>) -> Self {
        self.config.ytdlp_path = path.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<QuizConfig, QuizError> {
        let c = &self.config;
        if c.chunk_tokens < 100 {
            return Err(QuizError::InvalidConfig(format!(
                "chunk_tokens must be ≥ 100, got {}",
                c.chunk_tokens
            )));
        }
        if c.segment_secs == 0 {
            return Err(QuizError::InvalidConfig(
                "segment_secs must be ≥ 1".into(),
            ));
        }
        if c.report_batch_size == 0 {
            return Err(QuizError::InvalidConfig(
                "report_batch_size must be ≥ 1".into(),
            ));
        }
        if c.language.trim().is_empty() {
            return Err(QuizError::InvalidConfig("language must not be empty".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = QuizConfig::default();
        assert_eq!(c.chunk_tokens, 5000);
        assert_eq!(c.transcription_workers, 2);
        assert_eq!(c.segment_secs, 1200);
        assert_eq!(c.transcript_attempts, 3);
        assert_eq!(c.report_batch_size, 20);
        assert!(c.generation_concurrency.is_none());
        assert!(c.shuffle_choices);
    }

    #[test]
    fn builder_clamps_and_validates() {
        let c = QuizConfig::builder()
            .temperature(5.0)
            .transcription_workers(0)
            .generation_concurrency(0)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.transcription_workers, 1);
        assert_eq!(c.generation_concurrency, Some(1));
    }

    #[test]
    fn builder_rejects_tiny_chunks() {
        let err = QuizConfig::builder().chunk_tokens(10).build().unwrap_err();
        assert!(err.to_string().contains("chunk_tokens"));
    }

    #[test]
    fn builder_rejects_empty_language() {
        assert!(QuizConfig::builder().language("  ").build().is_err());
    }

    #[test]
    fn debug_redacts_secret() {
        let c = QuizConfig::builder()
            .spotify_credentials("id", "super-secret")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn explicit_spotify_credentials_win() {
        let c = QuizConfig::builder()
            .spotify_credentials("abc", "def")
            .build()
            .unwrap();
        assert_eq!(
            c.spotify_credentials(),
            Some(("abc".to_string(), "def".to_string()))
        );
    }
}
