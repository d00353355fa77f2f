//! Error types for the edgequake-quiz library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`QuizError`]: **Fatal**: the run cannot produce anything useful
//!   (provider not configured, invalid config, no source produced content).
//!   Returned as `Err(QuizError)` from the top-level entry points.
//!
//! * [`ExtractionError`]: **Per source**: one document, URL or video could
//!   not be turned into text. The registry reports it to the status sink and
//!   degrades to an empty extraction; other sources continue.
//!
//! * [`ModelError`]: **Per call**: one LLM call failed. The escalation policy
//!   decides whether to retry on the larger model, and callers degrade to an
//!   empty result when both tiers fail.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-quiz library.
#[derive(Debug, Error)]
pub enum QuizError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The chunking tokenizer could not be loaded.
    #[error("Failed to load tokenizer '{name}': {detail}")]
    Tokenizer { name: String, detail: String },

    // ── Pipeline outcomes ─────────────────────────────────────────────────
    /// Every source failed or every chunk came back empty.
    #[error("No content produced: {sources} source(s) attempted, {succeeded} extracted, 0 questions kept")]
    NoContentProduced { sources: usize, succeeded: usize },

    /// A report stage failed; the report is missing.
    #[error("Report stage '{stage}' failed: {detail}")]
    ReportFailed { stage: &'static str, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single source.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ExtractionError {
    /// Local file is missing or unreadable.
    #[error("Source not found: '{reference}'")]
    NotFound { reference: String },

    /// No strategy is registered for the source kind.
    #[error("Unsupported source type '{kind}'")]
    Unsupported { kind: String },

    /// A gate (oracle or deterministic check) refused the source.
    #[error("{reason}")]
    Rejected { reason: String },

    /// The document could be read but not parsed.
    #[error("Failed to parse '{reference}': {detail}")]
    Parse { reference: String, detail: String },

    /// Remote service call failed.
    #[error("Network error for '{reference}': {detail}")]
    Network { reference: String, detail: String },

    /// ffmpeg / ffprobe / yt-dlp failed.
    #[error("Media tool '{tool}' failed: {detail}")]
    Media { tool: String, detail: String },

    /// Vision or transcription model failed on both tiers.
    #[error("Model extraction failed: {detail}")]
    Model { detail: String },

    /// Client credentials for a third-party catalogue are absent.
    #[error("Missing credentials: set {vars}")]
    MissingCredentials { vars: String },
}

impl ExtractionError {
    pub(crate) fn parse(reference: impl Into<String>, detail: impl ToString) -> Self {
        Self::Parse {
            reference: reference.into(),
            detail: detail.to_string(),
        }
    }

    pub(crate) fn network(reference: impl Into<String>, detail: impl ToString) -> Self {
        Self::Network {
            reference: reference.into(),
            detail: detail.to_string(),
        }
    }

    pub(crate) fn media(tool: impl Into<String>, detail: impl ToString) -> Self {
        Self::Media {
            tool: tool.into(),
            detail: detail.to_string(),
        }
    }

    pub(crate) fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

/// A failure of one model call.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ModelError {
    /// Recoverable server condition (5xx, overloaded, rate limited).
    #[error("Transient service failure: {0}")]
    Transient(String),

    /// The call exceeded its timeout.
    #[error("Model call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The output did not conform to the requested structure.
    #[error("Schema validation failed: {0}")]
    Schema(String),

    /// Any other provider failure (auth, bad request).
    #[error("Model service error: {0}")]
    Service(String),
}

impl ModelError {
    /// Whether a server-side retry on another model has a chance to succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ModelError::Transient(_) | ModelError::Timeout { .. })
    }

    /// Classify a provider error message.
    ///
    /// edgequake-llm surfaces HTTP failures as display strings, so status codes
    /// and well-known phrases are matched textually.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        let transient = [
            "500",
            "502",
            "503",
            "504",
            "429",
            "internal",
            "overloaded",
            "unavailable",
            "rate limit",
            "timed out",
            "timeout",
            "connection",
        ];
        if transient.iter().any(|needle| lower.contains(needle)) {
            ModelError::Transient(message)
        } else {
            ModelError::Service(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_content_display() {
        let e = QuizError::NoContentProduced {
            sources: 3,
            succeeded: 1,
        };
        let msg = e.to_string();
        assert!(msg.contains("3 source(s)"), "got: {msg}");
        assert!(msg.contains("1 extracted"), "got: {msg}");
    }

    #[test]
    fn rejected_shows_reason_verbatim() {
        let e = ExtractionError::rejected("That is not something searchable on Wikipedia.");
        assert_eq!(
            e.to_string(),
            "That is not something searchable on Wikipedia."
        );
    }

    #[test]
    fn classify_server_errors_as_transient() {
        assert!(ModelError::classify("HTTP 503 Service Unavailable").is_transient());
        assert!(ModelError::classify("500 Internal Server Error").is_transient());
        assert!(ModelError::classify("model is overloaded").is_transient());
    }

    #[test]
    fn classify_auth_errors_as_permanent() {
        let e = ModelError::classify("401 invalid api key");
        assert!(!e.is_transient());
        assert!(matches!(e, ModelError::Service(_)));
    }

    #[test]
    fn timeout_is_transient_schema_is_not() {
        assert!(ModelError::Timeout { secs: 5 }.is_transient());
        assert!(!ModelError::Schema("missing field".into()).is_transient());
    }
}
