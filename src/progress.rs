//! Status and progress callbacks for extraction, transcription and generation.
//!
//! Inject an [`Arc<dyn QuizProgressCallback>`] via
//! [`crate::config::QuizConfigBuilder::progress_callback`] to receive
//! real-time events while the pipeline runs.
//!
//! Two kinds of events flow through the same sink:
//!
//! * **status**: `(level, message)` notices such as "Transcript extracted" or
//!   "That is not a YouTube link". Failures that the pipeline degrades around
//!   are reported here at [`StatusLevel::Error`].
//! * **progress**: `(completed, total, label)` counters. Within one stage the
//!   `completed` value never decreases, even though chunks and segments finish
//!   out of order.
//!
//! # Example
//!
//! ```rust
//! use edgequake_quiz::{QuizConfig, QuizProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl QuizProgressCallback for CountingCallback {
//!     fn on_progress(&self, completed: usize, total: usize, label: String) {
//!         self.completed.store(completed, Ordering::SeqCst);
//!         eprintln!("{label}: {completed}/{total}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = QuizConfig::builder()
//!     .progress_callback(counter as Arc<dyn QuizProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Severity of a status notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLevel::Info => f.write_str("info"),
            StatusLevel::Warning => f.write_str("warning"),
            StatusLevel::Error => f.write_str("error"),
        }
    }
}

/// Called by the pipeline as sources are extracted and chunks are processed.
///
/// Implementations must be `Send + Sync`: chunk and segment workers call
/// these methods concurrently. All methods default to no-ops.
///
/// Messages are passed as owned `String`s so implementations can move them
/// into spawned tasks without borrowing from the pipeline.
pub trait QuizProgressCallback: Send + Sync {
    /// A status notice from an extractor, the transcription engine or the
    /// dispatcher.
    fn on_status(&self, level: StatusLevel, message: String) {
        let _ = (level, message);
    }

    /// A counter update for the stage named by `label`.
    fn on_progress(&self, completed: usize, total: usize, label: String) {
        let _ = (completed, total, label);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl QuizProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::QuizConfig`].
pub type ProgressCallback = Arc<dyn QuizProgressCallback>;

/// Fraction of work done, clamped to `0.0..=1.0`. An empty stage is complete.
pub fn fraction(completed: usize, total: usize) -> f32 {
    if total == 0 {
        1.0
    } else {
        (completed as f32 / total as f32).clamp(0.0, 1.0)
    }
}

/// Thin helper the pipeline stages hold instead of `Option<ProgressCallback>`.
///
/// Every notice is mirrored to `tracing` so headless runs keep a log even
/// without a callback.
#[derive(Clone)]
pub(crate) struct StatusReporter {
    callback: Option<ProgressCallback>,
}

impl StatusReporter {
    pub(crate) fn new(callback: Option<ProgressCallback>) -> Self {
        Self { callback }
    }

    pub(crate) fn info(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{}", message);
        self.emit(StatusLevel::Info, message);
    }

    pub(crate) fn warning(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.emit(StatusLevel::Warning, message);
    }

    pub(crate) fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", message);
        self.emit(StatusLevel::Error, message);
    }

    pub(crate) fn progress(&self, completed: usize, total: usize, label: impl Into<String>) {
        if let Some(ref cb) = self.callback {
            cb.on_progress(completed, total, label.into());
        }
    }

    fn emit(&self, level: StatusLevel, message: String) {
        if let Some(ref cb) = self.callback {
            cb.on_status(level, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct TrackingCallback {
        errors: AtomicUsize,
        last_progress: Mutex<Option<(usize, usize, String)>>,
    }

    impl QuizProgressCallback for TrackingCallback {
        fn on_status(&self, level: StatusLevel, _message: String) {
            if level == StatusLevel::Error {
                self.errors.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_progress(&self, completed: usize, total: usize, label: String) {
            *self.last_progress.lock().unwrap() = Some((completed, total, label));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_status(StatusLevel::Info, "hello".into());
        cb.on_progress(1, 2, "chunks".into());
    }

    #[test]
    fn reporter_forwards_to_callback() {
        let tracker = Arc::new(TrackingCallback {
            errors: AtomicUsize::new(0),
            last_progress: Mutex::new(None),
        });
        let reporter = StatusReporter::new(Some(tracker.clone() as ProgressCallback));

        reporter.info("starting");
        reporter.error("boom");
        reporter.error("boom again");
        reporter.progress(3, 4, "Generating questions");

        assert_eq!(tracker.errors.load(Ordering::SeqCst), 2);
        assert_eq!(
            tracker.last_progress.lock().unwrap().clone(),
            Some((3, 4, "Generating questions".to_string()))
        );
    }

    #[test]
    fn reporter_without_callback_is_silent() {
        let reporter = StatusReporter::new(None);
        reporter.warning("nobody listens");
        reporter.progress(1, 1, "done");
    }

    #[test]
    fn fraction_bounds() {
        assert_eq!(fraction(0, 0), 1.0);
        assert_eq!(fraction(1, 4), 0.25);
        assert_eq!(fraction(9, 4), 1.0);
    }
}
