//! Extractor registry: turn a [`Source`] into raw text.
//!
//! Each source kind has one strategy. Strategies return
//! `Result<String, ExtractionError>`; [`ExtractorRegistry::extract`] reports
//! every failure to the status sink and degrades to an empty
//! [`Extraction`] with `succeeded = false`, so one bad source never stops a
//! multi-source run.
//!
//! ## Strategies
//!
//! | Kind | Strategy |
//! |------|----------|
//! | pdf, docx, pptx, epub, enex, txt, url | [`DocumentParser`] passages joined with a space |
//! | text | the reference itself is the text |
//! | wiki | oracle gate, then [`EncyclopediaClient`] |
//! | youtube | captions with retries, then audio download + transcription |
//! | spotify | episode title → video search → oracle match → youtube |
//! | image | vision model, escalating only on server-side failure |
//! | audio | transcription engine |
//! | video | demux audio to a temp file, then transcription |
//!
//! External services sit behind traits collected in [`Collaborators`], so the
//! registry runs against stubs in tests.

pub mod documents;
pub mod image;
pub mod spotify;
pub mod video;
pub mod wiki;
pub mod youtube;

pub use documents::{html_to_text, DocumentParser, StandardDocumentParser};
pub use spotify::{episode_id, PodcastCatalog, SpotifyCatalog};
pub use wiki::{EncyclopediaClient, MediaWikiClient};
pub use youtube::{
    extract_video_id, AudioDownloader, CaptionTrack, TranscriptApi, VideoHit, VideoSearch, WatchPageCaptions, YtDlp,
};

use crate::config::QuizConfig;
use crate::error::{ExtractionError, QuizError};
use crate::llm::{BooleanOracle, EscalateOn, Escalation, ModelPair};
use crate::progress::StatusReporter;
use crate::transcribe::{FfmpegTool, MediaTool, Transcriber};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

// ── Sources ──────────────────────────────────────────────────────────────

/// Kind of input a [`Source`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Pdf,
    Docx,
    Pptx,
    Epub,
    Enex,
    /// Plain-text file on disk.
    Txt,
    /// Inline text: the reference is the content.
    Text,
    Url,
    Wiki,
    Youtube,
    Spotify,
    Image,
    Audio,
    Video,
}

impl SourceKind {
    pub const ALL: [SourceKind; 14] = [
        SourceKind::Pdf,
        SourceKind::Docx,
        SourceKind::Pptx,
        SourceKind::Epub,
        SourceKind::Enex,
        SourceKind::Txt,
        SourceKind::Text,
        SourceKind::Url,
        SourceKind::Wiki,
        SourceKind::Youtube,
        SourceKind::Spotify,
        SourceKind::Image,
        SourceKind::Audio,
        SourceKind::Video,
    ];

    /// Resolve a type tag. Media tags map onto their family
    /// (`mp3`/`wav` → audio, `mp4` → video, `png`/`jpg`/`jpeg` → image).
    pub fn from_tag(tag: &str) -> Option<Self> {
        let kind = match tag.trim().to_ascii_lowercase().as_str() {
            "pdf" => SourceKind::Pdf,
            "docx" => SourceKind::Docx,
            "pptx" => SourceKind::Pptx,
            "epub" => SourceKind::Epub,
            "enex" => SourceKind::Enex,
            "txt" => SourceKind::Txt,
            "text" => SourceKind::Text,
            "url" => SourceKind::Url,
            "wiki" => SourceKind::Wiki,
            "youtube" => SourceKind::Youtube,
            "spotify" => SourceKind::Spotify,
            "image" | "png" | "jpg" | "jpeg" => SourceKind::Image,
            "audio" | "mp3" | "wav" => SourceKind::Audio,
            "video" | "mp4" | "mpeg4" => SourceKind::Video,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Pdf => "pdf",
            SourceKind::Docx => "docx",
            SourceKind::Pptx => "pptx",
            SourceKind::Epub => "epub",
            SourceKind::Enex => "enex",
            SourceKind::Txt => "txt",
            SourceKind::Text => "text",
            SourceKind::Url => "url",
            SourceKind::Wiki => "wiki",
            SourceKind::Youtube => "youtube",
            SourceKind::Spotify => "spotify",
            SourceKind::Image => "image",
            SourceKind::Audio => "audio",
            SourceKind::Video => "video",
        }
    }

    /// Kinds handled by a [`DocumentParser`].
    pub fn is_document(&self) -> bool {
        matches!(
            self,
            SourceKind::Pdf
                | SourceKind::Docx
                | SourceKind::Pptx
                | SourceKind::Epub
                | SourceKind::Enex
                | SourceKind::Txt
                | SourceKind::Url
        )
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = ExtractionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceKind::from_tag(s).ok_or_else(|| ExtractionError::Unsupported {
            kind: s.to_string(),
        })
    }
}

/// A reference plus its type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub kind: SourceKind,
    pub reference: String,
}

impl Source {
    pub fn new(kind: SourceKind, reference: impl Into<String>) -> Self {
        Self {
            kind,
            reference: reference.into(),
        }
    }

    /// Guess the kind from the reference: known hosts for URLs, the
    /// extension for paths.
    pub fn infer(reference: &str) -> Option<Self> {
        let trimmed = reference.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let kind = if extract_video_id(trimmed).is_some() {
                SourceKind::Youtube
            } else if lower.contains("open.spotify.com/episode/") {
                SourceKind::Spotify
            } else {
                SourceKind::Url
            };
            return Some(Self::new(kind, trimmed));
        }
        let ext = std::path::Path::new(trimmed).extension()?.to_str()?;
        SourceKind::from_tag(ext).map(|kind| Self::new(kind, trimmed))
    }
}

impl FromStr for Source {
    type Err = ExtractionError;

    /// Parse `kind:reference`, falling back to [`Source::infer`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((tag, reference)) = s.split_once(':') {
            if let Some(kind) = SourceKind::from_tag(tag) {
                return Ok(Self::new(kind, reference.trim()));
            }
        }
        Source::infer(s).ok_or_else(|| ExtractionError::Unsupported {
            kind: format!("cannot determine source type of '{s}'"),
        })
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.reference)
    }
}

/// Result of extracting one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    pub source: Source,
    pub text: String,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExtractionError>,
}

impl Extraction {
    fn ok(source: Source, text: String) -> Self {
        Self {
            source,
            text,
            succeeded: true,
            error: None,
        }
    }

    fn failed(source: Source, error: ExtractionError) -> Self {
        Self {
            source,
            text: String::new(),
            succeeded: false,
            error: Some(error),
        }
    }
}

// ── Collaborators ────────────────────────────────────────────────────────

/// External services the strategies call.
#[derive(Clone)]
pub struct Collaborators {
    pub documents: Arc<dyn DocumentParser>,
    pub encyclopedia: Arc<dyn EncyclopediaClient>,
    pub transcripts: Arc<dyn TranscriptApi>,
    pub downloader: Arc<dyn AudioDownloader>,
    pub video_search: Arc<dyn VideoSearch>,
    pub podcasts: Arc<dyn PodcastCatalog>,
    pub media: Arc<dyn MediaTool>,
}

impl Collaborators {
    /// Production implementations configured from `config`.
    pub fn from_config(config: &QuizConfig) -> Result<Self, QuizError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs.max(1)))
            .user_agent(concat!("edgequake-quiz/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| QuizError::Internal(format!("HTTP client: {e}")))?;
        let ytdlp = Arc::new(YtDlp::new(config.ytdlp_path.clone()));
        Ok(Self {
            documents: Arc::new(StandardDocumentParser::new(http.clone())),
            encyclopedia: Arc::new(MediaWikiClient::new(http.clone(), &config.wiki_language)),
            transcripts: Arc::new(WatchPageCaptions::new(http.clone())),
            downloader: ytdlp.clone(),
            video_search: ytdlp,
            podcasts: Arc::new(SpotifyCatalog::new(http, config.spotify_credentials())),
            media: Arc::new(FfmpegTool::new(
                config.ffmpeg_path.clone(),
                config.ffprobe_path.clone(),
            )),
        })
    }
}

// ── Registry ─────────────────────────────────────────────────────────────

/// Dispatches sources to their strategy.
#[derive(Clone)]
pub struct ExtractorRegistry {
    collab: Collaborators,
    oracle: BooleanOracle,
    vision: Escalation,
    transcriber: Transcriber,
    status: StatusReporter,
    transcript_attempts: u32,
    transcript_retry_delay: Duration,
    wiki_max_docs: usize,
}

impl ExtractorRegistry {
    pub fn new(models: ModelPair, collab: Collaborators, config: &QuizConfig) -> Self {
        let status = StatusReporter::new(config.progress_callback.clone());
        let transcriber = Transcriber::new(
            models.clone(),
            Arc::clone(&collab.media),
            config.transcription_workers,
            config.segment_secs,
            status.clone(),
        );
        Self {
            oracle: BooleanOracle::new(models.clone()),
            vision: Escalation::new(models, EscalateOn::TransientOnly),
            transcriber,
            collab,
            status,
            transcript_attempts: config.transcript_attempts.max(1),
            transcript_retry_delay: Duration::from_millis(config.transcript_retry_delay_ms),
            wiki_max_docs: config.wiki_max_docs.max(1),
        }
    }

    pub fn transcriber(&self) -> &Transcriber {
        &self.transcriber
    }

    /// Extract one source. Never fails; see [`Extraction::succeeded`].
    pub async fn extract(&self, source: &Source) -> Extraction {
        info!("Extracting {}", source);
        match self.try_extract(source).await {
            Ok(text) if text.trim().is_empty() => {
                let err = ExtractionError::Parse {
                    reference: source.reference.clone(),
                    detail: "no text found".into(),
                };
                self.status.error(format!("{}: {err}", source.kind));
                Extraction::failed(source.clone(), err)
            }
            Ok(text) => {
                self.status
                    .info(format!("{} source loaded successfully", source.kind.as_str().to_uppercase()));
                Extraction::ok(source.clone(), text)
            }
            Err(err) => {
                self.status.error(err.to_string());
                Extraction::failed(source.clone(), err)
            }
        }
    }

    /// Run the strategy for `source`, propagating its error.
    pub async fn try_extract(&self, source: &Source) -> Result<String, ExtractionError> {
        let reference = source.reference.trim();
        match source.kind {
            kind if kind.is_document() => {
                self.status
                    .info(format!("Extracting data from {}", kind.as_str().to_uppercase()));
                let passages = self.collab.documents.parse(kind, reference).await?;
                Ok(passages.join(" "))
            }
            SourceKind::Text => Ok(reference.to_string()),
            SourceKind::Wiki => self.wiki(reference).await,
            SourceKind::Youtube => self.youtube(reference).await,
            SourceKind::Spotify => self.spotify(reference).await,
            SourceKind::Image => self.image(reference).await,
            SourceKind::Audio => {
                self.status
                    .info("Extracting text from audio, this might take a while");
                self.transcriber
                    .transcribe(std::path::Path::new(reference))
                    .await
            }
            SourceKind::Video => self.video(reference).await,
            other => Err(ExtractionError::Unsupported {
                kind: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Stub collaborators for registry tests.

    use super::*;
    use crate::transcribe::testing::FakeMedia;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct StubDocuments {
        pub(crate) passages: Vec<String>,
    }

    #[async_trait]
    impl DocumentParser for StubDocuments {
        async fn parse(&self, _kind: SourceKind, _reference: &str) -> Result<Vec<String>, ExtractionError> {
            Ok(self.passages.clone())
        }
    }

    #[derive(Default)]
    pub(crate) struct StubEncyclopedia {
        pub(crate) pages: Vec<String>,
        pub(crate) searches: AtomicUsize,
    }

    #[async_trait]
    impl EncyclopediaClient for StubEncyclopedia {
        async fn search(&self, _query: &str, max_docs: usize) -> Result<Vec<String>, ExtractionError> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            Ok(self.pages.iter().take(max_docs).cloned().collect())
        }
    }

    /// Caption API that returns queued results in order, then empty.
    #[derive(Default)]
    pub(crate) struct StubTranscripts {
        pub(crate) results: Mutex<Vec<Result<Vec<String>, ExtractionError>>>,
        pub(crate) fetches: AtomicUsize,
    }

    #[async_trait]
    impl TranscriptApi for StubTranscripts {
        async fn languages(&self, _video_id: &str) -> Result<Vec<String>, ExtractionError> {
            Ok(vec!["en".into()])
        }

        async fn fetch(&self, _video_id: &str, _language: &str) -> Result<Vec<String>, ExtractionError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let mut results = self.results.lock().unwrap();
            if results.is_empty() {
                Ok(Vec::new())
            } else {
                results.remove(0)
            }
        }
    }

    #[derive(Default)]
    pub(crate) struct StubDownloader {
        pub(crate) downloads: AtomicUsize,
    }

    #[async_trait]
    impl AudioDownloader for StubDownloader {
        async fn download_audio(&self, _video_id: &str, dest_dir: &Path) -> Result<PathBuf, ExtractionError> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            let path = dest_dir.join("audio.mp3");
            std::fs::write(&path, b"downloaded").map_err(|e| ExtractionError::media("stub", e))?;
            Ok(path)
        }
    }

    #[derive(Default)]
    pub(crate) struct StubSearch {
        pub(crate) hit: Option<VideoHit>,
    }

    #[async_trait]
    impl VideoSearch for StubSearch {
        async fn search_first(&self, _query: &str) -> Result<Option<VideoHit>, ExtractionError> {
            Ok(self.hit.clone())
        }
    }

    #[derive(Default)]
    pub(crate) struct StubPodcasts {
        pub(crate) title: Option<String>,
    }

    #[async_trait]
    impl PodcastCatalog for StubPodcasts {
        async fn episode_title(&self, _episode_id: &str) -> Result<Option<String>, ExtractionError> {
            Ok(self.title.clone())
        }
    }

    pub(crate) fn collaborators() -> Collaborators {
        Collaborators {
            documents: Arc::new(StubDocuments::default()),
            encyclopedia: Arc::new(StubEncyclopedia::default()),
            transcripts: Arc::new(StubTranscripts::default()),
            downloader: Arc::new(StubDownloader::default()),
            video_search: Arc::new(StubSearch::default()),
            podcasts: Arc::new(StubPodcasts::default()),
            media: FakeMedia::new(60.0),
        }
    }

    pub(crate) fn fast_config() -> QuizConfig {
        QuizConfig::builder()
            .transcript_retry_delay_ms(0)
            .build()
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::llm::testing::{pair, ScriptedModel};

    #[test]
    fn tags_resolve_to_families() {
        assert_eq!(SourceKind::from_tag("MP3"), Some(SourceKind::Audio));
        assert_eq!(SourceKind::from_tag("jpeg"), Some(SourceKind::Image));
        assert_eq!(SourceKind::from_tag("mp4"), Some(SourceKind::Video));
        assert_eq!(SourceKind::from_tag("xlsx"), None);
        for kind in SourceKind::ALL {
            assert_eq!(SourceKind::from_tag(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn parse_tagged_and_inferred_sources() {
        let s: Source = "url:https://example.com/a".parse().unwrap();
        assert_eq!(s.kind, SourceKind::Url);
        assert_eq!(s.reference, "https://example.com/a");

        let s: Source = "https://youtu.be/dQw4w9WgXcQ".parse().unwrap();
        assert_eq!(s.kind, SourceKind::Youtube);

        let s: Source = "notes/lecture.pptx".parse().unwrap();
        assert_eq!(s.kind, SourceKind::Pptx);

        let s: Source = "text:The capital of France is Paris.".parse().unwrap();
        assert_eq!(s.kind, SourceKind::Text);

        assert!("mystery".parse::<Source>().is_err());
    }

    #[tokio::test]
    async fn document_passages_are_space_joined() {
        let mut collab = collaborators();
        collab.documents = Arc::new(StubDocuments {
            passages: vec!["page one".into(), "page two".into()],
        });
        let m = ScriptedModel::replying("m", "");
        let reg = ExtractorRegistry::new(pair(&m, &m), collab, &fast_config());

        let out = reg.extract(&Source::new(SourceKind::Pdf, "book.pdf")).await;
        assert!(out.succeeded);
        assert_eq!(out.text, "page one page two");
        assert_eq!(m.call_count(), 0);
    }

    #[tokio::test]
    async fn failures_degrade_to_empty_extraction() {
        let m = ScriptedModel::replying("m", "");
        let reg = ExtractorRegistry::new(pair(&m, &m), collaborators(), &fast_config());

        let out = reg.extract(&Source::new(SourceKind::Youtube, "not a link")).await;
        assert!(!out.succeeded);
        assert!(out.text.is_empty());
        assert!(out.error.is_some());
    }

    #[tokio::test]
    async fn blank_text_is_not_a_success() {
        let m = ScriptedModel::replying("m", "");
        let reg = ExtractorRegistry::new(pair(&m, &m), collaborators(), &fast_config());
        let out = reg.extract(&Source::new(SourceKind::Text, "   ")).await;
        assert!(!out.succeeded);
    }
}
