//! YouTube strategy: captions first, audio transcription as the fallback.
//!
//! Caption fetching is retried a fixed number of times. Only after every
//! attempt came back empty or failed is the audio track downloaded, and it is
//! routed through the transcription engine exactly once.

use super::ExtractorRegistry;
use crate::error::ExtractionError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

static RE_VIDEO_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:https?://)?(?:www\.|m\.)?(?:youtube\.com/(?:(?:embed|shorts|live|v|e)/|watch\?(?:[^#\s]*&)?v=)|youtu\.be/)([a-zA-Z0-9_-]{11})(?:[^a-zA-Z0-9_-]|$)",
    )
    .unwrap()
});

/// The 11-character video id of a watch, short, embed or `youtu.be` URL.
pub fn extract_video_id(url: &str) -> Option<String> {
    RE_VIDEO_ID
        .captures(url.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

// ── Collaborators ────────────────────────────────────────────────────────

/// Caption track listing and download.
#[async_trait]
pub trait TranscriptApi: Send + Sync {
    /// Available caption language codes, preferred first.
    async fn languages(&self, video_id: &str) -> Result<Vec<String>, ExtractionError>;

    /// Caption lines for one language.
    async fn fetch(&self, video_id: &str, language: &str) -> Result<Vec<String>, ExtractionError>;
}

/// Downloads a video's audio track as mp3 into a directory.
#[async_trait]
pub trait AudioDownloader: Send + Sync {
    async fn download_audio(&self, video_id: &str, dest_dir: &Path)
        -> Result<PathBuf, ExtractionError>;
}

/// Top search result on the video platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoHit {
    pub id: String,
    pub title: String,
}

/// Video platform search.
#[async_trait]
pub trait VideoSearch: Send + Sync {
    async fn search_first(&self, query: &str) -> Result<Option<VideoHit>, ExtractionError>;
}

/// One caption track advertised by a watch page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CaptionTrack {
    #[serde(rename = "languageCode")]
    pub language: String,
    #[serde(rename = "baseUrl")]
    pub base_url: String,
}

/// [`TranscriptApi`] reading caption tracks from the watch page's player
/// response.
#[derive(Clone)]
pub struct WatchPageCaptions {
    http: reqwest::Client,
}

impl WatchPageCaptions {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn get_text(&self, url: &str) -> Result<String, ExtractionError> {
        self.http
            .get(url)
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ExtractionError::network(url, e))?
            .text()
            .await
            .map_err(|e| ExtractionError::network(url, e))
    }

    async fn tracks(&self, video_id: &str) -> Result<Vec<CaptionTrack>, ExtractionError> {
        let page = self.get_text(&watch_url(video_id)).await?;
        Ok(parse_caption_tracks(&page))
    }
}

const PLAYER_RESPONSE_MARKER: &str = "ytInitialPlayerResponse";

/// Caption tracks listed in a watch page's `ytInitialPlayerResponse`.
///
/// The assignment is followed by a JSON object and then more script, so only
/// the first JSON value after the `=` is parsed.
pub(crate) fn parse_caption_tracks(html: &str) -> Vec<CaptionTrack> {
    let Some(json) = html
        .match_indices(PLAYER_RESPONSE_MARKER)
        .find_map(|(at, _)| {
            let rest = html[at + PLAYER_RESPONSE_MARKER.len()..].trim_start();
            rest.strip_prefix('=').map(str::trim_start)
        })
    else {
        return Vec::new();
    };
    let player: serde_json::Value = match serde_json::Deserializer::from_str(json)
        .into_iter::<serde_json::Value>()
        .next()
    {
        Some(Ok(value)) => value,
        _ => return Vec::new(),
    };
    player
        .pointer("/captions/playerCaptionsTracklistRenderer/captionTracks")
        .cloned()
        .and_then(|tracks| serde_json::from_value(tracks).ok())
        .unwrap_or_default()
}

/// Text of every `<text>` cue.
pub(crate) fn parse_captions(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    let mut lines = Vec::new();
    let mut in_cue = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"text" => in_cue = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"text" => in_cue = false,
            Ok(Event::Text(e)) if in_cue => {
                if let Ok(text) = e.unescape() {
                    let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
                    if !line.is_empty() {
                        lines.push(line);
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }
    lines
}

#[async_trait]
impl TranscriptApi for WatchPageCaptions {
    async fn languages(&self, video_id: &str) -> Result<Vec<String>, ExtractionError> {
        Ok(self
            .tracks(video_id)
            .await?
            .into_iter()
            .map(|t| t.language)
            .collect())
    }

    async fn fetch(&self, video_id: &str, language: &str) -> Result<Vec<String>, ExtractionError> {
        let track = self
            .tracks(video_id)
            .await?
            .into_iter()
            .find(|t| t.language == language)
            .ok_or_else(|| ExtractionError::Parse {
                reference: watch_url(video_id),
                detail: format!("no '{language}' caption track"),
            })?;
        let xml = self.get_text(&track.base_url).await?;
        Ok(parse_captions(&xml))
    }
}

/// `yt-dlp` subprocess for audio download and search.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: String,
}

impl YtDlp {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, ExtractionError> {
        debug!("Running {} {}", self.program, args.join(" "));
        let output = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExtractionError::media(&self.program, format!("failed to start: {e}")))?;
        if !output.status.success() {
            return Err(ExtractionError::media(
                &self.program,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl AudioDownloader for YtDlp {
    async fn download_audio(
        &self,
        video_id: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, ExtractionError> {
        let template = dest_dir.join("audio.%(ext)s");
        let template = template.to_string_lossy();
        let url = watch_url(video_id);
        self.run(&[
            "--quiet",
            "--no-playlist",
            "-f",
            "bestaudio/best",
            "-x",
            "--audio-format",
            "mp3",
            "--audio-quality",
            "128K",
            "-o",
            &template,
            &url,
        ])
        .await?;
        let path = dest_dir.join("audio.mp3");
        if !path.exists() {
            return Err(ExtractionError::media(&self.program, "no audio file produced"));
        }
        Ok(path)
    }
}

#[async_trait]
impl VideoSearch for YtDlp {
    async fn search_first(&self, query: &str) -> Result<Option<VideoHit>, ExtractionError> {
        let target = format!("ytsearch1:{query}");
        let stdout = self
            .run(&[
                "--skip-download",
                "--no-warnings",
                "--print",
                "%(id)s\t%(title)s",
                &target,
            ])
            .await?;
        Ok(stdout.lines().find_map(|line| {
            let (id, title) = line.split_once('\t')?;
            Some(VideoHit {
                id: id.trim().to_string(),
                title: title.trim().to_string(),
            })
        }))
    }
}

// ── Strategy ─────────────────────────────────────────────────────────────

impl ExtractorRegistry {
    pub(super) async fn youtube(&self, reference: &str) -> Result<String, ExtractionError> {
        let video_id = extract_video_id(reference)
            .ok_or_else(|| ExtractionError::rejected("That is not a YouTube link."))?;
        self.youtube_video(&video_id).await
    }

    /// Captions with retries, then the audio fallback.
    pub(super) async fn youtube_video(&self, video_id: &str) -> Result<String, ExtractionError> {
        self.status
            .info("Extracting transcript from YouTube video");

        for attempt in 1..=self.transcript_attempts {
            self.status.info(format!(
                "Extracting transcript from YouTube video, attempt {attempt}"
            ));
            match self.captions(video_id).await {
                Ok(text) if !text.trim().is_empty() => {
                    self.status.info("Transcript extracted successfully");
                    return Ok(text);
                }
                Ok(_) => debug!("Attempt {attempt}: empty transcript"),
                Err(e) => debug!("Attempt {attempt}: {e}"),
            }
            self.status
                .warning(format!("Transcript attempt {attempt} failed"));
            if attempt < self.transcript_attempts && !self.transcript_retry_delay.is_zero() {
                tokio::time::sleep(self.transcript_retry_delay).await;
            }
        }

        self.status
            .info("Transcript extraction failed, trying the audio track");
        let scratch = tempfile::Builder::new()
            .prefix("quiz-youtube-")
            .tempdir()
            .map_err(|e| ExtractionError::media("tempdir", e))?;
        let audio = self
            .collab
            .downloader
            .download_audio(video_id, scratch.path())
            .await?;
        self.status.info("Audio downloaded");
        self.transcriber.transcribe(&audio).await
    }

    async fn captions(&self, video_id: &str) -> Result<String, ExtractionError> {
        let languages = self.collab.transcripts.languages(video_id).await?;
        let language = languages.first().ok_or_else(|| ExtractionError::Parse {
            reference: watch_url(video_id),
            detail: "no caption tracks".into(),
        })?;
        let lines = self.collab.transcripts.fetch(video_id, language).await?;
        Ok(lines.join(" "))
    }
}
