//! Spotify strategy: episode title → matching video → YouTube extraction.
//!
//! Spotify does not expose episode audio, so the episode is matched to a video
//! by title and the oracle confirms the two denote the same content before
//! anything is transcribed.

use super::ExtractorRegistry;
use crate::error::ExtractionError;
use crate::prompts::same_content_question;
use async_trait::async_trait;
use serde::Deserialize;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";

/// Episode id from an episode URL: the last path segment, without query or
/// fragment.
pub fn episode_id(url: &str) -> Option<String> {
    let path = url.trim().split(['?', '#']).next()?;
    let id = path.trim_end_matches('/').rsplit('/').next()?;
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(id.to_string())
}

/// Podcast episode metadata.
#[async_trait]
pub trait PodcastCatalog: Send + Sync {
    /// Episode title, or `None` if the id is unknown.
    async fn episode_title(&self, episode_id: &str) -> Result<Option<String>, ExtractionError>;
}

/// [`PodcastCatalog`] over the Spotify Web API with client credentials.
#[derive(Clone)]
pub struct SpotifyCatalog {
    http: reqwest::Client,
    credentials: Option<(String, String)>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct Episode {
    name: Option<String>,
}

impl SpotifyCatalog {
    pub fn new(http: reqwest::Client, credentials: Option<(String, String)>) -> Self {
        Self { http, credentials }
    }

    async fn access_token(&self) -> Result<String, ExtractionError> {
        let (id, secret) = self
            .credentials
            .as_ref()
            .ok_or_else(|| ExtractionError::MissingCredentials {
                vars: "SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET".into(),
            })?;
        let token: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .basic_auth(id, Some(secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ExtractionError::network(TOKEN_URL, e))?
            .json()
            .await
            .map_err(|e| ExtractionError::network(TOKEN_URL, e))?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl PodcastCatalog for SpotifyCatalog {
    async fn episode_title(&self, episode_id: &str) -> Result<Option<String>, ExtractionError> {
        let token = self.access_token().await?;
        let url = format!("{API_BASE}/episodes/{episode_id}");
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ExtractionError::network(&url, e))?;
        if !response.status().is_success() {
            tracing::warn!("Spotify episode lookup returned {}", response.status());
            return Ok(None);
        }
        let episode: Episode = response
            .json()
            .await
            .map_err(|e| ExtractionError::network(&url, e))?;
        Ok(episode.name.filter(|n| !n.trim().is_empty()))
    }
}

impl ExtractorRegistry {
    pub(super) async fn spotify(&self, reference: &str) -> Result<String, ExtractionError> {
        self.status.info("Extracting data from Spotify");
        let invalid = || {
            ExtractionError::rejected(
                "Failed to extract podcast title, be sure it has a valid Spotify 'episode' URL.",
            )
        };
        let id = episode_id(reference).ok_or_else(invalid)?;
        let title = self
            .collab
            .podcasts
            .episode_title(&id)
            .await?
            .ok_or_else(invalid)?;
        self.status.info(format!("Podcast title: {title}"));

        let hit = self
            .collab
            .video_search
            .search_first(&title)
            .await?
            .ok_or_else(|| ExtractionError::rejected("No matching video found for the podcast."))?;

        if !self
            .oracle
            .ask(&same_content_question(&title, &hit.title))
            .await
        {
            return Err(ExtractionError::rejected(
                "Failed to find a suitable audio-text for the podcast.",
            ));
        }
        self.youtube_video(&hit.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::{ExtractorRegistry, Source, SourceKind, VideoHit};
    use super::*;
    use crate::llm::testing::{pair, ScriptedModel};
    use std::sync::atomic::Ordering;
    use std::sync::{Arc, Mutex};

    const EPISODE: &str = "https://open.spotify.com/episode/4rOoJ6Egrf8K2IrywzwOMk?si=abc123";

    #[test]
    fn episode_id_strips_query() {
        assert_eq!(episode_id(EPISODE).as_deref(), Some("4rOoJ6Egrf8K2IrywzwOMk"));
        assert_eq!(
            episode_id("https://open.spotify.com/episode/abc/").as_deref(),
            Some("abc")
        );
        assert_eq!(episode_id("???"), None);
    }

    fn registry(oracle_reply: &str, title: Option<&str>, hit: Option<VideoHit>) -> (ExtractorRegistry, Arc<StubTranscripts>) {
        let transcripts = Arc::new(StubTranscripts {
            results: Mutex::new(vec![Ok(vec!["matched".into(), "video".into()])]),
            ..Default::default()
        });
        let mut collab = collaborators();
        collab.podcasts = Arc::new(StubPodcasts {
            title: title.map(String::from),
        });
        collab.video_search = Arc::new(StubSearch { hit });
        collab.transcripts = transcripts.clone();
        let m = ScriptedModel::replying("m", oracle_reply);
        (ExtractorRegistry::new(pair(&m, &m), collab, &fast_config()), transcripts)
    }

    fn hit() -> Option<VideoHit> {
        Some(VideoHit {
            id: "dQw4w9WgXcQ".into(),
            title: "Episode 12: Rust in practice".into(),
        })
    }

    #[tokio::test]
    async fn matched_episode_uses_video_transcript() {
        let (reg, _) = registry(r#"{"answer": true}"#, Some("Rust in practice"), hit());
        let out = reg.extract(&Source::new(SourceKind::Spotify, EPISODE)).await;
        assert!(out.succeeded);
        assert_eq!(out.text, "matched video");
    }

    #[tokio::test]
    async fn oracle_mismatch_is_rejected() {
        let (reg, transcripts) = registry(r#"{"answer": false}"#, Some("Rust in practice"), hit());
        let out = reg.extract(&Source::new(SourceKind::Spotify, EPISODE)).await;
        assert!(!out.succeeded);
        assert!(matches!(out.error, Some(ExtractionError::Rejected { .. })));
        assert_eq!(transcripts.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_title_and_missing_match_are_rejections() {
        let (reg, _) = registry(r#"{"answer": true}"#, None, hit());
        let out = reg.extract(&Source::new(SourceKind::Spotify, EPISODE)).await;
        assert!(matches!(out.error, Some(ExtractionError::Rejected { .. })));

        let (reg, _) = registry(r#"{"answer": true}"#, Some("Rust in practice"), None);
        let out = reg.extract(&Source::new(SourceKind::Spotify, EPISODE)).await;
        assert!(matches!(out.error, Some(ExtractionError::Rejected { .. })));
    }

    #[tokio::test]
    async fn catalog_without_credentials_fails_cleanly() {
        let catalog = SpotifyCatalog::new(reqwest::Client::new(), None);
        let err = catalog.episode_title("abc").await.unwrap_err();
        assert!(matches!(err, ExtractionError::MissingCredentials { .. }));
    }
}
