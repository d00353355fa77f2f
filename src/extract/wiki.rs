//! Wikipedia strategy: oracle gate, then MediaWiki search + plaintext extracts.

use super::ExtractorRegistry;
use crate::error::ExtractionError;
use crate::prompts::wiki_gate_question;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

/// Searches an encyclopedia and returns page texts, best match first.
#[async_trait]
pub trait EncyclopediaClient: Send + Sync {
    async fn search(&self, query: &str, max_docs: usize) -> Result<Vec<String>, ExtractionError>;
}

/// [`EncyclopediaClient`] over the MediaWiki action API.
#[derive(Clone)]
pub struct MediaWikiClient {
    http: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    query: Option<SearchQuery>,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Deserialize)]
struct ExtractResponse {
    query: Option<ExtractQuery>,
}

#[derive(Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: HashMap<String, ExtractPage>,
}

#[derive(Deserialize)]
struct ExtractPage {
    title: String,
    #[serde(default)]
    extract: String,
}

impl MediaWikiClient {
    pub fn new(http: reqwest::Client, language: &str) -> Self {
        Self {
            http,
            endpoint: format!("https://{language}.wikipedia.org/w/api.php"),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        params: &[(&str, &str)],
    ) -> Result<T, ExtractionError> {
        self.http
            .get(&self.endpoint)
            .query(params)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ExtractionError::network(&self.endpoint, e))?
            .json::<T>()
            .await
            .map_err(|e| ExtractionError::network(&self.endpoint, e))
    }

    async fn page_text(&self, title: &str) -> Result<Option<String>, ExtractionError> {
        let response: ExtractResponse = self
            .get_json(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title),
                ("format", "json"),
            ])
            .await?;
        Ok(response
            .query
            .and_then(|q| q.pages.into_values().next())
            .filter(|p| !p.extract.trim().is_empty())
            .map(|p| {
                tracing::debug!("Loaded Wikipedia page '{}'", p.title);
                p.extract
            }))
    }
}

#[async_trait]
impl EncyclopediaClient for MediaWikiClient {
    async fn search(&self, query: &str, max_docs: usize) -> Result<Vec<String>, ExtractionError> {
        let limit = max_docs.to_string();
        let response: SearchResponse = self
            .get_json(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", &limit),
                ("format", "json"),
            ])
            .await?;
        let titles: Vec<String> = response
            .query
            .map(|q| q.search.into_iter().map(|h| h.title).collect())
            .unwrap_or_default();

        let mut pages = Vec::with_capacity(titles.len());
        for title in titles.iter().take(max_docs) {
            if let Some(text) = self.page_text(title).await? {
                pages.push(text);
            }
        }
        Ok(pages)
    }
}

impl ExtractorRegistry {
    pub(super) async fn wiki(&self, phrase: &str) -> Result<String, ExtractionError> {
        if !self.oracle.ask(&wiki_gate_question(phrase)).await {
            return Err(ExtractionError::rejected(
                "That is not something searchable on Wikipedia.",
            ));
        }
        self.status.info("Extracting data from Wikipedia");
        let pages = self
            .collab
            .encyclopedia
            .search(phrase, self.wiki_max_docs)
            .await?;
        if pages.is_empty() {
            return Err(ExtractionError::rejected(format!(
                "No Wikipedia page found for '{phrase}'."
            )));
        }
        Ok(pages.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::{ExtractorRegistry, Source, SourceKind};
    use crate::llm::testing::{pair, ScriptedModel};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    #[tokio::test]
    async fn oracle_no_short_circuits_search() {
        let wiki = Arc::new(StubEncyclopedia {
            pages: vec!["unused".into()],
            ..Default::default()
        });
        let mut collab = collaborators();
        collab.encyclopedia = wiki.clone();
        let m = ScriptedModel::replying("m", r#"{"answer": false}"#);
        let reg = ExtractorRegistry::new(pair(&m, &m), collab, &fast_config());

        let out = reg.extract(&Source::new(SourceKind::Wiki, "asdf qwerty")).await;

        assert!(!out.succeeded);
        assert_eq!(
            out.error.unwrap().to_string(),
            "That is not something searchable on Wikipedia."
        );
        assert_eq!(wiki.searches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oracle_yes_loads_at_most_max_docs() {
        let wiki = Arc::new(StubEncyclopedia {
            pages: vec!["Alan Turing was".into(), "a mathematician".into(), "extra".into()],
            ..Default::default()
        });
        let mut collab = collaborators();
        collab.encyclopedia = wiki.clone();
        let m = ScriptedModel::replying("m", r#"{"answer": true}"#);
        let reg = ExtractorRegistry::new(pair(&m, &m), collab, &fast_config());

        let out = reg.extract(&Source::new(SourceKind::Wiki, "Alan Turing")).await;

        assert!(out.succeeded);
        assert_eq!(out.text, "Alan Turing was a mathematician");
        assert_eq!(wiki.searches.load(Ordering::SeqCst), 1);
    }
}
