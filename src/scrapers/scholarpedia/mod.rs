// Scholarpedia: curated, peer-reviewed encyclopedia articles


use anyhow::Result;
use async_trait::async_trait;
use indicatif::ProgressBar;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::html::{element_text, first_text, parse_without_boilerplate, selector};
use super::http::{HttpClient, HttpClientConfig};
use super::{Scraper, limit_reached};
use crate::config::ScraperConfig;
use crate::corpus::{DifficultyLevel, Document, word_count};

const REQUEST_INTERVAL: Duration = Duration::from_secs(2);
const MIN_WORDS: usize = 200;

pub const ARTICLE_URLS: &[&str] = &[
    "http://www.scholarpedia.org/article/Superconductivity",
    "http://www.scholarpedia.org/article/BCS_theory_of_superconductivity",
    "http://www.scholarpedia.org/article/High-temperature_superconductivity",
    "http://www.scholarpedia.org/article/Josephson_junction",
    "http://www.scholarpedia.org/article/Josephson_effect",
    "http://www.scholarpedia.org/article/Superconducting_qubits",
    "http://www.scholarpedia.org/article/SQUID",
    "http://www.scholarpedia.org/article/Quantum_vortices",
    "http://www.scholarpedia.org/article/Ginzburg-Landau_theory",
    "http://www.scholarpedia.org/article/Cooper_pairs",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub content: String,
    pub curators: Vec<String>,
}

/// Title, paragraph text and curators of an article page.
/// `None` when the page has no recognizable content container.
#[inline]
pub fn parse_article(html: &str, url: &str) -> Option<Article> {
    let document = parse_without_boilerplate(html);

    let title = first_text(&document, "h1.firstHeading")
        .or_else(|| first_text(&document, "h1"))
        .unwrap_or_else(|| url.rsplit('/').next().unwrap_or(url).replace('_', " "));

    let container = document
        .select(&selector("div#mw-content-text"))
        .next()
        .or_else(|| document.select(&selector("div.mw-parser-output")).next())?;

    let content = container
        .select(&selector("p"))
        .map(element_text)
        .filter(|paragraph| !paragraph.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    let curators = document
        .select(&selector("div.curators a"))
        .map(element_text)
        .filter(|name| !name.is_empty())
        .collect();

    Some(Article {
        title,
        content,
        curators,
    })
}

#[derive(Debug)]
pub struct ScholarpediaScraper {
    http: HttpClient,
    urls: Vec<String>,
    limit: Option<usize>,
}

impl ScholarpediaScraper {
    #[inline]
    pub fn new(config: &ScraperConfig, limit: Option<usize>) -> Self {
        Self {
            http: HttpClient::new(HttpClientConfig::from_scraper(config, REQUEST_INTERVAL)),
            urls: ARTICLE_URLS.iter().map(ToString::to_string).collect(),
            limit,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_http(mut self, http: HttpClient) -> Self {
        self.http = http;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_urls(mut self, urls: Vec<String>) -> Self {
        self.urls = urls;
        self
    }
}

fn article_document(article: Article, url: &str) -> Document {
    Document::new(
        format!("scholarpedia_{}", article.title.to_lowercase().replace(' ', "_")),
        "scholarpedia",
        "peer_reviewed_encyclopedia",
        article.title,
        url,
        article.content,
        DifficultyLevel::ADVANCED,
    )
    .with_extra("authors", article.curators)
}

#[async_trait]
impl Scraper for ScholarpediaScraper {
    fn name(&self) -> &'static str {
        "scholarpedia"
    }

    async fn scrape(&mut self, progress: &ProgressBar) -> Result<Vec<Document>> {
        progress.set_length(self.urls.len() as u64);
        let urls = self.urls.clone();
        let mut documents = Vec::new();

        for url in &urls {
            progress.inc(1);
            if limit_reached(documents.len(), self.limit) {
                break;
            }
            progress.set_message(url.clone());

            let html = match self.http.get(url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("Failed to fetch {}: {:#}", url, e);
                    continue;
                }
            };
            let Some(article) = parse_article(&html, url) else {
                warn!("No content container found on {}", url);
                continue;
            };

            let words = word_count(&article.content);
            if words < MIN_WORDS {
                debug!("Skipping {} ({} words)", article.title, words);
                continue;
            }
            documents.push(article_document(article, url));
        }

        info!("Scholarpedia: {} of {} articles kept", documents.len(), urls.len());
        Ok(documents)
    }
}
