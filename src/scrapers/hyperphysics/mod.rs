// HyperPhysics (Georgia State University) concept pages


use anyhow::Result;
use async_trait::async_trait;
use indicatif::ProgressBar;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::html::{element_text, first_text, remove_elements, selector};
use super::http::{HttpClient, HttpClientConfig};
use super::{Scraper, limit_reached};
use crate::config::ScraperConfig;
use crate::corpus::{DifficultyLevel, Document, word_count};

const REQUEST_INTERVAL: Duration = Duration::from_secs(1);
const MIN_WORDS: usize = 50;
const MIN_FRAGMENT_CHARS: usize = 20;

pub const SEED_URLS: &[&str] = &[
    "http://hyperphysics.phy-astr.gsu.edu/hbase/Solids/scond.html",
    "http://hyperphysics.phy-astr.gsu.edu/hbase/Solids/coper.html",
    "http://hyperphysics.phy-astr.gsu.edu/hbase/Solids/meis.html",
    "http://hyperphysics.phy-astr.gsu.edu/hbase/Solids/joe.html",
    "http://hyperphysics.phy-astr.gsu.edu/hbase/Solids/squid.html",
    "http://hyperphysics.phy-astr.gsu.edu/hbase/Solids/bcs.html",
];

/// File stem of a page URL: `.../Solids/scond.html` -> `scond`
#[inline]
pub fn page_stem(url: &str) -> &str {
    let file = url.rsplit('/').next().unwrap_or(url);
    file.strip_suffix(".html").unwrap_or(file)
}

fn title_from_stem(stem: &str) -> String {
    stem.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Title and body text of a page, text built from `p`, `div` and `li`
/// fragments longer than 20 characters
#[inline]
pub fn parse_page(html: &str, url: &str) -> (String, String) {
    let mut document = scraper::Html::parse_document(html);
    remove_elements(&mut document, &selector("script, style, nav, footer, iframe"));

    let title = first_text(&document, "h1")
        .or_else(|| first_text(&document, "h2"))
        .or_else(|| first_text(&document, "title"))
        .unwrap_or_else(|| title_from_stem(page_stem(url)));

    let mut seen = HashSet::new();
    let fragments: Vec<String> = document
        .select(&selector("body p, body div, body li"))
        .map(element_text)
        .filter(|text| text.chars().count() > MIN_FRAGMENT_CHARS)
        .filter(|text| seen.insert(text.clone()))
        .collect();

    (title, fragments.join("\n"))
}

#[derive(Debug)]
pub struct HyperphysicsScraper {
    http: HttpClient,
    urls: Vec<String>,
    limit: Option<usize>,
}

impl HyperphysicsScraper {
    #[inline]
    pub fn new(config: &ScraperConfig, limit: Option<usize>) -> Self {
        Self {
            http: HttpClient::new(HttpClientConfig::from_scraper(config, REQUEST_INTERVAL)),
            urls: SEED_URLS.iter().map(ToString::to_string).collect(),
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

#[async_trait]
impl Scraper for HyperphysicsScraper {
    fn name(&self) -> &'static str {
        "hyperphysics"
    }

    async fn scrape(&mut self, progress: &ProgressBar) -> Result<Vec<Document>> {
        let mut seen_urls = HashSet::new();
        let urls: Vec<String> = self
            .urls
            .iter()
            .filter(|url| seen_urls.insert((*url).clone()))
            .cloned()
            .collect();
        progress.set_length(urls.len() as u64);

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
            let (title, text) = parse_page(&html, url);

            let words = word_count(&text);
            if words < MIN_WORDS {
                debug!("Skipping {} ({} words)", url, words);
                continue;
            }

            documents.push(
                Document::new(
                    format!("hyperphysics_{}", page_stem(url)),
                    "hyperphysics",
                    "educational",
                    title,
                    url.clone(),
                    text,
                    DifficultyLevel::INTERMEDIATE,
                )
                .with_extra("institution", "Georgia State University"),
            );
        }

        info!("HyperPhysics: {} of {} pages kept", documents.len(), urls.len());
        Ok(documents)
    }
}
