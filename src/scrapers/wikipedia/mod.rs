// English and Simple English Wikipedia via the MediaWiki action API

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use async_trait::async_trait;
use indicatif::ProgressBar;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::html::clean_wiki_text;
use super::http::{HttpClient, HttpClientConfig};
use super::{Scraper, limit_reached};
use crate::config::ScraperConfig;
use crate::corpus::{DifficultyLevel, Document, FocusArea, word_count};

pub const WIKIPEDIA_API: &str = "https://en.wikipedia.org/w/api.php";
pub const SIMPLE_WIKIPEDIA_API: &str = "https://simple.wikipedia.org/w/api.php";

const REQUEST_INTERVAL: Duration = Duration::from_millis(500);
const SIMPLE_MIN_WORDS: usize = 100;
const SIMPLE_SEARCH_LIMIT: usize = 10;

/// Topic groups of the English Wikipedia catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Fundamentals,
    Materials,
    HighTc,
    Applications,
    RoomTemp,
    AiMaterials,
    PeopleHistory,
}

impl Category {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fundamentals => "fundamentals",
            Self::Materials => "materials",
            Self::HighTc => "high_tc",
            Self::Applications => "applications",
            Self::RoomTemp => "room_temp",
            Self::AiMaterials => "ai_materials",
            Self::PeopleHistory => "people_history",
        }
    }

    #[inline]
    pub fn difficulty(self) -> DifficultyLevel {
        match self {
            Self::Fundamentals | Self::Materials | Self::Applications => {
                DifficultyLevel::INTERMEDIATE
            }
            Self::HighTc | Self::AiMaterials => DifficultyLevel::ADVANCED,
            Self::RoomTemp => DifficultyLevel::EXPERT,
            Self::PeopleHistory => DifficultyLevel::BEGINNER,
        }
    }

    #[inline]
    pub fn focus(self) -> FocusArea {
        match self {
            Self::RoomTemp => FocusArea::HotTopic,
            Self::AiMaterials => FocusArea::SubFocus,
            _ => FocusArea::Main,
        }
    }
}

pub const CATALOGUE: &[(Category, &[&str])] = &[
    (
        Category::Fundamentals,
        &[
            "Superconductivity",
            "History of superconductivity",
            "BCS theory",
            "Cooper pair",
            "Meissner effect",
            "Type-I superconductor",
            "Type-II superconductor",
            "Josephson effect",
            "London equations",
            "Ginzburg-Landau theory",
            "Coherence length",
            "Penetration depth",
            "Flux pinning",
            "Magnetic flux quantum",
            "Abrikosov vortex",
            "Phonon",
            "Critical temperature",
            "Critical magnetic field",
            "Superconducting gap",
            "London penetration depth",
            "Little-Parks effect",
            "Proximity effect (superconductivity)",
            "Andreev reflection",
            "Zero resistance",
            "Perfect diamagnetism",
            "Flux creep",
            "Quantum vortex",
            "Vortex matter",
            "Critical state model",
            "Diamagnetism",
        ],
    ),
    (
        Category::Materials,
        &[
            "Cuprate superconductor",
            "Yttrium barium copper oxide",
            "Bismuth strontium calcium copper oxide",
            "Iron-based superconductor",
            "Carbonaceous sulfur hydride",
            "Magnesium diboride",
            "Niobium-titanium",
            "Niobium-tin",
            "Lanthanum hydride",
            "Nickelate superconductor",
            "Heavy fermion superconductor",
            "Organic superconductor",
            "Chevrel phases",
            "A15 phases",
            "Mercury barium calcium copper oxide",
            "Thallium barium calcium copper oxide",
            "Lead",
            "Tin",
            "Aluminum",
            "Niobium",
            "Vanadium",
            "Technetium",
            "Fullerene",
            "Pnictogen",
            "Chalcogen",
        ],
    ),
    (
        Category::HighTc,
        &[
            "High-temperature superconductivity",
            "Unconventional superconductor",
            "Pseudogap",
            "Fermi liquid theory",
            "Quantum critical point",
            "Spin fluctuation",
            "Charge density wave",
            "Stripe phase",
            "Superconducting order parameter",
            "Pairing symmetry",
        ],
    ),
    (
        Category::Applications,
        &[
            "Josephson effect",
            "Superconducting magnet",
            "SQUID",
            "Josephson junction",
            "Superconducting quantum computing",
            "Superconducting radio frequency",
            "Rapid single flux quantum",
            "Superconducting tunnel junction",
            "Superconducting wire",
            "Superconducting cable",
            "Magnetic levitation",
            "Maglev",
            "Magnetic resonance imaging",
            "Nuclear magnetic resonance",
            "Qubit",
            "Particle accelerator",
            "Flux qubit",
            "Superconducting electric machine",
            "Superconducting transformer",
            "Fault current limiter",
        ],
    ),
    (
        Category::RoomTemp,
        &[
            "Room-temperature superconductor",
            "High pressure",
            "Diamond anvil cell",
            "Carbonaceous sulfur hydride",
            "Hydrogen sulfide",
            "Lanthanum hydride",
            "Metallic hydrogen",
            "Superhydride",
        ],
    ),
    (
        Category::AiMaterials,
        &[
            "Materials informatics",
            "Computational materials science",
            "Density functional theory",
            "Machine learning",
            "Materials genome initiative",
            "High-throughput screening",
            "Ab initio quantum chemistry methods",
            "Molecular dynamics",
            "Crystal structure prediction",
            "Materials database",
        ],
    ),
    (
        Category::PeopleHistory,
        &[
            "John Bardeen",
            "Leon Cooper",
            "John Robert Schrieffer",
            "Heike Kamerlingh Onnes",
            "Alexei Abrikosov",
            "Vitaly Ginzburg",
            "Lev Landau",
            "Brian Josephson",
        ],
    ),
];

pub const SIMPLE_SEARCH_QUERIES: &[&str] = &[
    "superconductor",
    "superconductivity",
    "electrical resistance",
    "electricity conductor",
    "magnetic levitation",
    "liquid nitrogen",
    "quantum mechanics",
    "BCS theory",
    "Meissner effect",
    "critical temperature",
    "type I superconductor",
    "type II superconductor",
    "high temperature superconductor",
    "room temperature superconductor",
    "YBCO",
    "liquid helium",
    "cryogenics",
    "quantum physics",
    "condensed matter physics",
    "materials science",
];

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    query: Option<QueryBody>,
}

#[derive(Debug, Default, Deserialize)]
struct QueryBody {
    #[serde(default)]
    pages: BTreeMap<String, Page>,
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

/// One page of a `prop=extracts|info` response
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub pageid: Option<u64>,
    pub title: String,
    #[serde(default)]
    pub extract: Option<String>,
    #[serde(default)]
    pub fullurl: Option<String>,
    #[serde(default)]
    missing: Option<serde_json::Value>,
}

impl Page {
    /// Lead section of a plain-text extract, before the first heading
    #[inline]
    pub fn summary(&self) -> Option<String> {
        let extract = self.extract.as_deref()?;
        let lead = extract.split("\n==").next().unwrap_or_default();
        let lead = clean_wiki_text(lead);
        (!lead.is_empty()).then_some(lead)
    }
}

/// Thin client over a MediaWiki `api.php` endpoint
#[derive(Debug)]
pub struct MediaWikiClient {
    http: HttpClient,
    api_url: String,
}

impl MediaWikiClient {
    #[inline]
    pub fn new(http: HttpClient, api_url: impl Into<String>) -> Self {
        Self {
            http,
            api_url: api_url.into(),
        }
    }

    /// Plain-text extract and canonical URL of a page, following redirects.
    /// Returns `None` for missing pages.
    #[inline]
    pub async fn fetch_page(&mut self, title: &str) -> Result<Option<Page>> {
        let response: QueryResponse = self
            .http
            .get_json(
                &self.api_url,
                &[
                    ("action", "query"),
                    ("format", "json"),
                    ("prop", "extracts|info"),
                    ("explaintext", "1"),
                    ("inprop", "url"),
                    ("redirects", "1"),
                    ("titles", title),
                ],
            )
            .await
            .with_context(|| format!("Failed to fetch page '{}'", title))?;

        let page = response
            .query
            .unwrap_or_default()
            .pages
            .into_values()
            .next()
            .filter(|page| page.missing.is_none() && page.extract.is_some());
        Ok(page)
    }

    /// Titles matching a full-text search
    #[inline]
    pub async fn search(&mut self, query: &str, limit: usize) -> Result<Vec<String>> {
        let limit = limit.to_string();
        let response: QueryResponse = self
            .http
            .get_json(
                &self.api_url,
                &[
                    ("action", "query"),
                    ("format", "json"),
                    ("list", "search"),
                    ("srsearch", query),
                    ("srlimit", &limit),
                ],
            )
            .await
            .with_context(|| format!("Failed to search for '{}'", query))?;

        Ok(response
            .query
            .unwrap_or_default()
            .search
            .into_iter()
            .map(|hit| hit.title)
            .collect())
    }
}

/// Curated English Wikipedia articles grouped by category
#[derive(Debug)]
pub struct WikipediaScraper {
    client: MediaWikiClient,
    catalogue: Vec<(Category, Vec<String>)>,
    limit: Option<usize>,
}

impl WikipediaScraper {
    #[inline]
    pub fn new(config: &ScraperConfig, limit: Option<usize>) -> Self {
        let http = HttpClient::new(HttpClientConfig::from_scraper(config, REQUEST_INTERVAL));
        Self {
            client: MediaWikiClient::new(http, WIKIPEDIA_API),
            catalogue: CATALOGUE
                .iter()
                .map(|(category, titles)| {
                    (*category, titles.iter().map(ToString::to_string).collect())
                })
                .collect(),
            limit,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_client(mut self, client: MediaWikiClient) -> Self {
        self.client = client;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_catalogue(mut self, catalogue: Vec<(Category, Vec<String>)>) -> Self {
        self.catalogue = catalogue;
        self
    }
}

#[async_trait]
impl Scraper for WikipediaScraper {
    fn name(&self) -> &'static str {
        "wikipedia"
    }

    async fn scrape(&mut self, progress: &ProgressBar) -> Result<Vec<Document>> {
        let total: usize = self.catalogue.iter().map(|(_, titles)| titles.len()).sum();
        progress.set_length(total as u64);

        let mut documents = Vec::new();
        let mut seen = HashSet::new();

        'categories: for (category, titles) in &self.catalogue {
            info!("Category {} ({} articles)", category.as_str(), titles.len());

            for title in titles {
                progress.inc(1);
                if limit_reached(documents.len(), self.limit) {
                    break 'categories;
                }
                if !seen.insert(title.clone()) {
                    debug!("Skipping repeated title {}", title);
                    continue;
                }
                progress.set_message(title.clone());

                let page = match self.client.fetch_page(title).await {
                    Ok(Some(page)) => page,
                    Ok(None) => {
                        warn!("Article '{}' not found", title);
                        continue;
                    }
                    Err(e) => {
                        warn!("Skipping '{}': {:#}", title, e);
                        continue;
                    }
                };

                let text = clean_wiki_text(page.extract.as_deref().unwrap_or_default());
                if text.is_empty() {
                    continue;
                }

                let summary = page.summary().unwrap_or_default();
                let document = Document::new(
                    format!("wikipedia_{}", documents.len() + 1),
                    "wikipedia",
                    "encyclopedia",
                    page.title,
                    page.fullurl.unwrap_or_default(),
                    text,
                    category.difficulty(),
                )
                .with_summary(summary)
                .with_focus(category.focus())
                .with_extra("category", category.as_str());

                debug!(
                    "Collected {} ({} words, level {})",
                    document.title,
                    document.word_count,
                    document.difficulty_level.get()
                );
                documents.push(document);
            }
        }

        info!("Wikipedia: {} articles collected", documents.len());
        Ok(documents)
    }
}

/// Beginner articles discovered through Simple English Wikipedia search
#[derive(Debug)]
pub struct SimpleWikipediaScraper {
    client: MediaWikiClient,
    queries: Vec<String>,
    limit: Option<usize>,
}

impl SimpleWikipediaScraper {
    #[inline]
    pub fn new(config: &ScraperConfig, limit: Option<usize>) -> Self {
        let http = HttpClient::new(HttpClientConfig::from_scraper(config, REQUEST_INTERVAL));
        Self {
            client: MediaWikiClient::new(http, SIMPLE_WIKIPEDIA_API),
            queries: SIMPLE_SEARCH_QUERIES.iter().map(ToString::to_string).collect(),
            limit,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_client(mut self, client: MediaWikiClient) -> Self {
        self.client = client;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_queries(mut self, queries: Vec<String>) -> Self {
        self.queries = queries;
        self
    }

    async fn discover_titles(&mut self) -> Vec<String> {
        let mut titles = Vec::new();
        let mut seen = HashSet::new();

        for query in &self.queries {
            match self.client.search(query, SIMPLE_SEARCH_LIMIT).await {
                Ok(found) => {
                    debug!("Found {} articles for '{}'", found.len(), query);
                    titles.extend(found.into_iter().filter(|t| seen.insert(t.clone())));
                }
                Err(e) => warn!("Search for '{}' failed: {:#}", query, e),
            }
        }

        info!("Found {} unique Simple Wikipedia articles", titles.len());
        titles
    }
}

#[async_trait]
impl Scraper for SimpleWikipediaScraper {
    fn name(&self) -> &'static str {
        "simple_wikipedia"
    }

    async fn scrape(&mut self, progress: &ProgressBar) -> Result<Vec<Document>> {
        let titles = self.discover_titles().await;
        progress.set_length(titles.len() as u64);

        let mut documents = Vec::new();
        for title in titles {
            progress.inc(1);
            if limit_reached(documents.len(), self.limit) {
                break;
            }
            progress.set_message(title.clone());

            let page = match self.client.fetch_page(&title).await {
                Ok(Some(page)) => page,
                Ok(None) => {
                    warn!("Article '{}' not found", title);
                    continue;
                }
                Err(e) => {
                    warn!("Skipping '{}': {:#}", title, e);
                    continue;
                }
            };

            let text = clean_wiki_text(page.extract.as_deref().unwrap_or_default());
            let words = word_count(&text);
            if words < SIMPLE_MIN_WORDS {
                debug!("Article '{}' too short ({} words)", title, words);
                continue;
            }

            let Some(pageid) = page.pageid else {
                warn!("Article '{}' has no page id", title);
                continue;
            };

            documents.push(Document::new(
                format!("simple_wiki_{}", pageid),
                "simple_wikipedia",
                "encyclopedia",
                page.title,
                page.fullurl.unwrap_or_default(),
                text,
                DifficultyLevel::BEGINNER,
            ));
        }

        info!("Simple Wikipedia: {} articles collected", documents.len());
        Ok(documents)
    }
}
