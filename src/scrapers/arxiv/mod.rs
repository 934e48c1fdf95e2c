// arXiv abstracts through the Atom export API

#[cfg(test)]
mod tests;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Datelike};
use indicatif::ProgressBar;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::html::{collapse_whitespace, element_text, selector};
use super::http::{HttpClient, HttpClientConfig};
use super::{Scraper, limit_reached};
use crate::config::ScraperConfig;
use crate::corpus::{DifficultyLevel, Document, FocusArea};

pub const ARXIV_API: &str = "http://export.arxiv.org/api/query";

const REQUEST_INTERVAL: Duration = Duration::from_secs(3);
pub const REVIEW_TARGET: usize = 40;
pub const RESEARCH_TARGET: usize = 190;

const REVIEW_KEYWORDS: &[&str] = &[
    "review",
    "survey",
    "overview",
    "perspective",
    "tutorial",
    "progress",
    "recent advances",
    "state of the art",
];

/// One search against the API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArxivQuery {
    pub query: String,
    pub max_results: usize,
    /// Query aimed at review papers; skipped once the review target is met
    pub prefer_reviews: bool,
    pub focus: FocusArea,
}

impl ArxivQuery {
    #[inline]
    pub fn new(query: &str, max_results: usize, prefer_reviews: bool, focus: FocusArea) -> Self {
        Self {
            query: query.to_string(),
            max_results,
            prefer_reviews,
            focus,
        }
    }
}

/// The built-in query plan: review-oriented searches first, then topic searches
#[inline]
pub fn default_queries() -> Vec<ArxivQuery> {
    use FocusArea::{HotTopic, Main, SubFocus};

    [
        ("superconductor review", 30, true, Main),
        ("high temperature superconductor review", 25, true, Main),
        ("room temperature superconductor review", 20, true, HotTopic),
        ("unconventional superconductivity review", 20, true, Main),
        ("cuprate superconductor review", 15, true, Main),
        ("BCS theory review", 15, true, Main),
        ("iron-based superconductor review", 15, true, Main),
        ("machine learning superconductor review", 15, true, SubFocus),
        ("BCS theory Cooper pair", 20, false, Main),
        ("Meissner effect magnetic field", 20, false, Main),
        ("Josephson junction superconductor", 20, false, Main),
        ("superconductor critical temperature", 20, false, Main),
        ("London penetration depth", 15, false, Main),
        ("Ginzburg-Landau theory", 15, false, Main),
        ("flux pinning superconductor", 20, false, Main),
        ("Abrikosov vortex", 15, false, Main),
        ("superconducting gap spectroscopy", 20, false, Main),
        ("phonon-mediated pairing", 15, false, Main),
        ("cuprate superconductor YBCO", 30, false, Main),
        ("iron-based superconductor FeSe", 25, false, Main),
        ("nickelate superconductor", 25, false, Main),
        ("d-wave superconductor", 20, false, Main),
        ("unconventional superconductor pairing", 25, false, Main),
        ("pseudogap cuprate", 20, false, Main),
        ("strange metal superconductor", 20, false, Main),
        ("high-Tc mechanism", 25, false, Main),
        ("room temperature superconductor ambient", 30, false, HotTopic),
        ("hydrogen-rich superconductor high pressure", 30, false, HotTopic),
        ("carbonaceous sulfur hydride", 25, false, HotTopic),
        ("LK-99 copper lead apatite", 20, false, HotTopic),
        ("hydride superconductor H3S", 25, false, HotTopic),
        ("lanthanum hydride superconductor", 20, false, HotTopic),
        ("superhydride high pressure", 25, false, HotTopic),
        ("diamond anvil cell superconductor", 20, false, HotTopic),
        ("ambient pressure superconductivity", 25, false, HotTopic),
        ("metallic hydrogen superconductor", 20, false, HotTopic),
        ("machine learning superconductor prediction Tc", 30, false, SubFocus),
        ("neural network superconductor properties", 25, false, SubFocus),
        ("density functional theory superconductor", 30, false, SubFocus),
        ("ab initio superconductor calculation", 25, false, SubFocus),
        ("computational prediction superconductor", 25, false, SubFocus),
        ("materials informatics superconductor", 20, false, SubFocus),
        ("deep learning crystal structure superconductor", 25, false, SubFocus),
        ("high-throughput screening superconductor", 25, false, SubFocus),
        ("superconducting qubit quantum computing", 25, false, Main),
        ("superconducting magnet MRI", 20, false, Main),
        ("superconductor power transmission", 20, false, Main),
        ("superconducting cavity", 15, false, Main),
        ("Maglev superconductor", 15, false, Main),
        ("superconducting electronics", 20, false, Main),
    ]
    .into_iter()
    .map(|(query, max_results, prefer_reviews, focus)| {
        ArxivQuery::new(query, max_results, prefer_reviews, focus)
    })
    .collect()
}

/// A parsed Atom `<entry>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArxivEntry {
    pub entry_id: String,
    pub title: String,
    pub summary: String,
    pub authors: Vec<String>,
    pub pdf_url: Option<String>,
    pub published: Option<String>,
    pub categories: Vec<String>,
}

impl ArxivEntry {
    /// Trailing path segment of the entry URL, e.g. `2301.01234v2`
    #[inline]
    pub fn short_id(&self) -> &str {
        self.entry_id
            .rsplit('/')
            .next()
            .unwrap_or(self.entry_id.as_str())
    }
}

/// A title keyword, or at least two keywords in the abstract, marks a review
#[inline]
pub fn is_review_paper(title: &str, summary: &str) -> bool {
    let title = title.to_lowercase();
    if REVIEW_KEYWORDS.iter().any(|keyword| title.contains(keyword)) {
        return true;
    }

    let summary = summary.to_lowercase();
    REVIEW_KEYWORDS
        .iter()
        .filter(|keyword| summary.contains(*keyword))
        .count()
        >= 2
}

/// Extract entries from an Atom feed
#[inline]
pub fn parse_atom_feed(xml: &str) -> Vec<ArxivEntry> {
    let document = Html::parse_document(xml);
    let entry_selector = selector("entry");
    let id_selector = selector("id");
    let title_selector = selector("title");
    let summary_selector = selector("summary");
    let name_selector = selector("author name");
    let pdf_selector = selector(r#"link[title="pdf"]"#);
    let published_selector = selector("published");
    let category_selector = selector("category[term]");

    document
        .select(&entry_selector)
        .filter_map(|entry| {
            let text_of = |sel: &Selector| entry.select(sel).next().map(element_text);

            let entry_id = text_of(&id_selector)?;
            let title = text_of(&title_selector)?;
            let summary = text_of(&summary_selector).unwrap_or_default();

            Some(ArxivEntry {
                entry_id,
                title: collapse_whitespace(&title),
                summary: collapse_whitespace(&summary),
                authors: entry.select(&name_selector).map(element_text).collect(),
                pdf_url: entry
                    .select(&pdf_selector)
                    .next()
                    .and_then(|link| link.value().attr("href"))
                    .map(ToString::to_string),
                published: text_of(&published_selector),
                categories: entry
                    .select(&category_selector)
                    .filter_map(|category| category.value().attr("term"))
                    .map(ToString::to_string)
                    .collect(),
            })
        })
        .collect()
}

#[derive(Debug)]
pub struct ArxivScraper {
    http: HttpClient,
    api_url: String,
    queries: Vec<ArxivQuery>,
    review_target: usize,
    research_target: usize,
    limit: Option<usize>,
}

impl ArxivScraper {
    #[inline]
    pub fn new(config: &ScraperConfig, limit: Option<usize>) -> Self {
        Self {
            http: HttpClient::new(HttpClientConfig::from_scraper(config, REQUEST_INTERVAL)),
            api_url: ARXIV_API.to_string(),
            queries: default_queries(),
            review_target: REVIEW_TARGET,
            research_target: RESEARCH_TARGET,
            limit,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_endpoint(mut self, http: HttpClient, api_url: impl Into<String>) -> Self {
        self.http = http;
        self.api_url = api_url.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_queries(mut self, queries: Vec<ArxivQuery>) -> Self {
        self.queries = queries;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_targets(mut self, reviews: usize, research: usize) -> Self {
        self.review_target = reviews;
        self.research_target = research;
        self
    }

    async fn search(&mut self, query: &ArxivQuery) -> Result<Vec<ArxivEntry>> {
        let max_results = query.max_results.to_string();
        let body = self
            .http
            .get_with_query(
                &self.api_url,
                &[
                    ("search_query", query.query.as_str()),
                    ("start", "0"),
                    ("max_results", max_results.as_str()),
                    ("sortBy", "relevance"),
                ],
            )
            .await?;
        Ok(parse_atom_feed(&body))
    }
}

fn entry_document(entry: &ArxivEntry, is_review: bool, focus: FocusArea) -> Document {
    let year = entry
        .published
        .as_deref()
        .and_then(|published| DateTime::parse_from_rfc3339(published).ok())
        .map(|published| published.year());

    let mut document = Document::new(
        format!("arxiv_{}", entry.short_id()),
        "arxiv",
        if is_review { "review" } else { "research" },
        entry.title.clone(),
        entry.entry_id.clone(),
        entry.summary.clone(),
        DifficultyLevel::EXPERT,
    )
    .with_focus(focus)
    .with_extra("authors", entry.authors.clone())
    .with_extra("categories", entry.categories.clone());

    if let Some(pdf_url) = &entry.pdf_url {
        document = document.with_extra("pdf_url", pdf_url.clone());
    }
    if let Some(published) = &entry.published {
        document = document.with_extra("published", published.clone());
    }
    if let Some(year) = year {
        document = document.with_extra("year", year);
    }
    document
}

#[async_trait]
impl Scraper for ArxivScraper {
    fn name(&self) -> &'static str {
        "arxiv"
    }

    async fn scrape(&mut self, progress: &ProgressBar) -> Result<Vec<Document>> {
        progress.set_length(self.queries.len() as u64);

        let mut reviews = Vec::new();
        let mut research = Vec::new();
        let mut seen_ids = HashSet::new();
        let queries = self.queries.clone();

        for query in &queries {
            progress.inc(1);
            let collected = reviews.len() + research.len();
            if (reviews.len() >= self.review_target && research.len() >= self.research_target)
                || limit_reached(collected, self.limit)
            {
                break;
            }
            if query.prefer_reviews && reviews.len() >= self.review_target {
                debug!("Review target met, skipping '{}'", query.query);
                continue;
            }
            progress.set_message(query.query.clone());

            let entries = match self.search(query).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("arXiv search '{}' failed: {:#}", query.query, e);
                    continue;
                }
            };
            debug!("'{}' returned {} entries", query.query, entries.len());

            for entry in entries {
                if limit_reached(reviews.len() + research.len(), self.limit) {
                    break;
                }
                if !seen_ids.insert(entry.entry_id.clone()) {
                    continue;
                }

                let is_review = is_review_paper(&entry.title, &entry.summary);
                if is_review && reviews.len() < self.review_target {
                    reviews.push(entry_document(&entry, true, query.focus));
                } else if !is_review && research.len() < self.research_target {
                    research.push(entry_document(&entry, false, query.focus));
                }
            }
        }

        info!(
            "arXiv: {} reviews + {} research papers",
            reviews.len(),
            research.len()
        );
        reviews.extend(research);
        Ok(reviews)
    }
}
