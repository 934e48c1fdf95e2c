// Source scrapers: each collects raw documents into `data/raw/<source>.json`

pub mod arxiv;
pub mod html;
pub mod http;
pub mod hyperphysics;
pub mod ocw;
pub mod scholarpedia;
pub mod wikipedia;
pub mod youtube;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use crate::config::Config;
use crate::corpus::{Document, write_json};

pub use http::{HttpClient, HttpClientConfig, HttpStatusError};

/// A source of raw documents
#[async_trait]
pub trait Scraper: Send {
    /// Source name, also used as the raw output file stem
    fn name(&self) -> &'static str;

    /// Collect documents. Individual failures are logged and skipped.
    async fn scrape(&mut self, progress: &ProgressBar) -> Result<Vec<Document>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Source {
    Wikipedia,
    SimpleWikipedia,
    Arxiv,
    Youtube,
    MitOcw,
    Scholarpedia,
    Hyperphysics,
}

impl Source {
    pub const ALL: [Self; 7] = [
        Self::Wikipedia,
        Self::SimpleWikipedia,
        Self::Arxiv,
        Self::Youtube,
        Self::MitOcw,
        Self::Scholarpedia,
        Self::Hyperphysics,
    ];

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wikipedia => "wikipedia",
            Self::SimpleWikipedia => "simple_wikipedia",
            Self::Arxiv => "arxiv",
            Self::Youtube => "youtube",
            Self::MitOcw => "mit_ocw",
            Self::Scholarpedia => "scholarpedia",
            Self::Hyperphysics => "hyperphysics",
        }
    }
}

impl fmt::Display for Source {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Construct the scraper for a source, reading credentials from the environment
#[inline]
pub fn scraper_for(source: Source, config: &Config, limit: Option<usize>) -> Result<Box<dyn Scraper>> {
    let scraper: Box<dyn Scraper> = match source {
        Source::Wikipedia => Box::new(wikipedia::WikipediaScraper::new(&config.scraper, limit)),
        Source::SimpleWikipedia => {
            Box::new(wikipedia::SimpleWikipediaScraper::new(&config.scraper, limit))
        }
        Source::Arxiv => Box::new(arxiv::ArxivScraper::new(&config.scraper, limit)),
        Source::Youtube => Box::new(youtube::YoutubeScraper::from_env(
            &config.scraper,
            config.raw_dir(),
            limit,
        )?),
        Source::MitOcw => Box::new(ocw::OcwScraper::new(&config.scraper, limit)),
        Source::Scholarpedia => {
            Box::new(scholarpedia::ScholarpediaScraper::new(&config.scraper, limit))
        }
        Source::Hyperphysics => {
            Box::new(hyperphysics::HyperphysicsScraper::new(&config.scraper, limit))
        }
    };
    Ok(scraper)
}

/// Header written alongside the documents of a raw file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFileMetadata {
    pub source: String,
    pub scraped_at: DateTime<Utc>,
    pub total_documents: usize,
    pub total_words: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFile {
    pub metadata: RawFileMetadata,
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeSummary {
    pub source: &'static str,
    pub documents: usize,
    pub total_words: usize,
    pub output: PathBuf,
}

/// Spinner shown on an attended terminal, hidden otherwise
#[inline]
pub fn progress_bar(label: &str) -> ProgressBar {
    if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template(&format!("{{spinner}} [{{pos}}/{{len}}] {} {{msg}}", label))
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    }
}

/// Run a scraper and write its documents to `<output_dir>/<name>.json`
#[inline]
pub async fn run_scraper(scraper: &mut dyn Scraper, output_dir: &Path) -> Result<ScrapeSummary> {
    let start_time = Instant::now();
    let name = scraper.name();
    info!("Starting {} scraper", name);

    let bar = progress_bar(&format!("Scraping {}", name));
    let documents = scraper
        .scrape(&bar)
        .await
        .with_context(|| format!("{} scraper failed", name))?;
    bar.finish_and_clear();

    let total_words = documents.iter().map(|d| d.word_count).sum();
    let output = output_dir.join(format!("{}.json", name));
    let raw = RawFile {
        metadata: RawFileMetadata {
            source: name.to_string(),
            scraped_at: Utc::now(),
            total_documents: documents.len(),
            total_words,
        },
        documents,
    };
    write_json(&output, &raw)?;

    info!(
        "{} scraper collected {} documents ({} words) in {:.1}s",
        name,
        raw.documents.len(),
        total_words,
        start_time.elapsed().as_secs_f64()
    );

    Ok(ScrapeSummary {
        source: name,
        documents: raw.documents.len(),
        total_words,
        output,
    })
}

/// True once `limit` documents have been collected
#[inline]
pub(crate) fn limit_reached(collected: usize, limit: Option<usize>) -> bool {
    limit.is_some_and(|limit| collected >= limit)
}
