use super::*;
use crate::corpus::{DifficultyLevel, read_json};
use tempfile::TempDir;

struct FixedScraper {
    documents: Vec<Document>,
}

#[async_trait]
impl Scraper for FixedScraper {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn scrape(&mut self, progress: &ProgressBar) -> Result<Vec<Document>> {
        progress.inc(1);
        Ok(std::mem::take(&mut self.documents))
    }
}

struct FailingScraper;

#[async_trait]
impl Scraper for FailingScraper {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn scrape(&mut self, _progress: &ProgressBar) -> Result<Vec<Document>> {
        Err(anyhow::anyhow!("upstream unavailable"))
    }
}

#[test]
fn source_names_match_raw_file_stems() {
    let names: Vec<&str> = Source::ALL.iter().map(|source| source.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "wikipedia",
            "simple_wikipedia",
            "arxiv",
            "youtube",
            "mit_ocw",
            "scholarpedia",
            "hyperphysics"
        ]
    );
    assert_eq!(Source::MitOcw.to_string(), "mit_ocw");
}

#[test]
fn limit_reached_only_with_a_limit() {
    assert!(!limit_reached(1000, None));
    assert!(!limit_reached(4, Some(5)));
    assert!(limit_reached(5, Some(5)));
}

#[tokio::test]
async fn run_scraper_writes_raw_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut scraper = FixedScraper {
        documents: vec![
            Document::new("a", "fixed", "t", "A", "u", "one two three", DifficultyLevel::BEGINNER),
            Document::new("b", "fixed", "t", "B", "u", "four five", DifficultyLevel::EXPERT),
        ],
    };

    let summary = run_scraper(&mut scraper, temp_dir.path())
        .await
        .expect("scraper should run");

    assert_eq!(summary.source, "fixed");
    assert_eq!(summary.documents, 2);
    assert_eq!(summary.total_words, 5);
    assert_eq!(summary.output, temp_dir.path().join("fixed.json"));

    let raw: RawFile = read_json(&summary.output).expect("raw file should parse");
    assert_eq!(raw.metadata.source, "fixed");
    assert_eq!(raw.metadata.total_documents, 2);
    assert_eq!(raw.documents[1].id, "b");
}

#[tokio::test]
async fn run_scraper_reports_failure_with_source_name() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let error = run_scraper(&mut FailingScraper, temp_dir.path())
        .await
        .expect_err("failure should propagate");

    assert!(format!("{:#}", error).contains("failing scraper failed"));
    assert!(!temp_dir.path().join("failing.json").exists());
}

#[test]
fn youtube_requires_api_key_from_environment() {
    let config = Config::default();
    if std::env::var(youtube::API_KEY_ENV).is_err() {
        assert!(scraper_for(Source::Youtube, &config, None).is_err());
    }
    assert!(scraper_for(Source::Hyperphysics, &config, Some(1)).is_ok());
}
