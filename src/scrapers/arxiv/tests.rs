use super::*;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: search_query=all:cuprate</title>
  <entry>
    <id>http://arxiv.org/abs/2301.01234v2</id>
    <published>2023-01-03T18:00:00Z</published>
    <title>Recent progress in cuprate
      superconductors: a review</title>
    <summary>We review the pairing mechanism &amp; phase diagram.</summary>
    <author><name>A. Author</name></author>
    <author><name>B. Author</name></author>
    <link href="http://arxiv.org/abs/2301.01234v2" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2301.01234v2" rel="related" type="application/pdf"/>
    <category term="cond-mat.supr-con" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cond-mat.str-el" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2302.05678v1</id>
    <published>2023-02-10T12:00:00Z</published>
    <title>Vortex pinning in YBCO films</title>
    <summary>We measure critical currents in thin films.</summary>
    <author><name>C. Author</name></author>
    <category term="cond-mat.supr-con" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
</feed>"#;

#[test]
fn review_detection() {
    assert!(is_review_paper("A Survey of Hydrides", ""));
    assert!(is_review_paper(
        "Hydrides",
        "We give an overview of recent advances in the field"
    ));
    assert!(!is_review_paper("Hydrides", "An overview of one sample"));
}

#[test]
fn atom_feed_entries_are_parsed() {
    let entries = parse_atom_feed(FEED);
    assert_eq!(entries.len(), 2);

    let first = &entries[0];
    assert_eq!(first.short_id(), "2301.01234v2");
    assert_eq!(first.title, "Recent progress in cuprate superconductors: a review");
    assert_eq!(first.summary, "We review the pairing mechanism & phase diagram.");
    assert_eq!(first.authors, vec!["A. Author", "B. Author"]);
    assert_eq!(
        first.pdf_url.as_deref(),
        Some("http://arxiv.org/pdf/2301.01234v2")
    );
    assert_eq!(first.published.as_deref(), Some("2023-01-03T18:00:00Z"));
    assert_eq!(
        first.categories,
        vec!["cond-mat.supr-con", "cond-mat.str-el"]
    );

    assert_eq!(entries[1].pdf_url, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn scraper_splits_reviews_and_research() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/query"))
        .and(query_param("search_query", "cuprate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
        .expect(1)
        .mount(&server)
        .await;

    let http = HttpClient::new(HttpClientConfig {
        min_interval: Duration::from_millis(0),
        ..HttpClientConfig::default()
    });
    let mut scraper = ArxivScraper::new(&ScraperConfig::default(), None)
        .with_endpoint(http, format!("{}/api/query", server.uri()))
        .with_queries(vec![
            ArxivQuery::new("cuprate", 10, false, FocusArea::Main),
            ArxivQuery::new("cuprate review", 10, true, FocusArea::Main),
        ])
        .with_targets(1, 5);

    let documents = scraper
        .scrape(&ProgressBar::hidden())
        .await
        .expect("scrape should succeed");

    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].id, "arxiv_2301.01234v2");
    assert_eq!(documents[0].doc_type, "review");
    assert_eq!(documents[0].difficulty_level, DifficultyLevel::EXPERT);
    assert_eq!(documents[0].extra.get("year"), Some(&serde_json::json!(2023)));
    assert_eq!(documents[1].doc_type, "research");
    assert_eq!(documents[1].url, "http://arxiv.org/abs/2302.05678v1");
}
