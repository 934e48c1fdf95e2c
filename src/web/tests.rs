use super::*;
use crate::config::SearchConfig;
use crate::corpus::Document;
use crate::embeddings::Embedder;
use crate::index::build_index;
use axum::body::{Body, to_bytes};
use axum::http::{Request, header};
use indicatif::ProgressBar;
use std::sync::Arc;
use tower::ServiceExt;

const VOCABULARY: &[&str] = &["superconductor", "cuprate", "vortex"];

struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keywords"
    }

    fn dimension(&self) -> usize {
        VOCABULARY.len() + 1
    }

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let text = text.to_lowercase();
        let mut vector: Vec<f32> = VOCABULARY
            .iter()
            .map(|word| text.matches(word).count() as f32)
            .collect();
        vector.push(0.1);
        Ok(vector)
    }
}

fn engine() -> SearchEngine {
    let documents = vec![
        Document::new(
            "simple_wiki_1",
            "simple_wikipedia",
            "encyclopedia",
            "Superconductor <basics>",
            "https://simple.wikipedia.org/wiki/Superconductor",
            "a superconductor has zero resistance",
            DifficultyLevel::BEGINNER,
        ),
        Document::new(
            "arxiv_1",
            "arxiv",
            "research",
            "Cuprate superconductor films",
            "https://arxiv.org/abs/2401.00001",
            "cuprate superconductor cuprate",
            DifficultyLevel::EXPERT,
        ),
        Document::new(
            "ocw_1",
            "mit_ocw",
            "lecture_notes",
            "Vortex lattices",
            "",
            "vortex vortex superconductor",
            DifficultyLevel::ADVANCED,
        ),
    ];
    let embedder = Arc::new(KeywordEmbedder);
    let index = build_index(&documents, embedder.as_ref(), 8, None, &ProgressBar::hidden())
        .expect("index should build");
    SearchEngine::new(index, embedder, SearchConfig::default()).expect("dimensions agree")
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    String::from_utf8(bytes.to_vec()).expect("body should be UTF-8")
}

async fn get_page(uri: &str) -> (StatusCode, String) {
    let response = router(engine())
        .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("valid request"))
        .await
        .expect("router should respond");
    let status = response.status();
    (status, body_text(response).await)
}

async fn post_search(body: serde_json::Value) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/search")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request");
    let response = router(engine())
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    (status, body_text(response).await)
}

#[tokio::test(flavor = "multi_thread")]
async fn page_without_query_shows_only_the_form() {
    let (status, html) = get_page("/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("<form method=\"get\" action=\"/\">"));
    assert!(!html.contains("Detected query level"));
    assert!(!html.contains("class=\"message\""));
}

#[tokio::test(flavor = "multi_thread")]
async fn page_renders_result_cards() {
    let (status, html) = get_page("/?q=what+is+a+superconductor&difficulty=all&results=5").await;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Detected query level: 1 (Beginner)"));
    assert!(html.contains("https://simple.wikipedia.org/wiki/Superconductor"));
    assert!(html.contains("Superconductor &lt;basics&gt;"));
    assert!(!html.contains("<basics>"));
    assert!(html.contains("value=\"what is a superconductor\""));
}

#[tokio::test(flavor = "multi_thread")]
async fn page_reports_empty_query_and_bad_filter() {
    let (_, empty) = get_page("/?q=+++").await;
    assert!(empty.contains(&QueryError::EmptyQuery.to_string()));

    let (status, invalid) = get_page("/?q=cuprate&difficulty=9").await;
    assert_eq!(status, StatusCode::OK);
    assert!(invalid.contains("Invalid difficulty filter: 9"));
    assert!(!invalid.contains("Detected query level"));
}

#[tokio::test(flavor = "multi_thread")]
async fn page_treats_cleared_fields_as_defaults() {
    let (status, html) = get_page("/?q=cuprate&difficulty=&results=").await;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Detected query level"));
    assert!(html.contains("value=\"10\""));
    assert!(!html.contains("Invalid difficulty filter"));

    let (status, html) = get_page("/?q=cuprate&difficulty=all&results=lots").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("value=\"10\""));
}

#[test]
fn page_query_parses_leniently() {
    let blank = PageQuery {
        q: Some("vortex".to_string()),
        difficulty: Some("  ".to_string()),
        results: Some(String::new()),
    };
    assert_eq!(blank.results(), None);
    assert_eq!(blank.difficulty(), None);

    let filled = PageQuery {
        q: None,
        difficulty: Some("3".to_string()),
        results: Some(" 15 ".to_string()),
    };
    assert_eq!(filled.results(), Some(15));
    assert_eq!(filled.difficulty(), Some("3"));
}

#[tokio::test(flavor = "multi_thread")]
async fn page_filter_with_no_matches_shows_message() {
    let (_, html) = get_page("/?q=vortex&difficulty=5").await;
    assert!(html.contains(NO_RESULTS_MESSAGE));
}

#[tokio::test(flavor = "multi_thread")]
async fn api_search_returns_ranked_results() {
    let (status, body) = post_search(serde_json::json!({
        "query": "cuprate superconductor",
        "difficulty_filter": 4,
        "num_results": 50
    }))
    .await;
    assert_eq!(status, StatusCode::OK);

    let response: SearchResponse = serde_json::from_str(&body).expect("response should be JSON");
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].doc_id, "arxiv_1");
    assert_eq!(response.results[0].rank, 1);
    assert_eq!(response.results[0].difficulty_level, DifficultyLevel::EXPERT);
}

#[tokio::test(flavor = "multi_thread")]
async fn api_search_accepts_string_filters() {
    let (status, body) = post_search(serde_json::json!({
        "query": "superconductor",
        "difficulty_filter": "all"
    }))
    .await;
    assert_eq!(status, StatusCode::OK);

    let response: SearchResponse = serde_json::from_str(&body).expect("response should be JSON");
    assert_eq!(response.results.len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn api_search_rejects_bad_input() {
    let (status, body) = post_search(serde_json::json!({ "query": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorBody = serde_json::from_str(&body).expect("error should be JSON");
    assert_eq!(error.error, QueryError::EmptyQuery.to_string());

    let (status, body) = post_search(serde_json::json!({
        "query": "cuprate",
        "difficulty_filter": "expert"
    }))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Invalid difficulty filter"));
}

#[tokio::test(flavor = "multi_thread")]
async fn health_reports_index_size() {
    let (status, body) = get_page("/api/health").await;
    assert_eq!(status, StatusCode::OK);

    let health: HealthResponse = serde_json::from_str(&body).expect("health should be JSON");
    assert_eq!(health.status, "ok");
    assert_eq!(health.documents, 3);
    assert_eq!(health.model, "keywords");
}

#[test]
fn json_difficulty_filters() {
    assert_eq!(difficulty_from_json(None), Ok(None));
    assert_eq!(difficulty_from_json(Some(&serde_json::Value::Null)), Ok(None));
    assert_eq!(
        difficulty_from_json(Some(&serde_json::json!(2))),
        Ok(Some(DifficultyLevel::INTERMEDIATE))
    );
    assert_eq!(
        difficulty_from_json(Some(&serde_json::json!("5"))),
        Ok(Some(DifficultyLevel::CUTTING_EDGE))
    );
    assert!(difficulty_from_json(Some(&serde_json::json!(true))).is_err());
}
