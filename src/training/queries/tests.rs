use super::*;
use serial_test::serial;
use std::cell::Cell;
use tempfile::TempDir;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

fn doc(id: &str, source: &str, title: &str, level: DifficultyLevel) -> Document {
    Document::new(id, source, "encyclopedia", title, "", "Cooper pairs condense.", level)
}

fn llm_config(server: &MockServer) -> LlmConfig {
    LlmConfig {
        api_url: server.uri(),
        request_delay_ms: 0,
        ..LlmConfig::default()
    }
}

/// Generator that fails on chosen documents and counts calls
struct ScriptedGenerator {
    fail_on: &'static str,
    calls: Cell<usize>,
}

impl QueryGenerator for ScriptedGenerator {
    fn generate(&self, document: &Document, _count: usize) -> Result<Vec<String>> {
        self.calls.set(self.calls.get() + 1);
        if document.id == self.fail_on {
            return Err(anyhow!("rate limited"));
        }
        Ok(vec![format!("{} query", document.id)])
    }

    fn pair_type(&self) -> PairType {
        PairType::LlmGeneratedPositive
    }
}

#[test]
fn query_count_depends_on_source_and_level() {
    assert_eq!(queries_per_document(&doc("a", "wikipedia", "A", DifficultyLevel::ADVANCED)), 10);
    assert_eq!(queries_per_document(&doc("b", "arxiv", "B", DifficultyLevel::BEGINNER)), 15);
    assert_eq!(queries_per_document(&doc("c", "youtube", "C", DifficultyLevel::EXPERT)), 15);
}

#[test]
fn prompt_reflects_difficulty_and_source() {
    let beginner = build_prompt(&doc("a", "simple_wikipedia", "Magnets", DifficultyLevel::BEGINNER), 10);
    assert!(beginner.contains("Title: Magnets"));
    assert!(beginner.contains("Difficulty Level: 1/5 (Beginner)"));
    assert!(beginner.contains("explain like teaching a 15-year-old"));
    assert!(beginner.contains("Generate 10 diverse search queries"));
    assert!(!beginner.contains("Research-level"));
    assert!(!beginner.contains("RESEARCH PAPERS"));

    let paper = build_prompt(&doc("b", "arxiv", "Nickelates", DifficultyLevel::CUTTING_EDGE), 15);
    assert!(paper.contains("world experts in this specific subfield"));
    assert!(paper.contains("Research-level"));
    assert!(paper.contains("RESEARCH PAPERS"));
}

#[test]
fn prompt_preview_is_truncated() {
    let mut document = doc("a", "wikipedia", "Long", DifficultyLevel::ADVANCED);
    document.text = "é".repeat(PREVIEW_CHARS + 100);
    let prompt = build_prompt(&document, 10);
    assert!(prompt.contains(&"é".repeat(PREVIEW_CHARS)));
    assert!(!prompt.contains(&"é".repeat(PREVIEW_CHARS + 1)));
}

#[test]
fn response_parsing() {
    let plain = parse_query_response(r#"{"queries": ["meissner effect", "  ", " bcs theory "]}"#)
        .expect("plain JSON should parse");
    assert_eq!(plain, vec!["meissner effect", "bcs theory"]);

    let fenced = parse_query_response("```json\n{\"queries\": [\"flux pinning\"]}\n```")
        .expect("fenced JSON should parse");
    assert_eq!(fenced, vec!["flux pinning"]);

    assert!(parse_query_response("Sure! Here are some queries:").is_err());
}

#[test]
fn templates_follow_difficulty() {
    let beginner = template_queries(&doc("a", "w", "Meissner Effect", DifficultyLevel::BEGINNER));
    assert_eq!(
        beginner,
        vec![
            "meissner effect",
            "what is meissner effect",
            "meissner effect explained simply",
            "meissner effect for beginners",
            "how does meissner effect work"
        ]
    );

    let expert = template_queries(&doc("b", "arxiv", "Pair density waves", DifficultyLevel::EXPERT));
    assert!(expert.contains(&"recent research on pair density waves".to_string()));

    assert!(template_queries(&doc("c", "w", "  ", DifficultyLevel::BEGINNER)).is_empty());
}

#[test]
fn template_generator_caps_count() {
    let document = doc("a", "w", "BCS theory", DifficultyLevel::ADVANCED);
    let queries = TemplateGenerator
        .generate(&document, 3)
        .expect("templates never fail");
    assert_eq!(queries.len(), 3);
    assert_eq!(TemplateGenerator.pair_type(), PairType::TemplatePositive);
}

#[test]
fn client_requires_api_key() {
    let error = AnthropicClient::new(None, &LlmConfig::default()).expect_err("key is required");
    assert!(error.to_string().contains(API_KEY_ENV));
    assert!(AnthropicClient::new(Some(" ".to_string()), &LlmConfig::default()).is_err());

    let client = AnthropicClient::new(Some("sk-test".to_string()), &LlmConfig::default())
        .expect("key is present");
    assert_eq!(client.endpoint, "https://api.anthropic.com/v1/messages");
    assert!(!format!("{:?}", client).contains("sk-test"));
}

#[test]
#[serial]
fn client_reads_key_from_environment() {
    let previous = std::env::var(API_KEY_ENV).ok();

    // SAFETY: every test touching this variable is serialised
    unsafe { std::env::remove_var(API_KEY_ENV) };
    let error = AnthropicClient::from_env(&LlmConfig::default()).expect_err("key is unset");
    assert!(error.to_string().contains("--offline"));

    // SAFETY: as above
    unsafe { std::env::set_var(API_KEY_ENV, "sk-from-env") };
    let client = AnthropicClient::from_env(&LlmConfig::default()).expect("key is set");
    assert_eq!(client.model(), "claude-3-5-sonnet-20241022");

    match previous {
        // SAFETY: as above
        Some(value) => unsafe { std::env::set_var(API_KEY_ENV, value) },
        // SAFETY: as above
        None => unsafe { std::env::remove_var(API_KEY_ENV) },
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn client_sends_messages_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-test"))
        .and(header("anthropic-version", ANTHROPIC_VERSION))
        .and(body_partial_json(serde_json::json!({
            "model": "claude-3-5-sonnet-20241022",
            "max_tokens": 2000,
            "messages": [{ "role": "user" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [{ "type": "text", "text": "{\"queries\": [\"cooper pairs\", \"bcs gap\"]}" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AnthropicClient::new(Some("sk-test".to_string()), &llm_config(&server))
        .expect("key is present");
    let document = doc("bcs", "wikipedia", "BCS theory", DifficultyLevel::ADVANCED);
    let queries = tokio::task::spawn_blocking(move || client.generate(&document, 2))
        .await
        .expect("task should join")
        .expect("generation should succeed");

    assert_eq!(queries, vec!["cooper pairs", "bcs gap"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn client_retries_rate_limits() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [{ "type": "text", "text": "ok" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AnthropicClient::new(Some("sk-test".to_string()), &llm_config(&server))
        .expect("key is present")
        .with_backoff(Duration::from_millis(10));
    let reply = tokio::task::spawn_blocking(move || client.complete("hello"))
        .await
        .expect("task should join")
        .expect("second attempt should succeed");

    assert_eq!(reply, "ok");
}

#[tokio::test(flavor = "multi_thread")]
async fn client_does_not_retry_auth_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = AnthropicClient::new(Some("bad".to_string()), &llm_config(&server))
        .expect("key is present")
        .with_backoff(Duration::from_millis(10));
    let error = tokio::task::spawn_blocking(move || client.complete("hello"))
        .await
        .expect("task should join")
        .expect_err("401 should fail");

    assert!(error.to_string().contains("401"));
}

#[test]
fn generation_skips_failures_and_inherits_difficulty() {
    let documents = vec![
        doc("a", "wikipedia", "A", DifficultyLevel::BEGINNER),
        doc("b", "wikipedia", "B", DifficultyLevel::ADVANCED),
        doc("c", "arxiv", "C", DifficultyLevel::CUTTING_EDGE),
    ];
    let generator = ScriptedGenerator {
        fail_on: "b",
        calls: Cell::new(0),
    };

    let report = generate_pairs(
        &documents,
        &generator,
        &GenerationOptions::default(),
        &ProgressBar::hidden(),
    )
    .expect("generation should finish");

    assert_eq!(report.documents_processed, 3);
    assert_eq!(report.failures, 1);
    assert_eq!(report.pairs.len(), 2);
    assert_eq!(report.pairs[1].query_text, "c query");
    assert_eq!(report.pairs[1].query_difficulty, DifficultyLevel::CUTTING_EDGE);
    assert_eq!(report.pairs[1].pair_type, PairType::LlmGeneratedPositive);
}

#[test]
fn generation_respects_limit() {
    let documents = vec![
        doc("a", "wikipedia", "Alpha", DifficultyLevel::BEGINNER),
        doc("b", "wikipedia", "Beta", DifficultyLevel::BEGINNER),
    ];
    let options = GenerationOptions {
        limit: Some(1),
        ..GenerationOptions::default()
    };
    let report = generate_pairs(&documents, &TemplateGenerator, &options, &ProgressBar::hidden())
        .expect("generation should finish");

    assert_eq!(report.documents_processed, 1);
    assert!(report.pairs.iter().all(|pair| pair.doc_id == "a"));
}

#[test]
fn generation_resumes_from_checkpoint() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let checkpoint = checkpoint_path_for(&temp_dir.path().join("queries.json"));
    assert!(checkpoint.to_string_lossy().ends_with("queries.checkpoint.json"));

    let documents = vec![
        doc("a", "wikipedia", "A", DifficultyLevel::BEGINNER),
        doc("b", "wikipedia", "B", DifficultyLevel::BEGINNER),
    ];
    let saved = QueryCheckpoint {
        documents_processed: 1,
        failures: 0,
        pairs: vec![TrainingPair::positive("a query", &documents[0], PairType::LlmGeneratedPositive)],
    };
    write_json(&checkpoint, &saved).expect("checkpoint should be written");

    let generator = ScriptedGenerator {
        fail_on: "",
        calls: Cell::new(0),
    };
    let options = GenerationOptions {
        limit: None,
        checkpoint_path: Some(checkpoint.clone()),
        resume: true,
    };
    let report = generate_pairs(&documents, &generator, &options, &ProgressBar::hidden())
        .expect("generation should finish");

    assert_eq!(generator.calls.get(), 1);
    let queries: Vec<&str> = report.pairs.iter().map(|p| p.query_text.as_str()).collect();
    assert_eq!(queries, vec!["a query", "b query"]);
    assert!(!checkpoint.exists(), "checkpoint should be removed when done");
}
