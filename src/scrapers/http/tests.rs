use super::is_retryable_error as is_retryable_error_impl;
use super::validate_url as validate_url_impl;
use super::*;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

fn fast_config() -> HttpClientConfig {
    HttpClientConfig {
        user_agent: "test-agent".to_string(),
        timeout_seconds: 5,
        min_interval: Duration::from_millis(0),
        max_retries: 2,
        retry_delay: Duration::from_millis(10),
    }
}

#[test]
fn validate_url() {
    assert!(validate_url_impl("https://en.wikipedia.org/w/api.php").is_ok());
    assert!(validate_url_impl("http://export.arxiv.org/api/query").is_ok());

    assert!(validate_url_impl("ftp://example.com").is_err());
    assert!(validate_url_impl("not-a-url").is_err());
    assert!(validate_url_impl("").is_err());
    assert!(validate_url_impl("https://").is_err());
}

#[test]
fn retryable_errors() {
    assert!(is_retryable_error_impl(&HttpStatusError(503).into()));
    assert!(is_retryable_error_impl(&HttpStatusError(429).into()));
    assert!(!is_retryable_error_impl(&HttpStatusError(404).into()));
    assert!(!is_retryable_error_impl(&HttpStatusError(403).into()));
    assert!(is_retryable_error_impl(&anyhow!("connection refused")));
    assert!(!is_retryable_error_impl(&anyhow!("invalid json")));
}

#[test]
fn status_code_survives_context() {
    let error = anyhow::Error::from(HttpStatusError(403)).context("search failed");
    assert_eq!(status_code(&error), Some(403));
    assert_eq!(status_code(&anyhow!("other")), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn get_json_with_query_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("action", "query"))
        .and(query_param("titles", "Meissner effect"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = HttpClient::new(fast_config());
    let url = format!("{}/w/api.php", server.uri());
    let body: serde_json::Value = client
        .get_json(&url, &[("action", "query"), ("titles", "Meissner effect")])
        .await
        .expect("request should succeed");

    assert_eq!(body["ok"], true);
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&server)
        .await;

    let mut client = HttpClient::new(fast_config());
    let body = client
        .get(&format!("{}/page", server.uri()))
        .await
        .expect("second attempt should succeed");
    assert_eq!(body, "hello");
}

#[tokio::test(flavor = "multi_thread")]
async fn forbidden_is_returned_immediately() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quota"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = HttpClient::new(fast_config());
    let error = client
        .get(&format!("{}/quota", server.uri()))
        .await
        .expect_err("403 should fail");
    assert_eq!(status_code(&error), Some(403));
}
