use super::*;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

fn fast_http() -> HttpClient {
    HttpClient::new(HttpClientConfig {
        min_interval: Duration::from_millis(0),
        retry_delay: Duration::from_millis(10),
        max_retries: 0,
        ..HttpClientConfig::default()
    })
}

fn client_for(server: &MockServer) -> MediaWikiClient {
    MediaWikiClient::new(fast_http(), format!("{}/w/api.php", server.uri()))
}

fn page_body(pageid: u64, title: &str, extract: &str) -> serde_json::Value {
    serde_json::json!({
        "batchcomplete": "",
        "query": {
            "pages": {
                pageid.to_string(): {
                    "pageid": pageid,
                    "ns": 0,
                    "title": title,
                    "extract": extract,
                    "fullurl": format!("https://en.wikipedia.org/wiki/{}", title.replace(' ', "_"))
                }
            }
        }
    })
}

async fn mount_page(server: &MockServer, title: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("titles", title))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[test]
fn category_levels_and_focus() {
    assert_eq!(Category::PeopleHistory.difficulty(), DifficultyLevel::BEGINNER);
    assert_eq!(Category::RoomTemp.difficulty(), DifficultyLevel::EXPERT);
    assert_eq!(Category::HighTc.difficulty(), DifficultyLevel::ADVANCED);
    assert_eq!(Category::RoomTemp.focus(), FocusArea::HotTopic);
    assert_eq!(Category::AiMaterials.focus(), FocusArea::SubFocus);
    assert_eq!(Category::Materials.focus(), FocusArea::Main);
}

#[test]
fn page_summary_is_lead_section() {
    let page = Page {
        pageid: Some(1),
        title: "Meissner effect".to_string(),
        extract: Some(
            "The Meissner effect is the expulsion of a magnetic field.[1]\n\n== History ==\nFound in 1933."
                .to_string(),
        ),
        fullurl: None,
        missing: None,
    };
    assert_eq!(
        page.summary().as_deref(),
        Some("The Meissner effect is the expulsion of a magnetic field.")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_page_is_none() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "No such page",
        serde_json::json!({
            "query": { "pages": { "-1": { "ns": 0, "title": "No such page", "missing": "" } } }
        }),
    )
    .await;

    let mut client = client_for(&server);
    let page = client
        .fetch_page("No such page")
        .await
        .expect("request should succeed");
    assert!(page.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn wikipedia_scraper_builds_documents_once_per_title() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "Cooper pair",
        page_body(
            10,
            "Cooper pair",
            "A Cooper pair is a pair of electrons bound together.\n\n== Theory ==\nBCS.",
        ),
    )
    .await;
    mount_page(
        &server,
        "Room-temperature superconductor",
        page_body(
            11,
            "Room-temperature superconductor",
            "A room-temperature superconductor would work at ambient conditions.",
        ),
    )
    .await;

    let mut scraper = WikipediaScraper::new(&ScraperConfig::default(), None)
        .with_client(client_for(&server))
        .with_catalogue(vec![
            (Category::Fundamentals, vec!["Cooper pair".to_string()]),
            (
                Category::RoomTemp,
                vec![
                    "Room-temperature superconductor".to_string(),
                    "Cooper pair".to_string(),
                ],
            ),
        ]);

    let documents = scraper
        .scrape(&ProgressBar::hidden())
        .await
        .expect("scrape should succeed");

    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].id, "wikipedia_1");
    assert_eq!(documents[0].difficulty_level, DifficultyLevel::INTERMEDIATE);
    assert_eq!(
        documents[0].summary.as_deref(),
        Some("A Cooper pair is a pair of electrons bound together.")
    );
    assert_eq!(documents[1].id, "wikipedia_2");
    assert_eq!(documents[1].focus_area, FocusArea::HotTopic);
    assert_eq!(documents[1].extra.get("category"), Some(&serde_json::json!("room_temp")));
}

#[tokio::test(flavor = "multi_thread")]
async fn simple_wikipedia_skips_short_articles() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("list", "search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "query": { "search": [{ "title": "Superconductor" }, { "title": "Stub" }] }
        })))
        .mount(&server)
        .await;
    mount_page(
        &server,
        "Superconductor",
        page_body(42, "Superconductor", &"electricity flows freely ".repeat(40)),
    )
    .await;
    mount_page(&server, "Stub", page_body(43, "Stub", "Too short."))
        .await;

    let mut scraper = SimpleWikipediaScraper::new(&ScraperConfig::default(), None)
        .with_client(client_for(&server))
        .with_queries(vec!["superconductor".to_string()]);

    let documents = scraper
        .scrape(&ProgressBar::hidden())
        .await
        .expect("scrape should succeed");

    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].id, "simple_wiki_42");
    assert_eq!(documents[0].source, "simple_wikipedia");
    assert_eq!(documents[0].difficulty_level, DifficultyLevel::BEGINNER);
    assert_eq!(documents[0].word_count, 120);
}
