use super::*;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

fn fast_http() -> HttpClient {
    HttpClient::new(HttpClientConfig {
        min_interval: Duration::from_millis(0),
        max_retries: 0,
        ..HttpClientConfig::default()
    })
}

fn lecture_page(words: usize) -> String {
    format!(
        "<html><body><nav>Menu Home Courses</nav><main><h1>Notes</h1><p>{}</p></main><footer>MIT</footer></body></html>",
        "superconducting gap ".repeat(words / 2)
    )
}

#[test]
fn links_are_classified_by_anchor_text() {
    assert_eq!(classify_link("Lecture Notes"), Some(LinkKind::Lecture));
    assert_eq!(classify_link("Course notes part 2"), Some(LinkKind::Lecture));
    assert_eq!(classify_link("Readings"), Some(LinkKind::Reading));
    assert_eq!(classify_link("Problem Sets"), Some(LinkKind::Assignment));
    assert_eq!(classify_link("Pset 3"), Some(LinkKind::Assignment));
    assert_eq!(classify_link("Final Exam"), Some(LinkKind::Exam));
    assert_eq!(classify_link("Syllabus"), None);
}

#[test]
fn course_structure_groups_and_dedupes_links() {
    let html = r##"<html><body>
        <a href="pages/lecture-notes/">Lecture Notes</a>
        <a href="/courses/x/pages/lecture-notes/">lecture notes (again)</a>
        <a href="pages/readings/">Readings</a>
        <a href="pages/assignments/">Assignments</a>
        <a href="pages/exams/">Exams</a>
        <a href="#top">Lecture anchor</a>
        <a href="pages/syllabus/">Syllabus</a>
    </body></html>"##;
    let base = Url::parse("https://ocw.mit.edu/courses/x/").expect("valid url");

    let structure = parse_course_structure(html, &base);
    assert_eq!(structure.lectures.len(), 1);
    assert_eq!(
        structure.lectures[0].url.as_str(),
        "https://ocw.mit.edu/courses/x/pages/lecture-notes/"
    );
    assert_eq!(structure.readings.len(), 1);
    assert_eq!(structure.assignments.len(), 1);
    assert_eq!(structure.exams.len(), 1);
    assert!(!structure.is_empty());
}

#[test]
fn catalogue_starts_with_the_superconductivity_course_after_sorting() {
    let mut courses = default_courses();
    courses.sort_by_key(|course| course.priority);
    assert_eq!(courses[0].code, "6.763");
    assert!(courses.iter().any(|course| course.focus == FocusArea::SubFocus));
}

#[tokio::test(flavor = "multi_thread")]
async fn scraper_builds_lecture_and_reading_documents() {
    let server = MockServer::start().await;
    let course_home = format!(
        r#"<html><body>
            <a href="{0}/courses/sc/lec1">Lecture 1 notes</a>
            <a href="{0}/courses/sc/lec2">Lecture 2 notes</a>
            <a href="{0}/courses/sc/read1">Reading list</a>
        </body></html>"#,
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/courses/sc/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(course_home))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/courses/sc/lec1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(lecture_page(80)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/courses/sc/lec2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(lecture_page(10)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/courses/sc/read1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(lecture_page(60)))
        .mount(&server)
        .await;

    let mut scraper = OcwScraper::new(&ScraperConfig::default(), None)
        .with_http(fast_http())
        .with_courses(vec![Course::new(
            &format!("{}/courses/sc/", server.uri()),
            "6.763",
            "Applied Superconductivity",
            FocusArea::Main,
            Priority::Critical,
        )]);

    let documents = scraper
        .scrape(&ProgressBar::hidden())
        .await
        .expect("scrape should succeed");

    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].id, "mit_ocw_6.763_1");
    assert_eq!(documents[0].doc_type, "lecture_notes");
    assert_eq!(documents[0].difficulty_level, DifficultyLevel::ADVANCED);
    assert!(!documents[0].text.contains("Menu"));
    assert_eq!(documents[1].id, "mit_ocw_6.763_reading_1");
    assert_eq!(documents[1].doc_type, "reading");
    assert_eq!(documents[1].extra.get("institution"), Some(&serde_json::json!("MIT")));
}
