use super::*;

fn form(query: &str) -> FormValues<'_> {
    FormValues {
        query,
        difficulty: None,
        num_results: 10,
        min_results: 5,
        max_results: 20,
    }
}

fn result(title: &str, level: DifficultyLevel) -> SearchResult {
    SearchResult {
        rank: 1,
        score: 0.875,
        raw_score: 0.5,
        doc_id: "d1".to_string(),
        title: title.to_string(),
        url: "https://example.org/?a=1&b=2".to_string(),
        source: "wikipedia".to_string(),
        difficulty_level: level,
        word_count: 321,
    }
}

#[test]
fn escapes_markup() {
    assert_eq!(
        html_escape(r#"<script>alert("x") & 'y'</script>"#),
        "&lt;script&gt;alert(&quot;x&quot;) &amp; &#39;y&#39;&lt;/script&gt;"
    );
}

#[test]
fn form_echoes_escaped_query_and_selection() {
    let mut values = form("\"><b>cooper</b>");
    values.difficulty = Some(DifficultyLevel::EXPERT);
    let html = render_page(&values, PageBody::Empty);

    assert!(html.contains("value=\"&quot;&gt;&lt;b&gt;cooper&lt;/b&gt;\""));
    assert!(!html.contains("<b>cooper</b>"));
    assert!(html.contains("<option value=\"4\" selected>4 (Expert)</option>"));
    assert!(html.contains("<option value=\"all\">All levels</option>"));
    assert!(html.contains("min=\"5\" max=\"20\" value=\"10\""));
}

#[test]
fn cards_are_coloured_by_difficulty() {
    let results = vec![result("Meissner <effect>", DifficultyLevel::BEGINNER)];
    let html = render_page(
        &form("meissner"),
        PageBody::Results {
            results: &results,
            query_difficulty: DifficultyLevel::INTERMEDIATE,
        },
    );

    assert!(html.contains("background:#d4edda"));
    assert!(html.contains("Meissner &lt;effect&gt;"));
    assert!(html.contains("href=\"https://example.org/?a=1&amp;b=2\""));
    assert!(html.contains("Score 0.875"));
    assert!(html.contains("321 words"));
    assert!(html.contains("Detected query level: 2 (Intermediate)"));
}

#[test]
fn messages_are_escaped() {
    let html = render_page(&form(""), PageBody::Message("<nothing> found"));
    assert!(html.contains("<div class=\"message\">&lt;nothing&gt; found</div>"));
}

#[test]
fn only_web_links_are_clickable() {
    let mut script = result("Injected", DifficultyLevel::ADVANCED);
    script.url = "javascript:alert(1)".to_string();
    let mut relative = result("Relative", DifficultyLevel::ADVANCED);
    relative.url = "/wiki/Flux_pinning".to_string();
    let results = vec![script, relative, result("Linked", DifficultyLevel::ADVANCED)];

    let html = render_page(
        &form("flux"),
        PageBody::Results {
            results: &results,
            query_difficulty: DifficultyLevel::ADVANCED,
        },
    );

    assert!(!html.contains("javascript:"));
    assert!(!html.contains("/wiki/Flux_pinning"));
    assert_eq!(html.matches("<a href=\"#\">").count(), 2);
    assert!(html.contains("<a href=\"https://example.org/?a=1&amp;b=2\">Linked</a>"));
}
