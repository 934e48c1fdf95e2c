use super::*;
use serde_json::json;

#[test]
fn flat_document() {
    let value = json!({
        "id": "wikipedia_1",
        "source": "wikipedia",
        "type": "encyclopedia",
        "title": "Superconductivity",
        "url": "https://en.wikipedia.org/wiki/Superconductivity",
        "content": "Superconductivity is a set of physical properties.",
        "summary": "A set of physical properties",
        "difficulty_level": 2,
        "focus_area": "main",
        "category": "fundamentals"
    });

    let document = normalize_document(&value).expect("document should normalize");
    assert_eq!(document.id, "wikipedia_1");
    assert_eq!(document.doc_type, "encyclopedia");
    assert_eq!(document.text, "Superconductivity is a set of physical properties.");
    assert_eq!(document.summary.as_deref(), Some("A set of physical properties"));
    assert_eq!(document.difficulty_level, DifficultyLevel::INTERMEDIATE);
    assert_eq!(document.word_count, 7);
    assert_eq!(document.extra.get("category"), Some(&json!("fundamentals")));
}

#[test]
fn nested_video_document() {
    let value = json!({
        "id": "youtube_abc123",
        "source": "youtube",
        "type": "video",
        "content": {
            "title": "Superconductors Explained",
            "transcript": "today we talk about cooper pairs and zero resistance",
            "url": "https://www.youtube.com/watch?v=abc123"
        },
        "categorization": { "focus_type": "hot_topic" },
        "quality_metrics": { "word_count": 9, "difficulty_level": 1 }
    });

    let document = normalize_document(&value).expect("document should normalize");
    assert_eq!(document.title, "Superconductors Explained");
    assert_eq!(document.url, "https://www.youtube.com/watch?v=abc123");
    assert!(document.text.starts_with("today we talk"));
    assert_eq!(document.focus_area, FocusArea::HotTopic);
    assert_eq!(document.difficulty_level, DifficultyLevel::BEGINNER);
    assert_eq!(document.word_count, 9);
    assert!(!document.extra.contains_key("content"));
}

#[test]
fn nested_full_text_document() {
    let value = json!({
        "id": "arxiv_2301.00001",
        "source": "arxiv",
        "content": { "title": "Nickelates", "full_text": "Infinite-layer nickelate films" }
    });

    let document = normalize_document(&value).expect("document should normalize");
    assert_eq!(document.text, "Infinite-layer nickelate films");
    assert_eq!(document.difficulty_level, DifficultyLevel::ADVANCED);
    assert_eq!(document.word_count, 3);
}

#[test]
fn missing_id_or_text_is_skipped() {
    assert!(normalize_document(&json!({ "title": "No id", "text": "body" })).is_none());
    assert!(normalize_document(&json!({ "id": "x", "text": "   " })).is_none());
    assert!(normalize_document(&json!("not an object")).is_none());
}

#[test]
fn out_of_range_difficulty_uses_default() {
    let value = json!({ "id": 7, "text": "body text", "difficulty_level": 9 });
    let document = normalize_document(&value).expect("document should normalize");
    assert_eq!(document.id, "7");
    assert_eq!(document.difficulty_level, DifficultyLevel::default());
    assert_eq!(document.source, "unknown");
}

#[test]
fn container_shapes() {
    let list = json!([
        { "id": "a", "text": "first" },
        { "id": "b", "text": "second" }
    ]);
    assert_eq!(documents_from_value(list).len(), 2);

    let wrapped = json!({
        "metadata": { "total_documents": 1 },
        "documents": [{ "id": "c", "text": "third" }]
    });
    assert_eq!(documents_from_value(wrapped).len(), 1);

    assert!(documents_from_value(json!({ "unexpected": [] })).is_empty());
    assert!(documents_from_value(json!(42)).is_empty());
}

#[test]
fn simple_wikipedia_articles() {
    let export = json!({
        "metadata": { "scrape_date": "2025-10-31" },
        "articles": [
            {
                "id": "simple_wiki_42",
                "title": "Superconductor",
                "content": "A superconductor is a material with no resistance.",
                "url": "https://simple.wikipedia.org/wiki/Superconductor",
                "categories": ["Physics"]
            },
            { "pageid": 99, "title": "Magnet", "content": "A magnet makes a magnetic field." },
            { "title": "Empty", "content": "" }
        ]
    });

    let documents = documents_from_value(export);
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].source, "simple_wikipedia");
    assert_eq!(documents[0].doc_type, "encyclopedia");
    assert_eq!(documents[0].difficulty_level, DifficultyLevel::BEGINNER);
    assert_eq!(documents[0].extra.get("categories"), Some(&json!(["Physics"])));
    assert_eq!(documents[1].id, "simple_wiki_99");
}
