use super::*;
use crate::corpus::{DifficultyLevel, FocusArea};
use serde_json::json;
use tempfile::TempDir;

fn document(id: &str, source: &str, level: DifficultyLevel, text: &str) -> Document {
    Document::new(id, source, "encyclopedia", id, "", text, level)
}

#[test]
fn stats_breakdowns() {
    let documents = vec![
        document("a", "wikipedia", DifficultyLevel::INTERMEDIATE, "one two three"),
        document("b", "wikipedia", DifficultyLevel::BEGINNER, "one"),
        document("c", "arxiv", DifficultyLevel::EXPERT, "one two").with_focus(FocusArea::HotTopic),
    ];

    let stats = CorpusStats::compute(&documents);
    assert_eq!(stats.total_documents, 3);
    assert_eq!(stats.total_words, 6);
    assert!((stats.average_words_per_doc - 2.0).abs() < f64::EPSILON);
    assert_eq!(stats.source_breakdown.get("wikipedia"), Some(&2));
    assert_eq!(stats.source_breakdown.get("arxiv"), Some(&1));
    assert_eq!(stats.difficulty_breakdown.get(&4), Some(&1));
    assert_eq!(stats.focus_breakdown.get("main"), Some(&2));
    assert_eq!(stats.focus_breakdown.get("hot_topic"), Some(&1));
}

#[test]
fn empty_stats() {
    let stats = CorpusStats::compute(&[]);
    assert_eq!(stats.total_documents, 0);
    assert!(stats.average_words_per_doc.abs() < f64::EPSILON);
}

#[test]
fn duplicate_ids_keep_first() {
    let merged = merge_documents(vec![
        vec![document("a", "wikipedia", DifficultyLevel::BEGINNER, "first")],
        vec![
            document("a", "arxiv", DifficultyLevel::EXPERT, "second"),
            document("b", "arxiv", DifficultyLevel::EXPERT, "third"),
        ],
    ]);

    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].source, "wikipedia");
    assert_eq!(merged[1].id, "b");
}

#[test]
fn merge_files_mixed_shapes() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");

    let list_path = temp_dir.path().join("wikipedia.json");
    std::fs::write(
        &list_path,
        json!([{ "id": "wikipedia_1", "source": "wikipedia", "text": "Cooper pairs form" }])
            .to_string(),
    )
    .expect("should write list file");

    let simple_path = temp_dir.path().join("simple_wikipedia.json");
    std::fs::write(
        &simple_path,
        json!({ "articles": [{ "id": "simple_wiki_1", "title": "Magnet", "content": "A magnet" }] })
            .to_string(),
    )
    .expect("should write articles file");

    let broken_path = temp_dir.path().join("broken.json");
    std::fs::write(&broken_path, "{ not json").expect("should write broken file");

    let paths = raw_files_in(temp_dir.path()).expect("should list raw files");
    assert_eq!(paths.len(), 3);

    let corpus = merge_files(&paths).expect("merge should succeed");
    assert_eq!(corpus.documents.len(), 2);
    assert_eq!(corpus.metadata.total_documents, 2);
    assert_eq!(corpus.metadata.source_files.len(), 2);
    assert_eq!(
        corpus.metadata.source_breakdown.get("simple_wikipedia"),
        Some(&1)
    );
    assert!(corpus.metadata.created_at.is_some());
}

#[test]
fn checkpoint_files_are_not_raw_inputs() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    std::fs::write(temp_dir.path().join("youtube.json"), "[]").expect("should write");
    std::fs::write(temp_dir.path().join("youtube.checkpoint.json"), "{}").expect("should write");
    std::fs::write(temp_dir.path().join("notes.txt"), "x").expect("should write");

    let files = raw_files_in(temp_dir.path()).expect("should list raw files");
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("youtube.json"));
}
