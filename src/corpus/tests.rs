use super::*;
use tempfile::TempDir;

#[test]
fn difficulty_bounds() {
    assert!(DifficultyLevel::new(0).is_none());
    assert!(DifficultyLevel::new(6).is_none());
    assert_eq!(DifficultyLevel::new(4), Some(DifficultyLevel::EXPERT));
    assert_eq!(DifficultyLevel::default().get(), 3);
}

#[test]
fn difficulty_names_and_colors() {
    assert_eq!(DifficultyLevel::BEGINNER.name(), "Beginner");
    assert_eq!(DifficultyLevel::CUTTING_EDGE.name(), "Cutting-edge");
    assert_eq!(DifficultyLevel::BEGINNER.color(), "#d4edda");
    assert_eq!(DifficultyLevel::EXPERT.color(), "#f8d7da");
    assert_eq!(DifficultyLevel::ADVANCED.to_string(), "3 (Advanced)");
}

#[test]
fn difficulty_distance() {
    assert_eq!(
        DifficultyLevel::BEGINNER.distance(DifficultyLevel::EXPERT),
        3
    );
    assert_eq!(
        DifficultyLevel::EXPERT.distance(DifficultyLevel::ADVANCED),
        1
    );
}

#[test]
fn difficulty_serde() {
    let level: DifficultyLevel = serde_json::from_str("2").expect("should parse level");
    assert_eq!(level, DifficultyLevel::INTERMEDIATE);
    assert!(serde_json::from_str::<DifficultyLevel>("7").is_err());
    assert_eq!(
        serde_json::to_string(&DifficultyLevel::EXPERT).expect("should serialize"),
        "4"
    );
}

#[test]
fn focus_labels() {
    assert_eq!(FocusArea::from_label("hot_topic"), FocusArea::HotTopic);
    assert_eq!(FocusArea::from_label("Sub-Focus"), FocusArea::SubFocus);
    assert_eq!(FocusArea::from_label("anything"), FocusArea::Main);
    assert_eq!(
        serde_json::to_string(&FocusArea::SubFocus).expect("should serialize"),
        "\"sub_focus\""
    );
}

#[test]
fn embedding_text_includes_summary() {
    let document = Document::new(
        "wikipedia_1",
        "wikipedia",
        "encyclopedia",
        "Meissner effect",
        "",
        "Expulsion of a magnetic field.",
        DifficultyLevel::INTERMEDIATE,
    );
    assert_eq!(
        document.embedding_text(),
        "Meissner effect. Expulsion of a magnetic field."
    );

    let with_summary = document.with_summary("Field expulsion");
    assert_eq!(
        with_summary.embedding_text(),
        "Meissner effect. Field expulsion. Expulsion of a magnetic field."
    );
}

#[test]
fn blank_summary_is_dropped() {
    let document =
        Document::new("x", "s", "t", "T", "", "body", DifficultyLevel::BEGINNER).with_summary("  ");
    assert!(document.summary.is_none());
}

#[test]
fn document_defaults_when_deserializing() {
    let document: Document =
        serde_json::from_str(r#"{"id": "x", "source": "arxiv", "text": "a b c"}"#)
            .expect("should parse minimal document");
    assert_eq!(document.difficulty_level, DifficultyLevel::ADVANCED);
    assert_eq!(document.focus_area, FocusArea::Main);
    assert_eq!(document.word_count, 0);
}

#[test]
fn corpus_round_trip_on_disk() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let path = temp_dir.path().join("processed").join("corpus.json");

    let documents = vec![
        Document::new(
            "arxiv_1",
            "arxiv",
            "review",
            "Cuprates",
            "https://arxiv.org/abs/1",
            "cuprate review text",
            DifficultyLevel::EXPERT,
        )
        .with_extra("authors", serde_json::json!(["A. Author"])),
    ];
    let corpus = CorpusFile {
        metadata: CorpusStats::compute(&documents),
        documents,
    };

    save_corpus(&path, &corpus).expect("should save corpus");
    let loaded = load_corpus(&path).expect("should load corpus");
    assert_eq!(loaded, corpus);

    let via_loader = load_documents(&path).expect("should load documents");
    assert_eq!(via_loader, corpus.documents);
}

#[test]
fn load_documents_rejects_scalars() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let path = temp_dir.path().join("scalar.json");
    std::fs::write(&path, "42").expect("should write");
    assert!(load_documents(&path).is_err());
}
