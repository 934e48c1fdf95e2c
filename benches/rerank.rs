use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use supercon_search::corpus::{DifficultyLevel, Document};
use supercon_search::index::IndexedDocument;
use supercon_search::search::{Candidate, rerank};

const TITLES: &[&str] = &[
    "Cuprate superconductor",
    "Meissner effect",
    "BCS theory",
    "Flux pinning in type II superconductors",
    "Iron-based superconductors",
    "Josephson effect",
];

fn indexed_documents(count: usize) -> Vec<IndexedDocument> {
    (0..count)
        .map(|i| {
            let level = DifficultyLevel::ALL[i % DifficultyLevel::ALL.len()];
            let document = Document::new(
                format!("doc_{}", i),
                "wikipedia",
                "encyclopedia",
                TITLES[i % TITLES.len()],
                "",
                "",
                level,
            );
            IndexedDocument::from(&document)
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let documents = indexed_documents(200);
    let candidates: Vec<Candidate<'_>> = documents
        .iter()
        .enumerate()
        .map(|(position, document)| Candidate {
            position,
            raw_score: 1.0 - position as f32 / 400.0,
            document,
        })
        .collect();

    c.bench_function("rerank_implicit_difficulty", |b| {
        b.iter(|| {
            rerank(
                black_box(candidates.clone()),
                black_box("What is the Meissner effect?"),
                None,
                10,
            )
        })
    });

    c.bench_function("rerank_with_filter", |b| {
        b.iter(|| {
            rerank(
                black_box(candidates.clone()),
                black_box("pairing symmetry in cuprate superconductors"),
                Some(DifficultyLevel::EXPERT),
                10,
            )
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
