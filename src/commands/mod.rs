// Subcommand bodies: each pipeline stage reads and writes files under the data directory


use anyhow::{Context, Result, anyhow, bail};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::corpus::merge::raw_files_in;
use crate::corpus::{
    DifficultyLevel, Document, load_corpus, load_documents, merge_files, read_json, save_corpus,
};
use crate::embeddings::{Embedder, OllamaClient};
use crate::evaluate::{evaluate, load_eval_examples};
use crate::index::{self, IndexMetadata, SearchIndex, build_index};
use crate::scrapers::{Source, run_scraper, scraper_for};
use crate::search::{NO_RESULTS_MESSAGE, SearchEngine, SearchRequest, SearchResponse};
use crate::training::dataset::{DatasetMetadata, EVAL_FILE, METADATA_FILE, prepare_dataset};
use crate::training::queries::{
    AnthropicClient, GenerationOptions, QueryGenerator, TemplateGenerator, checkpoint_path_for,
    generate_pairs,
};
use crate::training::{PairCounts, load_pairs, refine_pairs, save_pairs};

const SUGGESTED_QUERIES: &[(&str, &[&str])] = &[
    (
        "Generic",
        &["what is superconductivity", "cooper pairs", "BCS theory"],
    ),
    (
        "Material-specific",
        &["iron-based superconductors", "cuprate superconductors", "MgB2 superconductor"],
    ),
    (
        "Phenomena",
        &["meissner effect", "flux pinning", "quantum levitation"],
    ),
    (
        "People",
        &["Brian Josephson contributions", "who discovered BCS theory"],
    ),
];

/// Progress bar with a known length, hidden when stderr is not a terminal
#[inline]
pub fn counting_bar(label: &str) -> ProgressBar {
    if console::user_attended_stderr() {
        ProgressBar::new(0).with_style(
            ProgressStyle::with_template(&format!(
                "{} [{{bar:40}}] {{pos}}/{{len}} ({{eta}})",
                label
            ))
            .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    }
}

/// Run one scraper, or every scraper in order when no source is given
#[inline]
pub async fn scrape(config: &Config, source: Option<Source>, limit: Option<usize>) -> Result<()> {
    let sources = source.map_or_else(|| Source::ALL.to_vec(), |source| vec![source]);
    let output_dir = config.raw_dir();

    let mut failures = 0;
    for source in &sources {
        let outcome = match scraper_for(*source, config, limit) {
            Ok(mut scraper) => run_scraper(scraper.as_mut(), &output_dir).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(summary) => println!(
                "{} {}: {} documents, {} words -> {}",
                style("✓").green(),
                summary.source,
                summary.documents,
                summary.total_words,
                summary.output.display()
            ),
            Err(e) if sources.len() > 1 => {
                error!("Skipping {}: {:#}", source, e);
                failures += 1;
            }
            Err(e) => return Err(e),
        }
    }

    if failures == sources.len() {
        bail!("Every scraper failed");
    }
    Ok(())
}

/// Merge raw files (all of `raw/` by default) into the corpus
#[inline]
pub fn merge(config: &Config, inputs: &[PathBuf]) -> Result<()> {
    let paths = if inputs.is_empty() {
        let raw_dir = config.raw_dir();
        raw_files_in(&raw_dir).with_context(|| {
            format!(
                "No raw data at {}; run `scrape` first",
                raw_dir.display()
            )
        })?
    } else {
        inputs.to_vec()
    };
    if paths.is_empty() {
        bail!("No raw files to merge");
    }

    let corpus = merge_files(&paths)?;
    if corpus.documents.is_empty() {
        bail!("None of the {} input files contained documents", paths.len());
    }

    let output = config.corpus_path();
    save_corpus(&output, &corpus)?;

    let stats = &corpus.metadata;
    println!(
        "{} Merged {} documents ({} words) into {}",
        style("✓").green(),
        stats.total_documents,
        stats.total_words,
        output.display()
    );
    for (source, count) in &stats.source_breakdown {
        println!("  {:<18} {}", source, count);
    }
    for (level, count) in &stats.difficulty_breakdown {
        let label = DifficultyLevel::new(*level).map_or_else(|| level.to_string(), |l| l.to_string());
        println!("  {:<18} {}", label, count);
    }
    Ok(())
}

fn load_corpus_documents(config: &Config) -> Result<Vec<Document>> {
    let path = config.corpus_path();
    if !path.exists() {
        bail!("Corpus not found at {}; run `merge` first", path.display());
    }
    load_documents(&path)
}

/// Generate positive pairs with the LLM client, or from templates when offline
#[inline]
pub fn queries(config: &Config, offline: bool, limit: Option<usize>, resume: bool) -> Result<()> {
    let documents = load_corpus_documents(config)?;
    let output = config.queries_path();

    let generator: Box<dyn QueryGenerator> = if offline {
        info!("Generating template queries for {} documents", documents.len());
        Box::new(TemplateGenerator)
    } else {
        Box::new(AnthropicClient::from_env(&config.llm)?)
    };

    let options = GenerationOptions {
        limit,
        checkpoint_path: Some(checkpoint_path_for(&output)),
        resume,
    };
    let bar = counting_bar("Generating queries");
    let report = generate_pairs(&documents, generator.as_ref(), &options, &bar)?;
    bar.finish_and_clear();

    save_pairs(&output, &report.pairs)?;
    println!(
        "{} {} from {} documents ({} failed) -> {}",
        style("✓").green(),
        PairCounts::of(&report.pairs),
        report.documents_processed,
        report.failures,
        output.display()
    );
    Ok(())
}

/// Mine hard negatives and run every filtering stage over the generated queries
#[inline]
pub fn pairs(config: &Config, seed: u64) -> Result<()> {
    let documents = load_corpus_documents(config)?;
    let input = config.queries_path();
    if !input.exists() {
        bail!("Queries not found at {}; run `queries` first", input.display());
    }
    let positives = load_pairs(&input)?;

    let (pairs, report) = refine_pairs(&positives, &documents, seed);
    let output = config.pairs_path();
    save_pairs(&output, &pairs)?;

    println!("{}", style("Pair refinement").bold().cyan());
    println!("  Input:                   {}", report.input);
    println!("  With hard negatives:     {}", report.with_negatives);
    println!("  Generic bio positives:   -{}", report.generic_bio_positives_removed);
    println!("  Weak positives:          -{}", report.weak_positives_removed);
    println!("  Low quality:             -{}", report.low_quality_removed);
    println!("  Duplicates:              -{}", report.duplicates_removed);
    println!("  Off topic:               -{}", report.off_topic_removed);
    println!("  Output:                  {}", report.output);
    println!("{} Saved to {}", style("✓").green(), output.display());
    Ok(())
}

/// Verify and export the training dataset with its evaluation split
#[inline]
pub fn dataset(config: &Config, seed: u64) -> Result<()> {
    let documents = load_corpus_documents(config)?;
    let input = config.pairs_path();
    if !input.exists() {
        bail!("Pairs not found at {}; run `pairs` first", input.display());
    }
    let pairs = load_pairs(&input)?;

    let summary = prepare_dataset(&pairs, &documents, &config.training_dir(), seed)?;
    let metadata = &summary.metadata;
    let report = &metadata.report;

    println!("{}", style("Dataset").bold().cyan());
    println!(
        "  Training examples: {} ({} with negatives)",
        metadata.training_examples, metadata.examples_with_negatives
    );
    println!("  Unique queries:    {}", metadata.unique_queries);
    println!("  Eval queries:      {}", metadata.eval_queries);
    println!(
        "  Documents:         {} ({} without pairs)",
        metadata.total_documents, summary.integrity.documents_without_pairs
    );
    if report.is_clean() {
        println!("  Quality:           {}", style("clean").green());
    } else {
        println!(
            "  Quality:           {} empty texts, {} duplicate ids, {} duplicate pairs",
            style(report.empty_texts).yellow(),
            style(report.duplicate_document_ids).yellow(),
            style(report.duplicate_pairs).yellow()
        );
    }
    if report.tangential_positives > 0 {
        println!("  Tangential positives: {}", report.tangential_positives);
    }
    println!("{} Written to {}", style("✓").green(), summary.output_dir.display());
    Ok(())
}

fn embedding_client(config: &Config) -> Result<Arc<OllamaClient>> {
    let client = OllamaClient::new(&config.embedding).context("Failed to create embedding client")?;
    client.health_check().with_context(|| {
        format!(
            "Embedding server is not ready; check `{} config --show`",
            env!("CARGO_PKG_NAME")
        )
    })?;
    Ok(Arc::new(client))
}

/// Encode the corpus and persist the index
#[inline]
pub fn build_search_index(config: &Config) -> Result<()> {
    let start_time = Instant::now();
    let documents = load_corpus_documents(config)?;
    let client = embedding_client(config)?;

    let bar = counting_bar("Encoding");
    let corpus_path = config.corpus_path();
    let index = build_index(
        &documents,
        client.as_ref(),
        config.embedding.batch_size as usize,
        Some(&corpus_path),
        &bar,
    )?;
    bar.finish_and_clear();

    let index_dir = config.index_dir();
    index.save(&index_dir)?;

    println!(
        "{} Indexed {} documents ({}-dim, {}) in {:.1}s -> {}",
        style("✓").green(),
        index.len(),
        index.dimension(),
        client.model_name(),
        start_time.elapsed().as_secs_f64(),
        index_dir.display()
    );
    Ok(())
}

/// Load the persisted index and connect the embedding client
#[inline]
pub fn load_engine(config: &Config) -> Result<SearchEngine> {
    let index_dir = config.index_dir();
    let client = embedding_client(config)?;
    let index = SearchIndex::load(&index_dir, Some(client.dimension())).with_context(|| {
        format!(
            "Failed to load the index from {}; run `build-index` first",
            index_dir.display()
        )
    })?;
    if index.metadata().model != client.model_name() {
        warn!(
            "Index was built with {} but queries will be encoded with {}",
            index.metadata().model,
            client.model_name()
        );
    }
    Ok(SearchEngine::new(index, client, config.search.clone())?)
}

/// Plain-text result listing shared by one-shot and interactive search
#[inline]
pub fn format_results(query: &str, response: &SearchResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Query: \"{}\" (detected level: {})", query, response.query_difficulty);
    if response.results.is_empty() {
        let _ = writeln!(out, "{}", NO_RESULTS_MESSAGE);
        return out;
    }

    for result in &response.results {
        let _ = writeln!(
            out,
            "{:>2}. [{:.4}] {}",
            result.rank, result.score, result.title
        );
        let _ = writeln!(
            out,
            "    {} | {} | {} words",
            result.source, result.difficulty_level, result.word_count
        );
        if !result.url.is_empty() {
            let _ = writeln!(out, "    {}", result.url);
        }
    }

    let sources = response
        .results
        .iter()
        .counts_by(|result| result.source.as_str())
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
        .map(|(source, count)| format!("{} {}", source, count))
        .join(", ");
    let _ = writeln!(out, "Sources: {}", sources);
    out
}

/// Run one query and print the ranked results
#[inline]
pub fn search_once(
    engine: &SearchEngine,
    query: &str,
    num_results: Option<usize>,
    difficulty: Option<DifficultyLevel>,
) -> Result<()> {
    let config = engine.config();
    let num_results = config.clamp_results(num_results.unwrap_or(config.default_results));
    let request = SearchRequest::new(query, num_results).with_difficulty(difficulty);
    let response = engine.search(&request)?;
    print!("{}", format_results(query, &response));
    Ok(())
}

/// One line typed at the interactive prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptInput {
    Quit,
    Help,
    Blank,
    SetResults(usize),
    Search(String),
}

impl PromptInput {
    #[inline]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Blank;
        }
        match line.to_lowercase().as_str() {
            "quit" | "exit" | "q" => return Self::Quit,
            "help" => return Self::Help,
            _ => {}
        }
        if line.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(count) = line.parse() {
                return Self::SetResults(count);
            }
        }
        Self::Search(line.to_string())
    }
}

fn print_help() {
    println!();
    println!("{}", style("Suggested queries to try:").bold());
    for (group, queries) in SUGGESTED_QUERIES {
        println!("  {}:", style(group).yellow());
        for query in *queries {
            println!("    - {}", query);
        }
    }
    println!();
}

/// Prompt loop until `quit`; errors for one query are printed and the loop continues
#[inline]
pub fn interactive_search(engine: &SearchEngine, difficulty: Option<DifficultyLevel>) -> Result<()> {
    println!("{}", style("Superconductivity Search - interactive mode").bold().cyan());
    println!(
        "{} documents indexed with {} ({}-dim)",
        engine.index().len(),
        engine.model_name(),
        engine.index().dimension()
    );
    println!("Type a query, a number to change the result count, 'help' for ideas or 'quit' to exit.");

    let config = engine.config();
    let mut num_results = config.default_results;

    loop {
        let line: String = Input::new()
            .with_prompt("Search")
            .allow_empty(true)
            .interact_text()
            .map_err(|e| anyhow!("Failed to read input: {}", e))?;

        match PromptInput::parse(&line) {
            PromptInput::Quit => break,
            PromptInput::Help => print_help(),
            PromptInput::Blank => {}
            PromptInput::SetResults(requested) => {
                num_results = config.clamp_results(requested);
                if num_results != requested {
                    println!(
                        "Result count must be between {} and {}",
                        config.min_results, config.max_results
                    );
                }
                println!("{} Now showing {} results per query", style("✓").green(), num_results);
            }
            PromptInput::Search(query) => {
                let request = SearchRequest::new(query.clone(), num_results).with_difficulty(difficulty);
                match engine.search(&request) {
                    Ok(response) => println!("{}", format_results(&query, &response)),
                    Err(e) => eprintln!("{} {:#}", style("Error:").red(), e),
                }
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

/// Serve the web UI until interrupted
#[inline]
pub async fn serve(config: &Config, port: Option<u16>) -> Result<()> {
    let mut address = config.server.socket_address()?;
    if let Some(port) = port {
        address.set_port(port);
    }

    let loader_config = config.clone();
    let engine = tokio::task::spawn_blocking(move || load_engine(&loader_config))
        .await
        .context("Engine loading task failed")??;

    println!(
        "{} Serving {} documents at {}",
        style("✓").green(),
        engine.index().len(),
        style(format!("http://{}", address)).cyan()
    );

    tokio::select! {
        result = crate::web::serve(engine, address) => result,
        _ = tokio::signal::ctrl_c() => {
            println!("Shutting down");
            Ok(())
        }
    }
}

/// Score the served model on the held-out queries
#[inline]
pub fn run_evaluation(config: &Config, k: usize) -> Result<()> {
    let examples = load_eval_examples(&config.training_dir().join(EVAL_FILE))?;
    let engine = load_engine(config)?;
    let report = evaluate(&engine, &examples, k)?;
    print!("{}", report);
    Ok(())
}

fn describe_file(label: &str, path: &Path, detail: Result<String>) {
    if !path.exists() {
        println!("  {:<10} {}", label, style("missing").red());
        return;
    }
    match detail {
        Ok(detail) => println!("  {:<10} {} ({})", label, style("present").green(), detail),
        Err(e) => println!("  {:<10} {} ({:#})", label, style("unreadable").yellow(), e),
    }
}

/// Print which pipeline outputs exist and their sizes
#[inline]
pub fn show_status(config: &Config) -> Result<()> {
    println!("{}", style("Pipeline status").bold().cyan());
    println!("  Data directory: {}", config.get_base_dir().display());
    println!();

    let raw_dir = config.raw_dir();
    let raw_files = if raw_dir.exists() {
        raw_files_in(&raw_dir)?
    } else {
        Vec::new()
    };
    println!("  {:<10} {} files", "Raw", raw_files.len());
    for path in &raw_files {
        let count = load_documents(path).map_or_else(|_| "unreadable".to_string(), |d| d.len().to_string());
        println!(
            "    {:<28} {}",
            path.file_name()
                .map_or_else(String::new, |name| name.to_string_lossy().into_owned()),
            count
        );
    }

    let corpus_path = config.corpus_path();
    describe_file(
        "Corpus",
        &corpus_path,
        load_corpus(&corpus_path).map(|c| format!("{} documents", c.documents.len())),
    );

    for (label, path) in [("Queries", config.queries_path()), ("Pairs", config.pairs_path())] {
        let detail = if path.exists() {
            load_pairs(&path).map(|pairs| PairCounts::of(&pairs).to_string())
        } else {
            Ok(String::new())
        };
        describe_file(label, &path, detail);
    }

    let dataset_path = config.training_dir().join(METADATA_FILE);
    describe_file(
        "Dataset",
        &dataset_path,
        read_json::<DatasetMetadata>(&dataset_path).map(|m| {
            format!(
                "{} examples, {} eval queries",
                m.training_examples, m.eval_queries
            )
        }),
    );

    let index_metadata_path = config.index_dir().join(index::METADATA_FILE);
    describe_file(
        "Index",
        &index_metadata_path,
        read_json::<IndexMetadata>(&index_metadata_path).map(|m| {
            format!(
                "{} documents, {}-dim, {}, built {}",
                m.num_documents,
                m.embedding_dim,
                m.model,
                m.created_at.format("%Y-%m-%d %H:%M")
            )
        }),
    );

    Ok(())
}
