// Positive query generation: LLM-written queries per document, or offline
// title templates when no API access is available

#[cfg(test)]
mod tests;

use anyhow::{Context, Result, anyhow};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{PairType, TrainingPair};
use crate::config::LlmConfig;
use crate::corpus::{DifficultyLevel, Document, read_json, write_json};

pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const QUERIES_PER_DOC_BASIC: usize = 10;
pub const QUERIES_PER_DOC_EXPERT: usize = 15;
pub const CHECKPOINT_INTERVAL: usize = 50;

const PREVIEW_CHARS: usize = 1500;
const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// More queries for arXiv papers and expert material
#[inline]
pub fn queries_per_document(document: &Document) -> usize {
    if document.source == "arxiv" || document.difficulty_level >= DifficultyLevel::EXPERT {
        QUERIES_PER_DOC_EXPERT
    } else {
        QUERIES_PER_DOC_BASIC
    }
}

/// Audience and phrasing guidance for one difficulty level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guidance {
    pub audience: &'static str,
    pub language: &'static str,
    pub query_mix: &'static str,
}

impl Guidance {
    #[inline]
    pub fn for_level(level: DifficultyLevel) -> Self {
        match level.get() {
            1 => Self {
                audience: "high school students or curious beginners with no physics background",
                language: "very simple, avoid jargon, explain like teaching a 15-year-old",
                query_mix: "4 short keywords, 3 simple questions, 3 explanatory questions",
            },
            2 => Self {
                audience: "undergraduate physics students or science enthusiasts",
                language: "clear but can use standard physics terms, assume basic physics knowledge",
                query_mix: "3 short keywords, 2 simple questions, 5 detailed questions",
            },
            4 => Self {
                audience: "active researchers in superconductivity",
                language: "highly technical, use research-level terminology and concepts",
                query_mix: "2 keywords, 1 simple question, 12 detailed research-level questions",
            },
            5 => Self {
                audience: "world experts in this specific subfield",
                language: "cutting-edge terminology, assume deep expertise",
                query_mix: "1 keyword, 1 simple question, 13 highly specific research questions",
            },
            _ => Self {
                audience: "physics graduate students or researchers in related fields",
                language: "technical, use specialized terminology, assume strong physics background",
                query_mix: "2 short keywords, 2 simple questions, 6 detailed technical questions",
            },
        }
    }
}

/// Prompt asking for `count` queries that `document` answers best
#[inline]
pub fn build_prompt(document: &Document, count: usize) -> String {
    let level = document.difficulty_level;
    let guidance = Guidance::for_level(level);
    let preview: String = document.text.chars().take(PREVIEW_CHARS).collect();

    let research = if level >= DifficultyLevel::EXPERT {
        "\n   - Research-level: \"Derive...\", \"Calculate...\", \"What is the microscopic mechanism...\""
    } else {
        ""
    };
    let arxiv = if document.source == "arxiv" {
        "\nSPECIFICITY FOR RESEARCH PAPERS:\n\
         - Include specific concepts from the paper\n\
         - Reference the exact phenomena, materials and theories discussed\n\
         - Ask about methodologies, results and implications\n\
         - Make queries that distinguish this paper from similar papers\n"
    } else {
        ""
    };

    format!(
        "You are creating training data for a semantic search engine about superconductivity.

DOCUMENT INFORMATION:
Title: {title}
Source: {source}
Difficulty Level: {level}/5 ({level_name})
Target Audience: {audience}

DOCUMENT EXCERPT (first {preview_chars} chars):
{preview}

YOUR TASK:
Generate {count} diverse search queries that this document would be the BEST answer for.

REQUIREMENTS:
1. Queries MUST be about superconductivity, not generic physics.
   Bad: \"what is force\", \"define resistance\". Good: \"how do Cooper pairs form\", \"BCS theory mechanism\".
2. Query mix: {query_mix}
   - short keywords (1-3 words), e.g. \"meissner effect\", \"critical temperature\"
   - simple questions, e.g. \"what are cooper pairs\"
   - detailed questions, e.g. \"Why does electron-phonon coupling lead to Cooper pair formation?\"
3. Language level: {language}
4. Vary the structure: factual, explanatory, comparative and investigative questions.{research}
{arxiv}
5. Include some broad queries so the document appears for general searches, and some
   specific ones so experts can find it.

OUTPUT FORMAT (JSON only, no markdown):
{{\"queries\": [\"query 1\", \"query 2\", ...]}}

Return ONLY valid JSON with exactly {count} queries.
",
        title = document.title,
        source = document.source,
        level = level.get(),
        level_name = level.name(),
        audience = guidance.audience,
        preview_chars = PREVIEW_CHARS,
        preview = preview,
        count = count,
        query_mix = guidance.query_mix,
        language = guidance.language,
        research = research,
        arxiv = arxiv,
    )
}

#[derive(Debug, Deserialize)]
struct QueryList {
    queries: Vec<String>,
}

/// Read `{"queries": [...]}` from a model reply, tolerating a fenced code block
#[inline]
pub fn parse_query_response(response: &str) -> Result<Vec<String>> {
    let mut body = response.trim();
    if body.starts_with("```") {
        body = body.split("```").nth(1).unwrap_or_default().trim();
        body = body.strip_prefix("json").unwrap_or(body).trim();
    }

    let list: QueryList = serde_json::from_str(body).with_context(|| {
        let preview: String = body.chars().take(200).collect();
        format!("Failed to parse query list from response: {}", preview)
    })?;

    Ok(list
        .queries
        .into_iter()
        .map(|query| query.trim().to_string())
        .filter(|query| !query.is_empty())
        .collect())
}

/// Source of positive queries for a document
pub trait QueryGenerator {
    fn generate(&self, document: &Document, count: usize) -> Result<Vec<String>>;

    fn pair_type(&self) -> PairType;

    /// Pause between documents, used to respect API rate limits
    #[inline]
    fn delay(&self) -> Duration {
        Duration::ZERO
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// Blocking client for the Anthropic Messages API
#[derive(Clone)]
pub struct AnthropicClient {
    api_key: String,
    endpoint: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    request_delay: Duration,
    agent: ureq::Agent,
    retry_attempts: u32,
    backoff_base_ms: u64,
}

impl fmt::Debug for AnthropicClient {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("retry_attempts", &self.retry_attempts)
            .finish_non_exhaustive()
    }
}

impl AnthropicClient {
    /// Client using the key from `ANTHROPIC_API_KEY`
    #[inline]
    pub fn from_env(config: &LlmConfig) -> Result<Self> {
        Self::new(std::env::var(API_KEY_ENV).ok(), config)
    }

    #[inline]
    pub fn new(api_key: Option<String>, config: &LlmConfig) -> Result<Self> {
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| anyhow!("{} is not set; export it or use --offline", API_KEY_ENV))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            api_key,
            endpoint: format!("{}/v1/messages", config.api_url.trim_end_matches('/')),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            request_delay: Duration::from_millis(config.request_delay_ms),
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff_base_ms: 1000,
        })
    }

    #[inline]
    #[must_use]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Base delay before the first retry; doubles on each further attempt
    #[inline]
    #[must_use]
    pub fn with_backoff(mut self, base: Duration) -> Self {
        self.backoff_base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one user message and return the text of the first content block
    #[inline]
    pub fn complete(&self, prompt: &str) -> Result<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize messages request")?;

        let response_text = self.make_request_with_retry(|| {
            self.agent
                .post(self.endpoint.as_str())
                .header("x-api-key", self.api_key.as_str())
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .send(request_json.as_str())
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let response: MessagesResponse =
            serde_json::from_str(&response_text).context("Failed to parse messages response")?;
        response
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or_else(|| anyhow!("Messages response contained no content"))
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("Messages request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => return Ok(response_text),
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) if *status == 429 || *status >= 500 => {
                            warn!(
                                "API returned status {}, attempt {}/{}",
                                status, attempt, self.retry_attempts
                            );
                            true
                        }
                        ureq::Error::StatusCode(status) => {
                            return Err(anyhow!("Client error: HTTP {}", status));
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => false,
                    };

                    if !should_retry {
                        return Err(anyhow!("Non-retryable error: {}", error));
                    }

                    last_error = Some(anyhow!("Request error: {}", error));

                    if attempt < self.retry_attempts {
                        let delay_ms =
                            EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * self.backoff_base_ms;
                        std::thread::sleep(Duration::from_millis(delay_ms));
                    }
                }
            }
        }

        error!("All retry attempts failed for {}", self.endpoint);
        Err(last_error.unwrap_or_else(|| anyhow!("Request failed after retries")))
    }
}

impl QueryGenerator for AnthropicClient {
    #[inline]
    fn generate(&self, document: &Document, count: usize) -> Result<Vec<String>> {
        let reply = self.complete(&build_prompt(document, count))?;
        let queries = parse_query_response(&reply)?;
        if queries.len() != count {
            debug!(
                "Expected {} queries for {}, got {}",
                count,
                document.id,
                queries.len()
            );
        }
        Ok(queries)
    }

    #[inline]
    fn pair_type(&self) -> PairType {
        PairType::LlmGeneratedPositive
    }

    #[inline]
    fn delay(&self) -> Duration {
        self.request_delay
    }
}

/// Title-driven queries shaped by the document's difficulty
#[inline]
pub fn template_queries(document: &Document) -> Vec<String> {
    let topic = document.title.trim().to_lowercase();
    if topic.is_empty() {
        return Vec::new();
    }

    let mut queries = vec![topic.clone(), format!("what is {}", topic)];
    match document.difficulty_level.get() {
        1 | 2 => {
            queries.push(format!("{} explained simply", topic));
            queries.push(format!("{} for beginners", topic));
            queries.push(format!("how does {} work", topic));
        }
        3 => {
            queries.push(format!("{} theory", topic));
            queries.push(format!("{} in superconductors", topic));
            queries.push(format!("how does {} work", topic));
        }
        _ => {
            queries.push(format!("{} mechanism", topic));
            queries.push(format!("recent research on {}", topic));
            queries.push(format!("{} experimental results", topic));
        }
    }

    let mut seen = HashSet::new();
    queries.retain(|query| seen.insert(query.clone()));
    queries
}

/// Offline generator built on [`template_queries`]
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateGenerator;

impl QueryGenerator for TemplateGenerator {
    #[inline]
    fn generate(&self, document: &Document, count: usize) -> Result<Vec<String>> {
        let mut queries = template_queries(document);
        queries.truncate(count);
        Ok(queries)
    }

    #[inline]
    fn pair_type(&self) -> PairType {
        PairType::TemplatePositive
    }
}

/// Progress saved every [`CHECKPOINT_INTERVAL`] documents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCheckpoint {
    pub documents_processed: usize,
    pub failures: usize,
    pub pairs: Vec<TrainingPair>,
}

#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    /// Process only the first `limit` documents
    pub limit: Option<usize>,
    pub checkpoint_path: Option<PathBuf>,
    /// Continue from the checkpoint when one exists
    pub resume: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationReport {
    pub pairs: Vec<TrainingPair>,
    pub documents_processed: usize,
    pub failures: usize,
}

/// Checkpoint file kept next to the queries output
#[inline]
pub fn checkpoint_path_for(output: &Path) -> PathBuf {
    output.with_extension("checkpoint.json")
}

fn load_checkpoint(path: &Path) -> Result<Option<QueryCheckpoint>> {
    if !path.exists() {
        return Ok(None);
    }
    read_json(path).map(Some)
}

/// Generate positive pairs for each document in order. A document whose
/// generation fails is logged and skipped; the pairs inherit its difficulty.
#[inline]
pub fn generate_pairs(
    documents: &[Document],
    generator: &dyn QueryGenerator,
    options: &GenerationOptions,
    progress: &ProgressBar,
) -> Result<GenerationReport> {
    let documents = match options.limit {
        Some(limit) => &documents[..limit.min(documents.len())],
        None => documents,
    };

    let mut state = QueryCheckpoint::default();
    if options.resume {
        if let Some(path) = &options.checkpoint_path {
            if let Some(checkpoint) = load_checkpoint(path)? {
                info!(
                    "Resuming after {} documents ({} pairs)",
                    checkpoint.documents_processed,
                    checkpoint.pairs.len()
                );
                state = checkpoint;
            }
        }
    }

    progress.set_length(documents.len() as u64);
    progress.set_position(state.documents_processed.min(documents.len()) as u64);

    let pending = documents.iter().enumerate().skip(state.documents_processed);
    let last = documents.len().saturating_sub(1);
    for (position, document) in pending {
        let count = queries_per_document(document);
        match generator.generate(document, count) {
            Ok(queries) if !queries.is_empty() => {
                state.pairs.extend(
                    queries
                        .into_iter()
                        .map(|query| TrainingPair::positive(query, document, generator.pair_type())),
                );
            }
            Ok(_) => {
                warn!("No queries generated for {}", document.id);
                state.failures += 1;
            }
            Err(e) => {
                warn!("Query generation failed for {}: {:#}", document.id, e);
                state.failures += 1;
            }
        }
        state.documents_processed = position + 1;
        progress.inc(1);

        if state.documents_processed % CHECKPOINT_INTERVAL == 0 {
            if let Some(path) = &options.checkpoint_path {
                write_json(path, &state)?;
                debug!("Checkpoint saved after {} documents", state.documents_processed);
            }
        }

        let delay = generator.delay();
        if position < last && !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }

    if let Some(path) = &options.checkpoint_path {
        if path.exists() {
            fs::remove_file(path)
                .with_context(|| format!("Failed to remove checkpoint {}", path.display()))?;
        }
    }

    info!(
        "Generated {} queries for {} documents ({} failures)",
        state.pairs.len(),
        state.documents_processed,
        state.failures
    );

    Ok(GenerationReport {
        pairs: state.pairs,
        documents_processed: state.documents_processed,
        failures: state.failures,
    })
}
