// YouTube Data API v3 search with timed-text transcripts


use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use fancy_regex::Regex;
use indicatif::ProgressBar;
use scraper::Html;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::html::{collapse_whitespace, element_text, selector};
use super::http::{HttpClient, HttpClientConfig, status_code};
use super::{Scraper, limit_reached};
use crate::config::ScraperConfig;
use crate::corpus::{DifficultyLevel, Document, FocusArea, read_json, write_json};

pub const YOUTUBE_API: &str = "https://www.googleapis.com/youtube/v3";
pub const TIMEDTEXT_URL: &str = "https://www.youtube.com/api/timedtext";
pub const API_KEY_ENV: &str = "YOUTUBE_API_KEY";
pub const CHECKPOINT_FILE: &str = "youtube.checkpoint.json";

pub const QUOTA_LIMIT: u32 = 9_900;
const SEARCH_COST: u32 = 100;
const VIDEOS_COST: u32 = 1;
const VIDEO_BATCH_SIZE: usize = 50;
const CHECKPOINT_INTERVAL: usize = 10;
const SEARCH_INTERVAL: Duration = Duration::from_secs(1);
const TRANSCRIPT_INTERVAL: Duration = Duration::from_millis(300);
const TRANSCRIPT_PREFIX_CHARS: usize = 1000;
const DESCRIPTION_CHARS: usize = 500;

/// `(category, query)` pairs searched in order
pub const SEARCH_QUERIES: &[(&str, &str)] = &[
    ("fundamentals", "what is superconductivity"),
    ("fundamentals", "superconductivity explained"),
    ("fundamentals", "how do superconductors work"),
    ("fundamentals", "zero electrical resistance superconductor"),
    ("theory", "BCS theory superconductivity"),
    ("theory", "Cooper pairs explained"),
    ("theory", "Ginzburg-Landau theory lecture"),
    ("theory", "superconductivity lecture quantum"),
    ("meissner", "Meissner effect demonstration"),
    ("meissner", "quantum locking levitation"),
    ("meissner", "flux pinning superconductor"),
    ("types", "type I vs type II superconductors"),
    ("types", "Abrikosov vortex lattice"),
    ("high_tc", "high temperature superconductors"),
    ("high_tc", "cuprate superconductors YBCO"),
    ("high_tc", "iron based superconductors"),
    ("room_temp", "room temperature superconductor"),
    ("room_temp", "LK-99 superconductor"),
    ("room_temp", "hydride superconductors high pressure"),
    ("applications", "superconducting magnets MRI"),
    ("applications", "superconducting qubits quantum computer"),
    ("applications", "maglev train superconductor"),
    ("applications", "SQUID magnetometer"),
    ("ai_ml", "machine learning superconductor discovery"),
    ("ai_ml", "AI materials discovery superconductors"),
    ("ai_ml", "computational materials science superconductivity"),
    ("experiments", "superconductor experiment liquid nitrogen"),
    ("experiments", "measuring critical temperature superconductor"),
    ("educational", "superconductivity MIT lecture"),
    ("educational", "superconductivity seminar colloquium"),
];

const EDU_CHANNELS: &[&str] = &[
    "mit",
    "stanford",
    "khan",
    "crashcourse",
    "veritasium",
    "minutephysics",
    "3blue1brown",
    "physics girl",
];

const BEGINNER_KEYWORDS: &[&str] = &[
    "basics",
    "introduction",
    "explained",
    "simple",
    "for beginners",
    "what is",
    "eli5",
    "understand",
    "tutorial",
    "guide",
    "how to",
    "beginner",
];

const EXPERT_KEYWORDS: &[&str] = &[
    "quantum field theory",
    "hamiltonian",
    "eigenvalue",
    "renormalization",
    "feynman diagram",
    "perturbation theory",
    "density functional",
    "many-body",
    "topological invariant",
    "seminar",
    "colloquium",
    "research talk",
    "arxiv",
];

const INTERMEDIATE_KEYWORDS: &[&str] = &[
    "bcs theory",
    "cooper pairs",
    "meissner effect",
    "lecture",
    "course",
    "phonon",
    "lattice",
];

const HOT_TOPIC_TERMS: &[&str] = &["room temp", "lk-99", "lk99", "ambient", "breakthrough"];
const SUB_FOCUS_TERMS: &[&str] = &["machine learning", "computational", "predict"];

static DURATION_MINUTES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)M").expect("valid regex"));
static AI_ML_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(ai|ml)\b").expect("valid regex"));

/// Minutes in an ISO 8601 duration, anything with an hour component counts as 60
#[inline]
pub fn parse_iso_duration_minutes(duration: &str) -> u32 {
    if duration.contains('H') {
        return 60;
    }

    DURATION_MINUTES
        .captures(duration)
        .ok()
        .flatten()
        .and_then(|captures| captures.get(1))
        .and_then(|minutes| minutes.as_str().parse().ok())
        .unwrap_or(0)
}

fn count_matches(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|keyword| text.contains(*keyword)).count()
}

/// Estimate the audience level of a video from its metadata and opening transcript
#[inline]
pub fn infer_difficulty(
    title: &str,
    description: &str,
    transcript: &str,
    channel: &str,
    duration: &str,
) -> DifficultyLevel {
    let prefix: String = transcript.chars().take(TRANSCRIPT_PREFIX_CHARS).collect();
    let text = format!("{} {} {}", title, description, prefix).to_lowercase();
    let channel = channel.to_lowercase();

    let is_educational = EDU_CHANNELS.iter().any(|edu| channel.contains(edu));
    let beginner = count_matches(&text, BEGINNER_KEYWORDS);
    let intermediate = count_matches(&text, INTERMEDIATE_KEYWORDS);
    let expert = count_matches(&text, EXPERT_KEYWORDS);
    let minutes = parse_iso_duration_minutes(duration);

    if expert >= 2 {
        if is_educational {
            DifficultyLevel::EXPERT
        } else {
            DifficultyLevel::CUTTING_EDGE
        }
    } else if beginner >= 3 {
        if minutes < 15 {
            DifficultyLevel::BEGINNER
        } else {
            DifficultyLevel::INTERMEDIATE
        }
    } else if intermediate >= 2
        || is_educational
        || text.contains("lecture")
        || text.contains("course")
    {
        DifficultyLevel::ADVANCED
    } else if beginner >= 1 {
        DifficultyLevel::INTERMEDIATE
    } else {
        DifficultyLevel::ADVANCED
    }
}

#[inline]
pub fn infer_focus(title: &str, description: &str) -> FocusArea {
    let text = format!("{} {}", title, description).to_lowercase();

    if HOT_TOPIC_TERMS.iter().any(|term| text.contains(term)) {
        FocusArea::HotTopic
    } else if SUB_FOCUS_TERMS.iter().any(|term| text.contains(term))
        || AI_ML_WORDS.is_match(&text).unwrap_or(false)
    {
        FocusArea::SubFocus
    } else {
        FocusArea::Main
    }
}

/// Join the `<text>` cues of a timed-text XML document
#[inline]
pub fn parse_transcript(xml: &str) -> Option<String> {
    let document = Html::parse_document(xml);
    let cues: Vec<String> = document
        .select(&selector("text"))
        .map(element_text)
        .map(|cue| decode_entities(&cue))
        .filter(|cue| !cue.is_empty())
        .collect();

    (!cues.is_empty()).then(|| collapse_whitespace(&cues.join(" ")))
}

/// Cue text arrives entity-escaped inside the XML escaping
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let fragment = Html::parse_fragment(text);
    collapse_whitespace(&fragment.root_element().text().collect::<String>())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Searching,
    Details,
}

/// Resumable search progress, persisted next to the raw output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub video_ids: Vec<String>,
    pub quota_used: u32,
    pub processed_queries: Vec<String>,
    pub phase: Phase,
}

#[derive(Debug, Deserialize)]
struct SearchListResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<Video>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub snippet: Snippet,
    #[serde(default)]
    pub statistics: Statistics,
    #[serde(default)]
    pub content_details: ContentDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub channel_title: String,
    #[serde(default)]
    pub published_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub view_count: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentDetails {
    #[serde(default)]
    pub duration: String,
}

#[derive(Debug)]
pub struct YoutubeScraper {
    api_key: String,
    api_http: HttpClient,
    transcript_http: HttpClient,
    api_url: String,
    transcript_url: String,
    queries: Vec<String>,
    checkpoint_path: PathBuf,
    limit: Option<usize>,
}

impl YoutubeScraper {
    /// Read the API key from `YOUTUBE_API_KEY`
    #[inline]
    pub fn from_env(config: &ScraperConfig, raw_dir: PathBuf, limit: Option<usize>) -> Result<Self> {
        Self::new(std::env::var(API_KEY_ENV).ok(), config, raw_dir, limit)
    }

    #[inline]
    pub fn new(
        api_key: Option<String>,
        config: &ScraperConfig,
        raw_dir: PathBuf,
        limit: Option<usize>,
    ) -> Result<Self> {
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| anyhow!("{} is not set; the YouTube scraper needs an API key", API_KEY_ENV))?;

        Ok(Self {
            api_key,
            api_http: HttpClient::new(HttpClientConfig::from_scraper(config, SEARCH_INTERVAL)),
            transcript_http: HttpClient::new(HttpClientConfig::from_scraper(
                config,
                TRANSCRIPT_INTERVAL,
            )),
            api_url: YOUTUBE_API.to_string(),
            transcript_url: TIMEDTEXT_URL.to_string(),
            queries: SEARCH_QUERIES.iter().map(|(_, query)| (*query).to_string()).collect(),
            checkpoint_path: raw_dir.join(CHECKPOINT_FILE),
            limit,
        })
    }

    #[inline]
    #[must_use]
    pub fn with_endpoints(
        mut self,
        api_http: HttpClient,
        transcript_http: HttpClient,
        api_url: impl Into<String>,
        transcript_url: impl Into<String>,
    ) -> Self {
        self.api_http = api_http;
        self.transcript_http = transcript_http;
        self.api_url = api_url.into();
        self.transcript_url = transcript_url.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_queries(mut self, queries: Vec<String>) -> Self {
        self.queries = queries;
        self
    }

    #[inline]
    pub fn checkpoint_path(&self) -> &std::path::Path {
        &self.checkpoint_path
    }

    fn load_checkpoint(&self) -> Checkpoint {
        if !self.checkpoint_path.exists() {
            return Checkpoint::default();
        }
        match read_json::<Checkpoint>(&self.checkpoint_path) {
            Ok(checkpoint) => {
                info!(
                    "Resuming YouTube scrape: {} videos, {} queries done, {} quota used",
                    checkpoint.video_ids.len(),
                    checkpoint.processed_queries.len(),
                    checkpoint.quota_used
                );
                checkpoint
            }
            Err(e) => {
                warn!("Ignoring unreadable checkpoint: {:#}", e);
                Checkpoint::default()
            }
        }
    }

    fn save_checkpoint(&self, checkpoint: &Checkpoint) {
        if let Err(e) = write_json(&self.checkpoint_path, checkpoint) {
            warn!("Failed to save checkpoint: {:#}", e);
        }
    }

    async fn search(&mut self, query: &str) -> Result<Vec<String>> {
        let url = format!("{}/search", self.api_url);
        let response: SearchListResponse = self
            .api_http
            .get_json(
                &url,
                &[
                    ("part", "id"),
                    ("q", query),
                    ("type", "video"),
                    ("maxResults", "50"),
                    ("relevanceLanguage", "en"),
                    ("videoCaption", "closedCaption"),
                    ("order", "relevance"),
                    ("key", self.api_key.as_str()),
                ],
            )
            .await?;

        Ok(response
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .collect())
    }

    async fn video_details(&mut self, ids: &[String]) -> Result<Vec<Video>> {
        let url = format!("{}/videos", self.api_url);
        let ids = ids.join(",");
        let response: VideoListResponse = self
            .api_http
            .get_json(
                &url,
                &[
                    ("part", "snippet,statistics,contentDetails"),
                    ("id", ids.as_str()),
                    ("key", self.api_key.as_str()),
                ],
            )
            .await?;
        Ok(response.items)
    }

    async fn transcript(&mut self, video_id: &str) -> Option<String> {
        match self
            .transcript_http
            .get_with_query(&self.transcript_url, &[("lang", "en"), ("v", video_id)])
            .await
        {
            Ok(xml) => parse_transcript(&xml),
            Err(e) => {
                debug!("No transcript for {}: {:#}", video_id, e);
                None
            }
        }
    }

    /// Search phase: collect video ids until queries, quota or the limit run out
    async fn collect_video_ids(&mut self, checkpoint: &mut Checkpoint, progress: &ProgressBar) {
        let mut seen: HashSet<String> = checkpoint.video_ids.iter().cloned().collect();
        let done: HashSet<String> = checkpoint.processed_queries.iter().cloned().collect();
        let pending: Vec<String> = self
            .queries
            .iter()
            .filter(|query| !done.contains(*query))
            .cloned()
            .collect();

        for query in pending {
            progress.inc(1);
            if checkpoint.quota_used + SEARCH_COST > QUOTA_LIMIT {
                warn!("Quota budget reached ({} units), stopping search", checkpoint.quota_used);
                break;
            }
            if limit_reached(checkpoint.video_ids.len(), self.limit) {
                break;
            }
            progress.set_message(query.clone());

            match self.search(&query).await {
                Ok(ids) => {
                    checkpoint.quota_used += SEARCH_COST;
                    let before = checkpoint.video_ids.len();
                    for id in ids {
                        if seen.insert(id.clone()) {
                            checkpoint.video_ids.push(id);
                        }
                    }
                    debug!(
                        "'{}' added {} new videos",
                        query,
                        checkpoint.video_ids.len() - before
                    );
                }
                Err(e) if status_code(&e) == Some(403) => {
                    warn!("YouTube quota exhausted, keeping {} videos", checkpoint.video_ids.len());
                    break;
                }
                Err(e) => {
                    warn!("YouTube search '{}' failed: {:#}", query, e);
                    continue;
                }
            }

            checkpoint.processed_queries.push(query);
            if checkpoint.processed_queries.len() % CHECKPOINT_INTERVAL == 0 {
                self.save_checkpoint(checkpoint);
            }
        }

        checkpoint.phase = Phase::Details;
        self.save_checkpoint(checkpoint);
    }

    fn video_document(video: &Video, transcript: String) -> Document {
        let snippet = &video.snippet;
        let difficulty = infer_difficulty(
            &snippet.title,
            &snippet.description,
            &transcript,
            &snippet.channel_title,
            &video.content_details.duration,
        );
        let view_count = video
            .statistics
            .view_count
            .as_deref()
            .and_then(|count| count.parse::<u64>().ok())
            .unwrap_or(0);
        let description: String = snippet.description.chars().take(DESCRIPTION_CHARS).collect();

        Document::new(
            format!("youtube_{}", video.id),
            "youtube",
            "video",
            snippet.title.clone(),
            format!("https://www.youtube.com/watch?v={}", video.id),
            transcript,
            difficulty,
        )
        .with_focus(infer_focus(&snippet.title, &snippet.description))
        .with_extra("channel", snippet.channel_title.clone())
        .with_extra("published", snippet.published_at.clone())
        .with_extra("view_count", view_count)
        .with_extra("duration", video.content_details.duration.clone())
        .with_extra("description", description)
    }
}

#[async_trait]
impl Scraper for YoutubeScraper {
    fn name(&self) -> &'static str {
        "youtube"
    }

    async fn scrape(&mut self, progress: &ProgressBar) -> Result<Vec<Document>> {
        let mut checkpoint = self.load_checkpoint();

        if checkpoint.phase == Phase::Searching {
            progress.set_length(self.queries.len() as u64);
            self.collect_video_ids(&mut checkpoint, progress).await;
        }
        info!(
            "Collected {} candidate videos ({} quota units used)",
            checkpoint.video_ids.len(),
            checkpoint.quota_used
        );

        let mut videos = Vec::new();
        let batches: Vec<Vec<String>> = checkpoint
            .video_ids
            .chunks(VIDEO_BATCH_SIZE)
            .map(<[String]>::to_vec)
            .collect();
        for batch in batches {
            if checkpoint.quota_used + VIDEOS_COST > QUOTA_LIMIT {
                warn!("Quota budget reached before all video details were fetched");
                break;
            }
            match self.video_details(&batch).await {
                Ok(details) => {
                    checkpoint.quota_used += VIDEOS_COST;
                    videos.extend(details);
                }
                Err(e) if status_code(&e) == Some(403) => {
                    warn!("YouTube quota exhausted while fetching video details");
                    break;
                }
                Err(e) => warn!("Video details request failed: {:#}", e),
            }
        }

        progress.set_position(0);
        progress.set_length(videos.len() as u64);
        let mut documents = Vec::new();
        for video in &videos {
            progress.inc(1);
            if limit_reached(documents.len(), self.limit) {
                break;
            }
            progress.set_message(video.snippet.title.clone());

            let Some(transcript) = self.transcript(&video.id).await else {
                debug!("Skipping {} without transcript", video.id);
                continue;
            };
            documents.push(Self::video_document(video, transcript));
        }

        if self.checkpoint_path.exists() {
            fs::remove_file(&self.checkpoint_path).with_context(|| {
                format!("Failed to remove checkpoint {}", self.checkpoint_path.display())
            })?;
        }

        info!(
            "YouTube: {} videos with transcripts out of {} ({} quota units)",
            documents.len(),
            videos.len(),
            checkpoint.quota_used
        );
        Ok(documents)
    }
}
