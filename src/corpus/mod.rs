// Corpus model: the document record shared by scrapers, training and the index

pub mod merge;
pub mod normalize;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::path::Path;

pub use merge::{CorpusStats, merge_documents, merge_files};
pub use normalize::{documents_from_value, normalize_document};

/// Audience level of a document or query, 1 (beginner) to 5 (cutting-edge)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DifficultyLevel(u8);

impl DifficultyLevel {
    pub const BEGINNER: Self = Self(1);
    pub const INTERMEDIATE: Self = Self(2);
    pub const ADVANCED: Self = Self(3);
    pub const EXPERT: Self = Self(4);
    pub const CUTTING_EDGE: Self = Self(5);

    pub const ALL: [Self; 5] = [
        Self::BEGINNER,
        Self::INTERMEDIATE,
        Self::ADVANCED,
        Self::EXPERT,
        Self::CUTTING_EDGE,
    ];

    #[inline]
    pub fn new(level: u8) -> Option<Self> {
        (1..=5).contains(&level).then_some(Self(level))
    }

    #[inline]
    pub fn get(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn name(self) -> &'static str {
        match self.0 {
            1 => "Beginner",
            2 => "Intermediate",
            3 => "Advanced",
            4 => "Expert",
            _ => "Cutting-edge",
        }
    }

    /// Background colour used for result cards in the web UI
    #[inline]
    pub fn color(self) -> &'static str {
        match self.0 {
            1 => "#d4edda",
            2 => "#d1ecf1",
            3 => "#fff3cd",
            4 => "#f8d7da",
            _ => "#d6d8db",
        }
    }

    #[inline]
    pub fn distance(self, other: Self) -> u8 {
        self.0.abs_diff(other.0)
    }
}

/// Documents without an explicit level are treated as advanced material
impl Default for DifficultyLevel {
    #[inline]
    fn default() -> Self {
        Self::ADVANCED
    }
}

impl TryFrom<u8> for DifficultyLevel {
    type Error = String;

    #[inline]
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("difficulty level {} is outside 1-5", value))
    }
}

impl From<DifficultyLevel> for u8 {
    #[inline]
    fn from(value: DifficultyLevel) -> Self {
        value.0
    }
}

impl fmt::Display for DifficultyLevel {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusArea {
    #[default]
    Main,
    SubFocus,
    HotTopic,
}

impl FocusArea {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::SubFocus => "sub_focus",
            Self::HotTopic => "hot_topic",
        }
    }

    /// Parse the labels used across raw scraper files, unknown labels map to `Main`
    #[inline]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "sub_focus" | "subfocus" | "sub-focus" => Self::SubFocus,
            "hot_topic" | "hottopic" | "hot-topic" => Self::HotTopic,
            _ => Self::Main,
        }
    }
}

impl fmt::Display for FocusArea {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scraped document. Written once by a scraper and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub source: String,
    #[serde(rename = "type", default)]
    pub doc_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub difficulty_level: DifficultyLevel,
    #[serde(default)]
    pub focus_area: FocusArea,
    #[serde(default)]
    pub word_count: usize,
    /// Source-specific metadata such as authors, channel or categories
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl Document {
    #[inline]
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        doc_type: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        text: impl Into<String>,
        difficulty_level: DifficultyLevel,
    ) -> Self {
        let text = text.into();
        Self {
            id: id.into(),
            source: source.into(),
            doc_type: doc_type.into(),
            title: title.into(),
            url: url.into(),
            word_count: word_count(&text),
            text,
            summary: None,
            difficulty_level,
            focus_area: FocusArea::Main,
            extra: Map::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        let summary = summary.into();
        self.summary = (!summary.trim().is_empty()).then_some(summary);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_focus(mut self, focus_area: FocusArea) -> Self {
        self.focus_area = focus_area;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    /// Text handed to the embedding model: title, summary when present, then body
    #[inline]
    pub fn embedding_text(&self) -> String {
        match self.summary.as_deref() {
            Some(summary) => format!("{}. {}. {}", self.title, summary, self.text),
            None => format!("{}. {}", self.title, self.text),
        }
    }
}

/// Whitespace word count, matching how every scraper measures length
#[inline]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// On-disk corpus: `{ "metadata": {...}, "documents": [...] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusFile {
    pub metadata: CorpusStats,
    pub documents: Vec<Document>,
}

/// Load documents from any of the file shapes the scrapers produce
#[inline]
pub fn load_documents(path: &Path) -> Result<Vec<Document>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read documents file: {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse documents file: {}", path.display()))?;

    if !(value.is_array() || value.is_object()) {
        return Err(anyhow!(
            "Unexpected JSON shape in {}: expected an array or an object",
            path.display()
        ));
    }

    Ok(documents_from_value(value))
}

#[inline]
pub fn load_corpus(path: &Path) -> Result<CorpusFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse corpus file: {}", path.display()))
}

#[inline]
pub fn save_corpus(path: &Path, corpus: &CorpusFile) -> Result<()> {
    write_json(path, corpus)
}

/// Pretty-print a value to `path`, creating parent directories as needed
#[inline]
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let content = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

#[inline]
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
