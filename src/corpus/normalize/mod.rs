#[cfg(test)]
mod tests;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{DifficultyLevel, Document, FocusArea, word_count};

/// Keys consumed into typed fields; anything else is carried in `extra`
const CONSUMED_KEYS: &[&str] = &[
    "id",
    "source",
    "type",
    "doc_type",
    "title",
    "url",
    "text",
    "content",
    "full_text",
    "transcript",
    "summary",
    "abstract",
    "difficulty_level",
    "focus_area",
    "focus",
    "word_count",
    "quality_metrics",
    "categorization",
    "extra",
];

/// Extract documents from a parsed scraper file.
///
/// Accepts a bare array, an object with a `documents` array, or a Simple
/// Wikipedia export with an `articles` array. Records that cannot be
/// normalized are skipped.
#[inline]
pub fn documents_from_value(value: Value) -> Vec<Document> {
    match value {
        Value::Array(items) => normalize_all(&items),
        Value::Object(mut object) => {
            if let Some(Value::Array(items)) = object.remove("documents") {
                normalize_all(&items)
            } else if let Some(Value::Array(articles)) = object.remove("articles") {
                articles
                    .iter()
                    .enumerate()
                    .filter_map(|(position, article)| simple_wiki_article(article, position))
                    .collect()
            } else {
                warn!("Object has neither a 'documents' nor an 'articles' array");
                Vec::new()
            }
        }
        other => {
            warn!("Unexpected document container: {}", type_name(&other));
            Vec::new()
        }
    }
}

fn normalize_all(items: &[Value]) -> Vec<Document> {
    items.iter().filter_map(normalize_document).collect()
}

/// Flatten one raw record into a [`Document`].
///
/// Older scraper outputs nest the body under `content`
/// (`{title, full_text | transcript | text, url}`), word counts and levels
/// under `quality_metrics`, and the focus under `categorization.focus_type`.
#[inline]
pub fn normalize_document(value: &Value) -> Option<Document> {
    let object = value.as_object()?;

    let Some(id) = object.get("id").and_then(scalar_string) else {
        warn!("Skipping document without an id");
        return None;
    };

    let content = object.get("content").and_then(Value::as_object);

    let text = first_string(object, &["text", "content", "full_text", "transcript"])
        .or_else(|| content.and_then(|c| first_string(c, &["full_text", "transcript", "text"])));
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        warn!("Skipping document {} without text", id);
        return None;
    };

    let title = first_string(object, &["title"])
        .or_else(|| content.and_then(|c| first_string(c, &["title"])))
        .unwrap_or_default();
    let url = first_string(object, &["url"])
        .or_else(|| content.and_then(|c| first_string(c, &["url"])))
        .unwrap_or_default();

    let quality = object.get("quality_metrics").and_then(Value::as_object);

    let difficulty_level = object
        .get("difficulty_level")
        .or_else(|| quality.and_then(|q| q.get("difficulty_level")))
        .and_then(Value::as_u64)
        .and_then(|level| u8::try_from(level).ok())
        .and_then(DifficultyLevel::new)
        .unwrap_or_else(|| {
            debug!("Document {} has no usable difficulty level, using default", id);
            DifficultyLevel::default()
        });

    let focus_area = first_string(object, &["focus_area", "focus"])
        .or_else(|| {
            object
                .get("categorization")
                .and_then(Value::as_object)
                .and_then(|c| first_string(c, &["focus_type"]))
        })
        .map(|label| FocusArea::from_label(&label))
        .unwrap_or_default();

    let word_count = object
        .get("word_count")
        .or_else(|| quality.and_then(|q| q.get("word_count")))
        .and_then(Value::as_u64)
        .and_then(|count| usize::try_from(count).ok())
        .filter(|count| *count > 0)
        .unwrap_or_else(|| word_count(&text));

    let mut extra: Map<String, Value> = object
        .get("extra")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    for (key, field) in object {
        if !CONSUMED_KEYS.contains(&key.as_str()) && !field.is_null() {
            extra.insert(key.clone(), field.clone());
        }
    }

    Some(Document {
        id,
        source: first_string(object, &["source"]).unwrap_or_else(|| "unknown".to_string()),
        doc_type: first_string(object, &["type", "doc_type"]).unwrap_or_default(),
        title,
        url,
        summary: first_string(object, &["summary", "abstract"]).filter(|s| !s.trim().is_empty()),
        text,
        difficulty_level,
        focus_area,
        word_count,
        extra,
    })
}

/// Simple Wikipedia exports carry beginner-level encyclopedia articles
fn simple_wiki_article(article: &Value, position: usize) -> Option<Document> {
    let object = article.as_object()?;

    let id = object
        .get("id")
        .and_then(scalar_string)
        .or_else(|| {
            object
                .get("pageid")
                .and_then(scalar_string)
                .map(|pageid| format!("simple_wiki_{}", pageid))
        })
        .unwrap_or_else(|| format!("simple_wiki_{}", position));

    let text = first_string(object, &["content", "text"]).filter(|t| !t.trim().is_empty())?;

    let mut document = Document::new(
        id,
        "simple_wikipedia",
        "encyclopedia",
        first_string(object, &["title"]).unwrap_or_default(),
        first_string(object, &["url"]).unwrap_or_default(),
        text,
        DifficultyLevel::BEGINNER,
    );

    if let Some(categories) = object.get("categories").filter(|c| c.is_array()) {
        document = document.with_extra("categories", categories.clone());
    }

    Some(document)
}

fn first_string(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
