//! Posts normalization.
//!
//! The generation job is free to emit its content in several JSON shapes.
//! Each detector below recognizes one shape and either returns a document or
//! declines. Detectors run in fixed priority order; the first match wins.
//! Anything unrecognized, unparseable, or flagged by the job itself as a
//! parse failure yields no document, so callers fall back to the raw text.

use serde_json::{Map, Value};

use super::models::document::DocumentBuilder;
use super::models::PostsDocument;

type ShapeDetector = fn(&Value) -> Option<PostsDocument>;

/// Shapes in priority order.
const SHAPES: [(&str, ShapeDetector); 5] = [
    ("platform_records", platform_records),
    ("platforms_map", platforms_map),
    ("direct_map", direct_map),
    ("posts_map", posts_map),
    ("flat_sequence", flat_sequence),
];

const DEFAULT_PLATFORM: &str = "general";

/// Parse and normalize the content artifact text.
pub fn normalize(raw: &str) -> Option<PostsDocument> {
    let value: Value = match serde_json::from_str(strip_code_fence(raw)) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "Content artifact is not valid JSON");
            return None;
        }
    };
    normalize_value(&value)
}

/// Normalize an already parsed value.
pub fn normalize_value(value: &Value) -> Option<PostsDocument> {
    if is_reported_parse_failure(value) {
        tracing::debug!("Content artifact carries the job's own parse failure");
        return None;
    }

    // A shape that yields no platforms has not matched.
    let matched = SHAPES.iter().find_map(|(shape, detect)| {
        let document = detect(value).filter(|document| !document.is_empty())?;
        tracing::debug!(
            shape,
            platforms = document.len(),
            "Content artifact normalized"
        );
        Some(document)
    });

    if matched.is_none() {
        tracing::debug!("Content artifact matched no known shape");
    }
    matched
}

/// `{"raw": ..., "error": ...}`: the job could not parse its own output.
fn is_reported_parse_failure(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.contains_key("raw") && map.contains_key("error"))
}

/// `{"platforms": [{"name": "X", "posts": [...]}, ...]}`
fn platform_records(value: &Value) -> Option<PostsDocument> {
    let records = value.get("platforms")?.as_array()?;

    let mut builder = DocumentBuilder::default();
    for record in records {
        // Nameless records are skipped, not fatal to the shape.
        let Some(name) = record.get("name").and_then(Value::as_str) else {
            continue;
        };
        let posts = record
            .get("posts")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        builder.extend(name, posts);
    }
    Some(builder.build())
}

/// `{"Platforms": {"X": [...], ...}}`, key matched case-insensitively.
fn platforms_map(value: &Value) -> Option<PostsDocument> {
    let map = value.as_object()?;
    let platforms = map
        .iter()
        .find(|(key, value)| is_platforms_key(key) && value.is_object())
        .and_then(|(_, value)| value.as_object())?;
    Some(from_platform_map(platforms))
}

/// `{"x": [...], "linkedin": [...]}`
fn direct_map(value: &Value) -> Option<PostsDocument> {
    let map = value.as_object()?;
    let has_sequence = map
        .iter()
        .any(|(key, value)| !is_platforms_key(key) && value.is_array());
    if !has_sequence {
        return None;
    }

    let mut builder = DocumentBuilder::default();
    for (key, value) in map.iter().filter(|(key, _)| !is_platforms_key(key)) {
        if let Some(posts) = value.as_array() {
            builder.extend(key, posts);
        }
    }
    Some(builder.build())
}

/// `{"posts": {"x": [...], ...}}`
fn posts_map(value: &Value) -> Option<PostsDocument> {
    let posts = value.get("posts")?.as_object()?;
    Some(from_platform_map(posts))
}

/// `[{"platform": "X", ...}, ...]`, grouped by each record's platform.
fn flat_sequence(value: &Value) -> Option<PostsDocument> {
    let records = value.as_array()?;
    if records.is_empty() || !records.iter().all(Value::is_object) {
        return None;
    }

    let mut builder = DocumentBuilder::default();
    for record in records {
        let platform = record
            .as_object()
            .and_then(record_platform)
            .unwrap_or(DEFAULT_PLATFORM);
        builder.extend(platform, std::iter::once(record));
    }
    Some(builder.build())
}

fn from_platform_map(map: &Map<String, Value>) -> PostsDocument {
    let mut builder = DocumentBuilder::default();
    for (key, value) in map {
        if let Some(posts) = value.as_array() {
            builder.extend(key, posts);
        }
    }
    builder.build()
}

fn record_platform(record: &Map<String, Value>) -> Option<&str> {
    record
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("platform"))
        .and_then(|(_, value)| value.as_str())
        .map(str::trim)
        .filter(|platform| !platform.is_empty())
}

fn is_platforms_key(key: &str) -> bool {
    key.eq_ignore_ascii_case("platforms")
}

/// Strip a surrounding Markdown code fence (```json ... ```), if any.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return trimmed;
    };

    // Drop the info string on the opening line.
    match inner.find('\n') {
        Some(newline) => inner[newline + 1..].trim(),
        None => inner.trim(),
    }
}
