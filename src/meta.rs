//! MetaStatus payload interpretation.
//!
//! metastatus.com has no stable public schema, so the payload is walked
//! looking for objects that describe one of the Meta apps and a verdict is
//! derived from the wording of their status and latest update.

use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

use crate::models::{Severity, Verdict};

const SLUGS: &[&str] = &["facebook", "instagram", "whatsapp"];

const SLUG_PATHS: &[&str] = &["slug", "service.slug", "service", "platform", "product", "name", "title"];

const STATUS_PATHS: &[&str] = &[
    "status.description",
    "status.title",
    "status.state",
    "status.status",
    "status",
    "status_text",
    "statusDescription",
    "status_description",
    "indicator",
    "state",
    "current_status",
    "currentStatus",
];

const DETAIL_PATHS: &[&str] = &[
    "latest_update.title",
    "latest_update.description",
    "latestUpdate.title",
    "latestUpdate.description",
    "last_incident.title",
    "lastIncident.title",
    "incident.title",
    "incident.description",
    "message",
    "subtitle",
    "description",
    "body",
];

const DOWN_WORDS: &[&str] =
    &["major", "outage", "down", "unavailable", "disruption", "incident", "critical", "severe"];
const WARN_WORDS: &[&str] = &[
    "minor", "partial", "degrad", "latenc", "slow", "investigating", "issue", "maintenance", "notice",
];
const OK_WORDS: &[&str] = &[
    "healthy", "operational", "available", "up", "restored", "resolved", "normal", "no issues", "stable",
];

const INLINE_STATE_PATTERNS: &[&str] = &[
    r"(?s)window\.__APOLLO_STATE__\s*=\s*(\{.*?\});",
    r"(?s)window\.__NEXT_DATA__\s*=\s*(\{.*?\});",
    r"(?s)window\.__NUXT__\s*=\s*(\{.*?\});",
];
const NEXT_DATA_SCRIPT: &str = r#"<script[^>]+id="__NEXT_DATA__"[^>]*>([\s\S]*?)</script>"#;

#[derive(Debug, Clone, PartialEq)]
pub struct MetaEntry {
    pub slug: &'static str,
    pub severity: Severity,
    pub status_text: String,
    pub detail_text: String,
}

impl MetaEntry {
    pub fn verdict(&self) -> Verdict {
        let mut parts: Vec<&str> = Vec::new();
        if !self.status_text.is_empty() {
            parts.push(&self.status_text);
        }
        if !self.detail_text.is_empty() && self.detail_text != self.status_text {
            parts.push(&self.detail_text);
        }
        let descriptor = if parts.is_empty() { "Sin detalles oficiales".to_string() } else { parts.join(" - ") };
        Verdict::new(self.severity, format!("MetaStatus: {}", descriptor))
    }
}

/// Best entry per app slug.
pub type MetaStatusMap = HashMap<&'static str, MetaEntry>;

/// Builds the slug map from a payload. `None` when nothing in it describes a Meta app.
pub fn build_status_map(payload: &Value) -> Option<MetaStatusMap> {
    let mut entries = Vec::new();
    collect_entries(payload, &mut entries);

    let mut map = MetaStatusMap::new();
    for entry in entries {
        let replace = map
            .get(entry.slug)
            .map_or(true, |current| entry.detail_text.len() > current.detail_text.len());
        if replace {
            map.insert(entry.slug, entry);
        }
    }
    (!map.is_empty()).then_some(map)
}

fn collect_entries(value: &Value, out: &mut Vec<MetaEntry>) {
    match value {
        Value::Object(obj) => {
            let interesting = obj.keys().any(|key| {
                let key = key.to_lowercase();
                ["status", "incident", "indicator", "state"].iter().any(|w| key.contains(w))
            });
            if interesting {
                if let Some(entry) = normalize_entry(value) {
                    out.push(entry);
                }
            }
            for child in obj.values() {
                collect_entries(child, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_entries(child, out);
            }
        }
        _ => {}
    }
}

fn normalize_entry(entry: &Value) -> Option<MetaEntry> {
    let slug = SLUG_PATHS
        .iter()
        .filter_map(|path| nested(entry, path).and_then(Value::as_str))
        .find_map(detect_slug)?;

    let status_text = first_string(entry, STATUS_PATHS).unwrap_or_else(|| "Sin información oficial".to_string());
    let detail_text = first_string(entry, DETAIL_PATHS).unwrap_or_default();
    let severity = severity_of(format!("{} {}", status_text, detail_text).trim());

    Some(MetaEntry { slug, severity, status_text, detail_text })
}

fn detect_slug(value: &str) -> Option<&'static str> {
    let normalized = value.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    SLUGS.iter().copied().find(|slug| normalized.contains(slug))
}

pub fn severity_of(text: &str) -> Severity {
    let normalized = text.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| normalized.contains(w));
    if mentions(DOWN_WORDS) {
        Severity::Down
    } else if mentions(WARN_WORDS) {
        Severity::Warning
    } else if !normalized.is_empty() && mentions(OK_WORDS) {
        Severity::Ok
    } else {
        Severity::Warning
    }
}

fn nested<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |acc, key| acc.as_object()?.get(key))
}

fn non_empty(value: &Value) -> Option<String> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

fn first_string(source: &Value, paths: &[&str]) -> Option<String> {
    for path in paths {
        let Some(value) = nested(source, path) else { continue };
        if let Some(text) = non_empty(value) {
            return Some(text);
        }
        if let Value::Array(items) = value {
            for item in items {
                if let Some(text) = non_empty(item) {
                    return Some(text);
                }
                if let Some(text) = item.as_object().and_then(|o| o.values().find_map(non_empty)) {
                    return Some(text);
                }
            }
        }
        if let Some(text) = value.as_object().and_then(|o| o.values().find_map(non_empty)) {
            return Some(text);
        }
    }
    None
}

/// Pulls the hydration state a status page embeds in its HTML.
pub fn extract_embedded_json(html: &str) -> Option<Value> {
    for pattern in INLINE_STATE_PATTERNS {
        let Ok(re) = Regex::new(pattern) else { continue };
        if let Some(found) = re.captures(html).and_then(|c| c.get(1)) {
            if let Ok(value) = serde_json::from_str(found.as_str()) {
                return Some(value);
            }
        }
    }

    let re = Regex::new(NEXT_DATA_SCRIPT).ok()?;
    let found = re.captures(html)?.get(1)?;
    serde_json::from_str(found.as_str()).ok()
}
