use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use crate::error::ExtractError;
use crate::schema::{
    is_placeholder, Domain, EntityDetails, ExtractionRecord, ReviewMetadata, CONTACT_FOR_PRICING,
    NOT_AVAILABLE, NOT_FOUND,
};

static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*```[A-Za-z]*[ \t]*\r?\n?").expect("valid fence regex"));
static FENCE_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n?```\s*$").expect("valid fence regex"));
static RATING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*(?:(?:/|out of)\s*\d+(?:\.\d+)?)?\s*(?:stars?)?\s*$")
        .expect("valid rating regex")
});

/// Keys that may hold the list of entities in the extractor's answer.
const CONTAINER_KEYS: &[&str] = &[
    "companies",
    "providers",
    "entities",
    "results",
    "businesses",
    "courses",
    "products",
];

/// Remove surrounding markdown code fences, if any.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = match FENCE_OPEN.find(trimmed) {
        Some(m) if trimmed.starts_with("```") => &trimmed[m.end()..],
        _ => return trimmed,
    };
    match FENCE_CLOSE.find(without_open) {
        Some(m) => without_open[..m.start()].trim(),
        None => without_open.trim(),
    }
}

/// Balanced `{...}` or `[...]` span opening at byte `start`. Brackets inside
/// JSON strings are ignored.
fn balanced_span(text: &str, start: usize) -> Option<&str> {
    let mut open = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => open.push(ch),
            '}' | ']' => {
                let expected = if ch == '}' { '{' } else { '[' };
                if open.pop() != Some(expected) {
                    return None;
                }
                if open.is_empty() {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// First balanced object or array embedded in `text` that parses as JSON.
/// Candidates are tried in order of their opening bracket, so prose such as
/// `"Results for {topic}:"` ahead of the payload is skipped.
pub fn find_json_value(text: &str) -> Option<Value> {
    text.char_indices()
        .filter(|(_, ch)| matches!(ch, '{' | '['))
        .filter_map(|(start, _)| balanced_span(text, start))
        .find_map(|span| {
            serde_json::from_str::<Value>(span)
                .ok()
                .filter(|value| value.is_object() || value.is_array())
        })
}

/// Best-effort parse of an LLM answer into a JSON value: strip fences, try the
/// whole text, then fall back to the first embedded object or array.
pub fn parse_json_object(text: &str) -> Result<Value, ExtractError> {
    let body = strip_code_fences(text);

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if value.is_object() || value.is_array() {
            return Ok(value);
        }
    }

    find_json_value(body).ok_or(ExtractError::NoJsonObject)
}

/// Rating as a one-decimal string, or `"Not found"`.
pub fn normalize_rating(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if f.is_finite() && f >= 0.0 => format!("{:.1}", f),
            _ => NOT_FOUND.to_string(),
        },
        Some(Value::String(s)) => normalize_rating_str(s),
        _ => NOT_FOUND.to_string(),
    }
}

pub fn normalize_rating_str(raw: &str) -> String {
    RATING
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|f| format!("{:.1}", f))
        .unwrap_or_else(|| NOT_FOUND.to_string())
}

/// Review count as a string; absent or null becomes `"Not found"`.
pub fn normalize_total_reviews(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_u64() {
                i.to_string()
            } else if let Some(i) = n.as_i64() {
                i.to_string()
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 => format!("{}", f as i64),
                    _ => n.to_string(),
                }
            }
        }
        Some(Value::String(s)) if !is_placeholder(s) => s.trim().to_string(),
        _ => NOT_FOUND.to_string(),
    }
}

/// Adapter from any of the extractor's schema variants into canonical
/// [`ExtractionRecord`]s, applying per-domain defaults.
pub struct RecordNormalizer {
    domain: Domain,
}

/// Records recovered from one answer plus the count of entries that could not
/// be turned into a record.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub records: Vec<ExtractionRecord>,
    pub dropped: usize,
}

impl RecordNormalizer {
    pub fn new(domain: Domain) -> Self {
        Self { domain }
    }

    pub fn normalize(&self, value: &Value) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();

        for entry in collect_entries(value) {
            match self.normalize_entry(entry) {
                Some(record) => batch.records.push(record),
                None => batch.dropped += 1,
            }
        }

        batch
    }

    /// `None` when the entry is not an object or has no real name.
    pub fn normalize_entry(&self, entry: &Value) -> Option<ExtractionRecord> {
        let map = entry.as_object()?;

        let name = match map.get("name") {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return None,
        };
        // Records are merged by name, so a defaulted name would fuse
        // unrelated entities.
        if is_placeholder(&name) {
            return None;
        }

        let mut services = first_present(map, &["services", self.domain.list_key(), "products", "courses", "offerings"])
            .map(string_list)
            .unwrap_or_default();
        services.retain(|s| !is_placeholder(s));
        if services.is_empty() {
            services = self.domain.default_services();
        }

        let mut pricing = map.get("pricing").map(pricing_map).unwrap_or_default();
        if pricing.is_empty() {
            pricing = self.domain.default_pricing();
        }

        let contact = scalar_field(map, &["contact", "phone"], NOT_AVAILABLE);
        let website = scalar_field(map, &["website", "url"], NOT_AVAILABLE);

        let review_block = first_present(map, &["review_analysis", "reviews", "review_metadata"])
            .and_then(Value::as_object);

        let mut rating = normalize_rating(map.get("rating"));
        if rating == NOT_FOUND {
            rating = normalize_rating(review_block.and_then(|b| b.get("average_rating")));
        }

        let reviews = ReviewMetadata {
            total_reviews: normalize_total_reviews(review_value(review_block, map, &["total_reviews", "review_count"])),
            highlights: clean_list(review_value(review_block, map, &["highlights", "positive_points"])),
            concerns: clean_list(review_value(review_block, map, &["concerns", "negative_points"])),
        };

        let details = self.details(map, review_block);

        Some(ExtractionRecord {
            name,
            services,
            pricing,
            contact,
            website,
            rating,
            reviews,
            details,
        })
    }

    fn details(&self, map: &Map<String, Value>, review_block: Option<&Map<String, Value>>) -> EntityDetails {
        let features = map
            .get("product_details")
            .and_then(|d| d.get("features"))
            .or_else(|| map.get("features"))
            .and_then(Value::as_object)
            .map(|features| {
                features
                    .iter()
                    .map(|(key, value)| (key.trim().to_string(), clean_list(Some(value))))
                    .filter(|(key, list)| !is_placeholder(key) && !list.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let market = map.get("market_details").and_then(Value::as_object);
        let target_segment = market
            .and_then(|m| m.get("target_segment"))
            .and_then(scalar_text)
            .filter(|s| !is_placeholder(s))
            .unwrap_or_default();
        let key_competitors = clean_list(market.and_then(|m| m.get("key_competitors")));
        let sentiment = review_block
            .and_then(|b| b.get("customer_sentiment"))
            .or_else(|| map.get("sentiment"))
            .and_then(scalar_text)
            .filter(|s| !is_placeholder(s))
            .unwrap_or_default();

        EntityDetails {
            features,
            target_segment,
            key_competitors,
            sentiment,
        }
    }
}

fn collect_entries(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) if map.contains_key("name") => vec![value],
        Value::Object(map) => CONTAINER_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .map(|items| items.iter().collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn first_present<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find(|value| !value.is_null())
}

/// Review fields live under `review_analysis` but some answers put them at
/// the top level.
fn review_value<'a>(
    review_block: Option<&'a Map<String, Value>>,
    map: &'a Map<String, Value>,
    keys: &[&str],
) -> Option<&'a Value> {
    review_block
        .and_then(|block| first_present(block, keys))
        .or_else(|| first_present(map, keys))
}

fn scalar_field(map: &Map<String, Value>, keys: &[&str], default: &str) -> String {
    first_present(map, keys)
        .and_then(scalar_text)
        .filter(|s| !is_placeholder(s))
        .unwrap_or_else(|| default.to_string())
}

/// Text form of a loosely typed scalar. Objects and arrays are flattened to
/// their string members joined with ", ".
fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Object(map) => map
            .values()
            .filter_map(scalar_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Array(items) => items
            .iter()
            .filter_map(scalar_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null | Value::Bool(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Ordered, de-duplicated list of strings. A plain string is split on commas.
fn string_list(value: &Value) -> Vec<String> {
    let items: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(obj) => first_present(obj, &["name", "title"]).and_then(scalar_text),
                other => scalar_text(other),
            })
            .collect(),
        Value::String(s) => s.split(',').map(|part| part.trim().to_string()).collect(),
        Value::Number(n) => vec![n.to_string()],
        _ => Vec::new(),
    };

    let mut seen = Vec::with_capacity(items.len());
    for item in items {
        if !item.is_empty() && !seen.contains(&item) {
            seen.push(item);
        }
    }
    seen
}

fn clean_list(value: Option<&Value>) -> Vec<String> {
    let mut list = value.map(string_list).unwrap_or_default();
    list.retain(|item| !is_placeholder(item));
    list
}

fn pricing_map(value: &Value) -> IndexMap<String, String> {
    let mut pricing = IndexMap::new();

    match value {
        Value::Object(map) => {
            for (service, price) in map {
                let service = service.trim();
                if service.is_empty() {
                    continue;
                }
                if let Some(price) = price_text(price) {
                    pricing.entry(service.to_string()).or_insert(price);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter().filter_map(Value::as_object) {
                let service = first_present(item, &["service", "name", "course", "product"]).and_then(scalar_text);
                let price = first_present(item, &["price", "cost"]).and_then(price_text);
                if let (Some(service), Some(price)) = (service, price) {
                    pricing.entry(service).or_insert(price);
                }
            }
        }
        _ => {}
    }

    pricing
}

fn price_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => Some(CONTACT_FOR_PRICING.to_string()),
        other => scalar_text(other),
    }
}
