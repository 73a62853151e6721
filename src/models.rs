use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

// Written by the old storage layer when it stringified a list.
pub const LEGACY_ARRAY_SENTINEL: &str = "Array";

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ListField {
    Decoded(Vec<String>),
    /// Plain label text left behind by older rows (e.g. `"Drama, Crime"`).
    Legacy(String),
    #[default]
    Absent,
}

// Any JSON punctuation means a damaged encoding rather than a label.
fn is_plain_label(raw: &str) -> bool {
    !raw.contains(['[', ']', '{', '}', '"', '\\'])
}

impl ListField {
    /// Decodes a stored column. Text that fails to decode is empty unless it
    /// reads as a finished label such as `"Drama, Crime"`.
    pub fn from_stored(raw: Option<&str>) -> Self {
        let raw = match raw.map(str::trim) {
            Some(r) if !r.is_empty() => r,
            _ => return ListField::Absent,
        };
        if raw == LEGACY_ARRAY_SENTINEL {
            return ListField::Absent;
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => ListField::Decoded(
                items
                    .into_iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect(),
            ),
            Ok(Value::String(s)) => ListField::from_stored(Some(&s)),
            Ok(_) => ListField::Absent,
            Err(_) if is_plain_label(raw) => ListField::Legacy(raw.to_string()),
            Err(_) => ListField::Absent,
        }
    }

    pub fn to_stored(&self) -> String {
        match self {
            ListField::Decoded(items) => {
                serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
            }
            ListField::Legacy(text) => text.clone(),
            ListField::Absent => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MovieRecord {
    pub id: i64,
    pub title: String,
    pub original_title: String,
    pub overview: String,
    pub release_date: String,
    pub poster_path: String,
    pub backdrop_path: String,
    pub vote_average: f64,
    pub vote_count: i64,
    pub runtime: i64,
    pub genres: ListField,
    pub cast: ListField,
    pub director: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cache,
    Api,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayMovie {
    pub id: i64,
    pub title: String,
    pub original_title: String,
    pub year: String,
    pub overview: String,
    pub poster: String,
    pub backdrop: String,
    pub rating: String,
    pub vote_count: String,
    pub runtime: String,
    pub release_date: String,
    pub genres: String,
    pub director: String,
    pub cast: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailsResponse {
    pub success: bool,
    pub source: Source,
    pub movie: DisplayMovie,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResultItem {
    pub id: i64,
    pub title: String,
    pub year: String,
    pub overview: String,
    pub poster: String,
    pub rating: String,
    pub genres: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResultPage {
    pub success: bool,
    pub query: String,
    pub page: u32,
    pub total_results: u64,
    pub total_pages: u64,
    pub results: Vec<SearchResultItem>,
}
