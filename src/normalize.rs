use crate::models::{
    DisplayMovie, ListField, MovieRecord, SearchResultItem, LEGACY_ARRAY_SENTINEL,
};
use crate::tmdb::SearchMovie;
use chrono::{DateTime, NaiveDate};

pub const POSTER_BASE: &str = "https://image.tmdb.org/t/p/w500";
pub const BACKDROP_BASE: &str = "https://image.tmdb.org/t/p/w780";
pub const POSTER_PLACEHOLDER: &str = "https://placehold.co/300x450/a7e3d0/0a5045?text=No+image";

pub const UNSPECIFIED: &str = "unspecified";
pub const UNCLASSIFIED: &str = "unclassified";
pub const UNKNOWN_DATE: &str = "unknown date";
pub const INVALID_DATE: &str = "invalid date";
pub const NO_YEAR: &str = "N/A";

const MAX_GENRES: usize = 3;
const MAX_CAST: usize = 5;
const OVERVIEW_LIMIT: usize = 150;

pub fn display_movie(record: &MovieRecord) -> DisplayMovie {
    DisplayMovie {
        id: record.id,
        title: record.title.clone(),
        original_title: record.original_title.clone(),
        year: year_from_date(&record.release_date),
        overview: record.overview.clone(),
        poster: poster_url(&record.poster_path),
        backdrop: backdrop_url(&record.backdrop_path),
        rating: format_rating(Some(record.vote_average)),
        vote_count: group_thousands(record.vote_count),
        runtime: format_duration(record.runtime),
        release_date: format_release_date(&record.release_date),
        genres: list_label(&record.genres, MAX_GENRES, UNCLASSIFIED),
        director: record
            .director
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(UNSPECIFIED)
            .to_string(),
        cast: list_label(&record.cast, MAX_CAST, UNSPECIFIED),
    }
}

pub fn search_item(movie: &SearchMovie) -> SearchResultItem {
    let release_date = movie.release_date.as_deref().unwrap_or_default();
    SearchResultItem {
        id: movie.id,
        title: movie.title.clone().unwrap_or_default(),
        year: year_from_date(release_date),
        overview: truncate_overview(movie.overview.as_deref().unwrap_or_default()),
        poster: poster_url(movie.poster_path.as_deref().unwrap_or_default()),
        rating: format_rating(movie.vote_average),
        genres: genre_labels(&movie.genre_ids),
    }
}

fn parse_release_date(date: &str) -> Option<NaiveDate> {
    let date = date.trim();
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(date).ok().map(|d| d.date_naive()))
}

pub fn year_from_date(date: &str) -> String {
    parse_release_date(date)
        .map(|d| d.format("%Y").to_string())
        .unwrap_or_else(|| NO_YEAR.to_string())
}

pub fn format_release_date(date: &str) -> String {
    if date.trim().is_empty() {
        return UNKNOWN_DATE.to_string();
    }
    match parse_release_date(date) {
        Some(d) => d.format("%d/%m/%Y").to_string(),
        None => INVALID_DATE.to_string(),
    }
}

pub fn format_duration(minutes: i64) -> String {
    if minutes <= 0 {
        return UNSPECIFIED.to_string();
    }
    let (hours, mins) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{}h{:02}", hours, mins)
    } else {
        format!("{} min", minutes)
    }
}

pub fn format_rating(vote_average: Option<f64>) -> String {
    let v = vote_average.filter(|v| v.is_finite()).unwrap_or(0.0);
    format!("{:.1}", v)
}

pub fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn truncate_overview(overview: &str) -> String {
    if overview.chars().count() <= OVERVIEW_LIMIT {
        return overview.to_string();
    }
    let mut out: String = overview.chars().take(OVERVIEW_LIMIT).collect();
    out.push_str("...");
    out
}

fn is_absolute_url(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

pub fn poster_url(path: &str) -> String {
    let path = path.trim();
    if path.is_empty() {
        POSTER_PLACEHOLDER.to_string()
    } else if is_absolute_url(path) {
        path.to_string()
    } else {
        format!("{POSTER_BASE}{path}")
    }
}

pub fn backdrop_url(path: &str) -> String {
    let path = path.trim();
    if path.is_empty() {
        String::new()
    } else if is_absolute_url(path) {
        path.to_string()
    } else {
        format!("{BACKDROP_BASE}{path}")
    }
}

/// Reduces an absolute image URL to the relative path the store keeps.
///
/// TMDB image URLs carry a `/t/p/<size>` prefix that is dropped too, so the
/// display side can rebuild the URL with its own size.
pub fn relative_image_path(path: &str) -> String {
    if !is_absolute_url(path) {
        return path.to_string();
    }
    let Ok(url) = reqwest::Url::parse(path) else {
        return String::new();
    };
    let full = url.path();
    if let Some(rest) = full.strip_prefix("/t/p/") {
        if let Some(idx) = rest.find('/') {
            return rest[idx..].to_string();
        }
    }
    full.to_string()
}

// A legacy plain label is already display-shaped and passes through.
pub fn list_label(field: &ListField, max: usize, default: &str) -> String {
    match field {
        ListField::Decoded(items) => {
            let valid: Vec<&str> = items
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty() && *s != LEGACY_ARRAY_SENTINEL)
                .take(max)
                .collect();
            if valid.is_empty() {
                default.to_string()
            } else {
                valid.join(", ")
            }
        }
        ListField::Legacy(text) => {
            let text = text.trim();
            if text.is_empty() || text == LEGACY_ARRAY_SENTINEL {
                default.to_string()
            } else {
                text.to_string()
            }
        }
        ListField::Absent => default.to_string(),
    }
}

fn genre_name(id: i64) -> Option<&'static str> {
    let name = match id {
        28 => "Action",
        12 => "Adventure",
        16 => "Animation",
        35 => "Comedy",
        80 => "Crime",
        99 => "Documentary",
        18 => "Drama",
        10751 => "Family",
        14 => "Fantasy",
        36 => "History",
        27 => "Horror",
        10402 => "Music",
        9648 => "Mystery",
        10749 => "Romance",
        878 => "Science Fiction",
        10770 => "TV Movie",
        53 => "Thriller",
        10752 => "War",
        37 => "Western",
        _ => return None,
    };
    Some(name)
}

pub fn genre_labels(ids: &[i64]) -> String {
    let names: Vec<&str> = ids
        .iter()
        .take(MAX_GENRES)
        .filter_map(|id| genre_name(*id))
        .collect();
    if names.is_empty() {
        UNCLASSIFIED.to_string()
    } else {
        names.join(", ")
    }
}
