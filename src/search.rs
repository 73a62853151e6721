use crate::error::{AppResult, Error};
use crate::models::SearchResultPage;
use crate::normalize;
use crate::search_log::SearchLog;
use crate::tmdb::{SearchMovie, TmdbApi};
use std::sync::Arc;
use tracing::{info, warn};

const MIN_QUERY_CHARS: usize = 2;
const MAX_QUERY_CHARS: usize = 100;
// Ceilings documented by TMDB for /search.
const MAX_PAGE: u32 = 500;
const MAX_TOTAL_RESULTS: u64 = 10_000;
const MISSING_DATE: &str = "0000-00-00";

#[derive(Clone)]
pub struct SearchService {
    tmdb: Arc<dyn TmdbApi>,
    log: Option<Arc<dyn SearchLog>>,
}

impl SearchService {
    pub fn new(tmdb: Arc<dyn TmdbApi>, log: Option<Arc<dyn SearchLog>>) -> Self {
        Self { tmdb, log }
    }

    pub async fn search(&self, query: &str, page: i64) -> AppResult<SearchResultPage> {
        let query = validate_query(query)?;
        let page = clamp_page(page);

        // Only first pages are logged so pagination does not repeat entries.
        // The line is written whether or not TMDB answers.
        if page == 1 {
            if let Some(log) = &self.log {
                if let Err(e) = log.append(query).await {
                    warn!("Failed to record search '{}': {}", query, e);
                }
            }
        }

        let mut response = self.tmdb.search_movies(query, page).await?;
        info!(
            "Search '{}' page {} returned {} results",
            query,
            page,
            response.results.len()
        );

        sort_by_release_desc(&mut response.results);
        Ok(SearchResultPage {
            success: true,
            query: query.to_string(),
            page,
            total_results: response.total_results.min(MAX_TOTAL_RESULTS),
            total_pages: response.total_pages.min(u64::from(MAX_PAGE)),
            results: response.results.iter().map(normalize::search_item).collect(),
        })
    }
}

pub fn validate_query(query: &str) -> AppResult<&str> {
    let query = query.trim();
    let len = query.chars().count();
    if len == 0 {
        return Err(Error::invalid("empty query"));
    }
    if len < MIN_QUERY_CHARS {
        return Err(Error::invalid("too short"));
    }
    if len > MAX_QUERY_CHARS {
        return Err(Error::invalid("too long"));
    }
    Ok(query)
}

pub fn clamp_page(page: i64) -> u32 {
    page.clamp(1, i64::from(MAX_PAGE)) as u32
}

// Missing dates sort last; ties keep provider order.
pub fn sort_by_release_desc(results: &mut [SearchMovie]) {
    fn key(movie: &SearchMovie) -> &str {
        match movie.release_date.as_deref().map(str::trim) {
            Some(d) if !d.is_empty() => d,
            _ => MISSING_DATE,
        }
    }
    results.sort_by(|a, b| key(b).cmp(key(a)));
}
