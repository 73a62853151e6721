use crate::error::{AppResult, Error};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const TMDB_BASE: &str = "https://api.themoviedb.org/3";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
// TMDB's "The resource you requested could not be found."
const TMDB_NOT_FOUND_CODE: i64 = 34;

#[async_trait]
pub trait TmdbApi: Send + Sync {
    async fn search_movies(&self, query: &str, page: u32) -> AppResult<SearchResponse>;
    async fn movie_details(&self, id: i64) -> AppResult<MovieDetails>;
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
    language: String,
    base_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub results: Vec<SearchMovie>,
    #[serde(default)]
    pub total_results: u64,
    #[serde(default)]
    pub total_pages: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchMovie {
    #[serde(default)]
    pub id: i64,
    pub title: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub poster_path: Option<String>,
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub genre_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovieDetails {
    #[serde(default)]
    pub id: i64,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i64>,
    pub runtime: Option<i64>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    pub credits: Option<Credits>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Genre {
    pub id: Option<i64>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credits {
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default)]
    pub crew: Vec<CrewMember>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CastMember {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrewMember {
    pub job: Option<String>,
    pub name: Option<String>,
}

impl TmdbClient {
    pub fn new(api_key: &str, language: &str) -> anyhow::Result<Self> {
        let user_agent = format!("cinexplorer/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(user_agent)
            .build()
            .context("Failed to build TMDB HTTP client")?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            language: language.to_string(),
            base_url: TMDB_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    // `lookup` marks single-resource requests, where TMDB's "not found" means
    // the id does not exist rather than a broken endpoint.
    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str, lookup: bool) -> AppResult<T> {
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::ProviderUnavailable(format!("request failed: {}", e)))?;
        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| Error::ProviderUnavailable(format!("reading body failed: {}", e)))?;
        debug!(%status, bytes = text.len(), "TMDB response received");

        let value: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(_) if status.is_server_error() => {
                return Err(Error::ProviderUnavailable(format!("HTTP {}", status)));
            }
            Err(e) => {
                return Err(Error::ProviderBadResponse(format!("JSON parse failed: {}", e)));
            }
        };
        if let Some(err) = provider_failure(status, &value, lookup) {
            return Err(err);
        }
        serde_json::from_value(value)
            .map_err(|e| Error::ProviderBadResponse(format!("unexpected payload shape: {}", e)))
    }
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn search_movies(&self, query: &str, page: u32) -> AppResult<SearchResponse> {
        let url = format!(
            "{}/search/movie?api_key={}&query={}&language={}&page={}&include_adult=false",
            self.base_url,
            self.api_key,
            urlencoding::encode(query),
            urlencoding::encode(&self.language),
            page
        );
        self.get_json(&url, false).await
    }

    async fn movie_details(&self, id: i64) -> AppResult<MovieDetails> {
        let url = format!(
            "{}/movie/{id}?api_key={}&language={}&append_to_response=credits",
            self.base_url,
            self.api_key,
            urlencoding::encode(&self.language)
        );
        self.get_json(&url, true).await
    }
}

fn provider_failure(status: StatusCode, body: &Value, lookup: bool) -> Option<Error> {
    let code = body.get("status_code").and_then(Value::as_i64);
    if code.is_none() && status.is_success() {
        return None;
    }
    if lookup && (status == StatusCode::NOT_FOUND || code == Some(TMDB_NOT_FOUND_CODE)) {
        return Some(Error::NotFound);
    }
    let message = body
        .get("status_message")
        .and_then(Value::as_str)
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("HTTP {}", status));
    Some(Error::ProviderError(message))
}
