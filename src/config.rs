use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_LANGUAGE: &str = "en-US";
const DEFAULT_DATABASE_PATH: &str = "data/cinexplorer.db";
const DEFAULT_SEARCH_LOG_PATH: &str = "logs/search.log";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct Config {
    pub tmdb_api_key: String,
    pub tmdb_language: String,
    pub tmdb_base_url: Option<String>,
    pub database_path: PathBuf,
    pub search_log_path: PathBuf,
    pub log_searches: bool,
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let tmdb_api_key = env::var("TMDB_API_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .context("TMDB_API_KEY not set")?;
        let bind_raw = var_or("BIND_ADDR", DEFAULT_BIND_ADDR);
        let bind_addr = bind_raw
            .parse()
            .with_context(|| format!("BIND_ADDR '{}' is not a socket address", bind_raw))?;
        let log_raw = var_or("LOG_SEARCHES", "true");
        let log_searches = parse_bool(&log_raw)
            .with_context(|| format!("LOG_SEARCHES '{}' is not a boolean", log_raw))?;

        Ok(Self {
            tmdb_api_key,
            tmdb_language: var_or("TMDB_LANGUAGE", DEFAULT_LANGUAGE),
            tmdb_base_url: env::var("TMDB_BASE_URL").ok().filter(|s| !s.is_empty()),
            database_path: PathBuf::from(var_or("DATABASE_PATH", DEFAULT_DATABASE_PATH)),
            search_log_path: PathBuf::from(var_or("SEARCH_LOG_PATH", DEFAULT_SEARCH_LOG_PATH)),
            log_searches,
            bind_addr,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
