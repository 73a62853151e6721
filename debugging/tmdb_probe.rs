//! Query TMDB with the service's client and print the normalized output.
//! Usage:
//!   cargo run --bin tmdb_probe -- movie <tmdb_id>
//!   cargo run --bin tmdb_probe -- search <query> [page]
//! Requires TMDB_API_KEY in the environment (.env supported).
//! Nothing is written to the movie store or the search log.

use anyhow::{Context, Result};
use cinexplorer::details::enrich;
use cinexplorer::normalize::display_movie;
use cinexplorer::search::SearchService;
use cinexplorer::tmdb::{TmdbApi, TmdbClient};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
enum ProbeKind {
    Movie,
    Search,
}

impl FromStr for ProbeKind {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "movie" => Ok(ProbeKind::Movie),
            "search" => Ok(ProbeKind::Search),
            _ => Err(anyhow::anyhow!("probe kind must be 'movie' or 'search'")),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    let mut args = env::args().skip(1);
    let kind: ProbeKind = args
        .next()
        .context("usage: tmdb_probe <movie|search> <id|query> [page]")?
        .parse()?;
    let target = args.next().context("missing movie id or query")?;

    let api_key = env::var("TMDB_API_KEY").context("TMDB_API_KEY not set")?;
    let language = env::var("TMDB_LANGUAGE").unwrap_or_else(|_| "en-US".to_string());
    let client = TmdbClient::new(&api_key, &language)?;

    let output = match kind {
        ProbeKind::Movie => {
            let id: i64 = target.parse().context("movie id must be an integer")?;
            let details = client.movie_details(id).await?;
            serde_json::to_value(display_movie(&enrich(details)))?
        }
        ProbeKind::Search => {
            let page: i64 = args.next().map(|p| p.parse()).transpose()?.unwrap_or(1);
            let search = SearchService::new(Arc::new(client), None);
            serde_json::to_value(search.search(&target, page).await?)?
        }
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
