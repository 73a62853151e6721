use crate::config::Config;
use crate::details::DetailResolver;
use crate::error::Error;
use crate::search::SearchService;
use crate::search_log::{FileSearchLog, SearchLog};
use crate::store::{MovieStore, SqliteMovieStore};
use crate::tmdb::{TmdbApi, TmdbClient};
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const DEFAULT_RECENT_SEARCHES: usize = 10;
const MAX_RECENT_SEARCHES: usize = 50;

#[derive(Clone)]
pub struct AppState {
    pub search: SearchService,
    pub details: DetailResolver,
    pub store: Arc<dyn MovieStore>,
    pub search_log: Option<Arc<dyn SearchLog>>,
    pub database_path: Option<PathBuf>,
    pub search_log_path: Option<PathBuf>,
}

impl AppState {
    pub fn new(
        tmdb: Arc<dyn TmdbApi>,
        store: Arc<dyn MovieStore>,
        search_log: Option<Arc<dyn SearchLog>>,
    ) -> Self {
        Self {
            search: SearchService::new(tmdb.clone(), search_log.clone()),
            details: DetailResolver::new(tmdb, store.clone()),
            store,
            search_log,
            database_path: None,
            search_log_path: None,
        }
    }
}

pub async fn run_server(config: Config) -> Result<()> {
    let mut client = TmdbClient::new(&config.tmdb_api_key, &config.tmdb_language)?;
    if let Some(base) = config.tmdb_base_url.as_deref() {
        info!("Using TMDB base URL {}", base);
        client = client.with_base_url(base);
    }
    let tmdb: Arc<dyn TmdbApi> = Arc::new(client);

    let store = SqliteMovieStore::open(&config.database_path)?;
    let store: Arc<dyn MovieStore> = Arc::new(store);

    let search_log: Option<Arc<dyn SearchLog>> = if config.log_searches {
        let log = FileSearchLog::new(&config.search_log_path)?;
        info!("Recording searches to {}", log.path().display());
        Some(Arc::new(log))
    } else {
        info!("Search logging disabled");
        None
    };

    let mut state = AppState::new(tmdb, store, search_log);
    state.database_path = Some(config.database_path.clone());
    if config.log_searches {
        state.search_log_path = Some(config.search_log_path.clone());
    }

    let app = build_router(state);

    info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/search", get(search))
        .route("/api/movie/:id", get(movie))
        .route("/api/searches/recent", get(recent_searches))
        .route("/api/stats", get(stats))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::NotFound => (StatusCode::NOT_FOUND, "movie not found".to_string()),
            Error::ProviderError(msg) => (StatusCode::BAD_GATEWAY, format!("TMDB: {}", msg)),
            Error::ProviderBadResponse(_) => (
                StatusCode::BAD_GATEWAY,
                "invalid response from TMDB".to_string(),
            ),
            Error::ProviderUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "unable to reach TMDB".to_string(),
            ),
            Error::Store(_) | Error::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
    page: Option<String>,
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, ApiError> {
    let query = params.q.unwrap_or_default();
    let page = parse_int(params.page.as_deref()).unwrap_or(1);
    let results = state.search.search(&query, page).await?;
    Ok(Json(json!(results)))
}

async fn movie(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_int(Some(raw_id.as_str())).unwrap_or(0);
    let details = state.details.movie_details(id).await?;
    Ok(Json(json!(details)))
}

#[derive(Debug, Deserialize)]
struct RecentParams {
    limit: Option<String>,
}

async fn recent_searches(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> Result<Json<Value>, ApiError> {
    let limit = parse_int(params.limit.as_deref())
        .map(|l| l.clamp(1, MAX_RECENT_SEARCHES as i64) as usize)
        .unwrap_or(DEFAULT_RECENT_SEARCHES);
    let searches = match &state.search_log {
        Some(log) => log.recent(limit).await?,
        None => Vec::new(),
    };
    Ok(Json(json!({ "success": true, "searches": searches })))
}

async fn stats(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let movies_in_db = state.store.count().await?;
    Ok(Json(json!({
        "success": true,
        "stats": {
            "movies_in_db": movies_in_db,
            "logs_enabled": state.search_log.is_some(),
            "log_file_exists": file_exists(state.search_log_path.as_ref()).await,
            "db_file_exists": file_exists(state.database_path.as_ref()).await,
        }
    })))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "api_configured": true,
    }))
}

async fn file_exists(path: Option<&PathBuf>) -> bool {
    match path {
        Some(p) => tokio::fs::try_exists(p).await.unwrap_or(false),
        None => false,
    }
}

fn parse_int(raw: Option<&str>) -> Option<i64> {
    raw.map(str::trim).and_then(|s| s.parse().ok())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
