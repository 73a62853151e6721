use crate::error::{AppResult, Error};
use crate::models::{ListField, MovieRecord};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

// `CURRENT_TIMESTAMP` layout, so rows written by the column default parse too.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS movies (
    id INTEGER PRIMARY KEY,
    tmdb_id INTEGER UNIQUE,
    title TEXT NOT NULL,
    original_title TEXT,
    overview TEXT,
    release_date TEXT,
    poster_path TEXT,
    backdrop_path TEXT,
    vote_average REAL,
    vote_count INTEGER,
    genres TEXT,
    runtime INTEGER,
    director TEXT,
    "cast" TEXT,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_movies_tmdb_id ON movies(tmdb_id);
"#;

#[async_trait]
pub trait MovieStore: Send + Sync {
    async fn get(&self, id: i64) -> AppResult<Option<MovieRecord>>;
    /// Full replace of the row for `record.id`; stamps a fresh `updated_at`.
    async fn upsert(&self, record: &MovieRecord) -> AppResult<()>;
    async fn count(&self) -> AppResult<u64>;
}

#[derive(Clone)]
pub struct SqliteMovieStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteMovieStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteMovieStore")
            .field("path", &self.path)
            .finish()
    }
}

impl SqliteMovieStore {
    pub fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA)?;
        info!("Opened movie store at {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn with_conn<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> AppResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| Error::Store("connection mutex poisoned".to_string()))?;
            f(&guard)
        })
        .await?
    }

    pub(crate) async fn upsert_at(&self, record: &MovieRecord, at: DateTime<Utc>) -> AppResult<()> {
        let id = record.id;
        let record = record.clone();
        let stamp = at.format(TIMESTAMP_FORMAT).to_string();
        self.with_conn(move |conn| {
            conn.execute(
                r#"INSERT OR REPLACE INTO movies
                   (tmdb_id, title, original_title, overview, release_date, poster_path,
                    backdrop_path, vote_average, vote_count, genres, runtime, director, "cast", updated_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"#,
                params![
                    record.id,
                    record.title,
                    record.original_title,
                    record.overview,
                    record.release_date,
                    record.poster_path,
                    record.backdrop_path,
                    record.vote_average,
                    record.vote_count,
                    record.genres.to_stored(),
                    record.runtime,
                    record.director.clone().unwrap_or_default(),
                    record.cast.to_stored(),
                    stamp,
                ],
            )?;
            Ok(())
        })
        .await?;
        debug!(tmdb_id = id, "Stored movie record");
        Ok(())
    }
}

fn row_to_record(row: &Row) -> rusqlite::Result<MovieRecord> {
    let genres: Option<String> = row.get("genres")?;
    let cast: Option<String> = row.get("cast")?;
    let director: Option<String> = row.get("director")?;
    let updated_at: Option<String> = row.get("updated_at")?;
    Ok(MovieRecord {
        id: row.get("tmdb_id")?,
        title: row.get("title")?,
        original_title: row.get::<_, Option<String>>("original_title")?.unwrap_or_default(),
        overview: row.get::<_, Option<String>>("overview")?.unwrap_or_default(),
        release_date: row.get::<_, Option<String>>("release_date")?.unwrap_or_default(),
        poster_path: row.get::<_, Option<String>>("poster_path")?.unwrap_or_default(),
        backdrop_path: row.get::<_, Option<String>>("backdrop_path")?.unwrap_or_default(),
        vote_average: row.get::<_, Option<f64>>("vote_average")?.unwrap_or_default(),
        vote_count: row.get::<_, Option<i64>>("vote_count")?.unwrap_or_default(),
        runtime: row.get::<_, Option<i64>>("runtime")?.unwrap_or_default(),
        genres: ListField::from_stored(genres.as_deref()),
        cast: ListField::from_stored(cast.as_deref()),
        director: director.filter(|d| !d.trim().is_empty()),
        updated_at: updated_at.as_deref().and_then(parse_timestamp),
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

#[async_trait]
impl MovieStore for SqliteMovieStore {
    async fn get(&self, id: i64) -> AppResult<Option<MovieRecord>> {
        self.with_conn(move |conn| {
            let record = conn
                .query_row(
                    r#"SELECT tmdb_id, title, original_title, overview, release_date, poster_path,
                              backdrop_path, vote_average, vote_count, genres, runtime, director,
                              "cast", updated_at
                       FROM movies WHERE tmdb_id = ?1"#,
                    params![id],
                    row_to_record,
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn upsert(&self, record: &MovieRecord) -> AppResult<()> {
        self.upsert_at(record, Utc::now()).await
    }

    async fn count(&self) -> AppResult<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM movies", [], |row| row.get(0))?;
            Ok(n.max(0) as u64)
        })
        .await
    }
}
