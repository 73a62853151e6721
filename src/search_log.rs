use crate::error::AppResult;
use async_trait::async_trait;
use chrono::Local;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const LINE_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

#[async_trait]
pub trait SearchLog: Send + Sync {
    async fn append(&self, query: &str) -> AppResult<()>;
    async fn recent(&self, limit: usize) -> AppResult<Vec<String>>;
}

#[derive(Debug)]
pub struct FileSearchLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSearchLog {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn format_line(query: &str) -> String {
    // Line breaks in the query would split the entry.
    let query: String = query
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    format!("{} - {}\n", Local::now().format(LINE_TIMESTAMP_FORMAT), query)
}

#[async_trait]
impl SearchLog for FileSearchLog {
    async fn append(&self, query: &str) -> AppResult<()> {
        let line = format_line(query);
        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> AppResult<Vec<String>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .rev()
            .take(limit)
            .map(|l| l.to_string())
            .collect())
    }
}
