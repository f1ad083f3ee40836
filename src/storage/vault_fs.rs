use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use glob::{MatchOptions, Pattern};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Glob error: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Invalid path: {0}")]
    InvalidPath(PathBuf),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// File operations the sync engine performs against the local vault
#[async_trait]
pub trait VaultFs: Send + Sync {
    /// Recursively create a directory; succeeds if it already exists
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read a UTF-8 file. A missing file is `Ok(None)`.
    async fn read_to_string(&self, path: &Path) -> Result<Option<String>>;

    async fn write(&self, path: &Path, contents: &str) -> Result<()>;

    /// Last modification time
    async fn modified(&self, path: &Path) -> Result<DateTime<Utc>>;

    /// Every `*.md` file below `root`, sorted. Hidden files and folders
    /// (such as `.obsidian` and `.trash`) are not listed.
    async fn list_markdown(&self, root: &Path) -> Result<Vec<PathBuf>>;
}

/// `VaultFs` backed by the local disk
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

#[async_trait]
impl VaultFs for LocalFs {
    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn read_to_string(&self, path: &Path) -> Result<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, path: &Path, contents: &str) -> Result<()> {
        tokio::fs::write(path, contents).await?;
        Ok(())
    }

    async fn modified(&self, path: &Path) -> Result<DateTime<Utc>> {
        let metadata = tokio::fs::metadata(path).await?;
        Ok(DateTime::<Utc>::from(metadata.modified()?))
    }

    async fn list_markdown(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let root_str = root
            .to_str()
            .ok_or_else(|| StorageError::InvalidPath(root.to_path_buf()))?;
        let pattern = format!("{}/**/*.md", Pattern::escape(root_str.trim_end_matches('/')));

        let files = tokio::task::spawn_blocking(move || -> Result<Vec<PathBuf>> {
            let options = MatchOptions {
                require_literal_leading_dot: true,
                ..MatchOptions::new()
            };
            let mut files = Vec::new();
            for entry in glob::glob_with(&pattern, options)? {
                let path = entry?;
                if path.is_file() {
                    files.push(path);
                }
            }
            files.sort();
            Ok(files)
        })
        .await??;

        Ok(files)
    }
}

/// Make a record title safe to use as a single path component
pub fn sanitize_file_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '-',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "Untitled".to_string()
    } else {
        cleaned.to_string()
    }
}
