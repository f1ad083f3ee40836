use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::storage::{Result, VaultFs};

/// Persisted timestamp of the last completed run. Local files modified at or
/// before it are not pushed again.
#[derive(Debug, Clone)]
pub struct SyncCursor {
    path: PathBuf,
}

impl SyncCursor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the cursor. A missing or unparseable file means "never synced".
    pub async fn load(&self, fs: &dyn VaultFs) -> Result<DateTime<Utc>> {
        let Some(content) = fs.read_to_string(&self.path).await? else {
            log::info!("No sync cursor at {:?}, starting from the beginning", self.path);
            return Ok(DateTime::<Utc>::UNIX_EPOCH);
        };

        match DateTime::parse_from_rfc3339(content.trim()) {
            Ok(cursor) => Ok(cursor.with_timezone(&Utc)),
            Err(e) => {
                log::warn!(
                    "Ignoring unreadable sync cursor {:?} ({}), starting from the beginning",
                    self.path,
                    e
                );
                Ok(DateTime::<Utc>::UNIX_EPOCH)
            }
        }
    }

    pub async fn save(&self, fs: &dyn VaultFs, cursor: DateTime<Utc>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs.create_dir_all(parent).await?;
        }
        fs.write(&self.path, &format_cursor(cursor)).await
    }
}

/// RFC 3339 UTC with millisecond precision
pub fn format_cursor(cursor: DateTime<Utc>) -> String {
    cursor.to_rfc3339_opts(SecondsFormat::Millis, true)
}
