use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use thiserror::Error;

use super::batch::{append_in_batches, BatchError};
use super::config::SyncConfig;
use super::cursor::{format_cursor, SyncCursor};
use super::report::{Outcome, PassReport, SkipReason, SyncReport};
use crate::markdown::{
    compile_markdown, merge_note, page_to_markdown, remove_task_markers, split_front_matter,
    MergeAction, NoteFrontMatter,
};
use crate::notion::{
    Filter, NoteRecord, NotionError, ProjectRecord, RemoteStore, PROJECT_PROPERTY,
};
use crate::storage::{sanitize_file_name, StorageError, VaultFs};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Notion error: {0}")]
    Notion(#[from] NotionError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Batch(#[from] BatchError),
}

/// Runs push and pull passes between the vault and the remote databases
pub struct SyncManager {
    config: SyncConfig,
    store: Arc<dyn RemoteStore>,
    fs: Arc<dyn VaultFs>,
    cursor: SyncCursor,
}

impl SyncManager {
    pub fn new(config: SyncConfig, store: Arc<dyn RemoteStore>, fs: Arc<dyn VaultFs>) -> Self {
        let cursor = SyncCursor::new(config.cursor_path.clone());
        Self {
            config,
            store,
            fs,
            cursor,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// One full cycle: push local edits, pull remote notes, advance the cursor.
    ///
    /// Per-item failures are reported, not returned. The cursor is only
    /// written when both passes ran to completion.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let start = std::time::Instant::now();
        let previous_cursor = self.cursor.load(self.fs.as_ref()).await?;
        log::info!("Sync: starting, last sync {}", format_cursor(previous_cursor));

        let push = self.push_local_changes(previous_cursor).await?;
        let pull = self.pull_remote_notes().await?;

        let cursor = Utc::now();
        self.cursor.save(self.fs.as_ref(), cursor).await?;

        let report = SyncReport {
            previous_cursor,
            cursor,
            push,
            pull,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        log::info!("Sync: completed at {}: {}", format_cursor(cursor), report);
        Ok(report)
    }

    /// Push every vault note modified after `since` to its linked page,
    /// replacing the page's content.
    pub async fn push_local_changes(&self, since: DateTime<Utc>) -> Result<PassReport, SyncError> {
        let files = self.fs.list_markdown(&self.config.vault_path).await?;
        log::info!("Push: found {} markdown files", files.len());

        let mut report = PassReport::default();
        for path in files {
            let outcome = match self.push_file(&path, since).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!("Push: error processing {:?}: {}", path, e);
                    Outcome::Failed(e.to_string())
                }
            };
            report.record(path.display().to_string(), outcome);
        }
        Ok(report)
    }

    async fn push_file(&self, path: &Path, since: DateTime<Utc>) -> Result<Outcome, SyncError> {
        // The stored cursor only keeps milliseconds
        let modified = self.fs.modified(path).await?.trunc_subsecs(3);
        if modified <= since {
            log::debug!("Push: skipping {:?} (not modified since {})", path, format_cursor(since));
            return Ok(Outcome::Skipped(SkipReason::Unchanged));
        }

        log::info!("Push: processing {:?} (modified {})", path, format_cursor(modified));
        let Some(content) = self.fs.read_to_string(path).await? else {
            log::warn!("Push: {:?} disappeared before it could be read", path);
            return Ok(Outcome::Failed("file disappeared".to_string()));
        };

        let Some(note) = split_front_matter(&content) else {
            log::info!("Push: no front matter in {:?}, skipping", path);
            return Ok(Outcome::Skipped(SkipReason::NoFrontMatter));
        };
        let Some(page_id) = note.front_matter.notion_id() else {
            log::info!("Push: no notion_id in {:?}, skipping", path);
            return Ok(Outcome::Skipped(SkipReason::NotLinked));
        };

        if let Err(reason) = self.validate_page(page_id).await {
            log::warn!("Push: {:?} links to an invalid record: {}", path, reason);
            return Ok(Outcome::Skipped(SkipReason::InvalidRecord(reason)));
        }

        self.clear_page(page_id).await;

        let compiled = compile_markdown(note.body);
        if compiled.unterminated_fence {
            log::warn!("Push: {:?} ends inside a code fence, its content was not pushed", path);
        }

        let blocks = append_in_batches(
            self.store.as_ref(),
            page_id,
            &compiled.blocks,
            self.config.effective_batch_size(),
        )
        .await?;

        if blocks == 0 {
            log::info!("Push: empty content in {:?}, cleared {}", path, page_id);
        } else {
            log::info!("Push: synced {:?} to {} ({} blocks)", path, page_id, blocks);
        }
        Ok(Outcome::Pushed { blocks })
    }

    /// The id must resolve to a page; nothing is ever created remotely
    async fn validate_page(&self, page_id: &str) -> Result<(), String> {
        match self.store.retrieve_page(page_id).await {
            Ok(page) if page.is_page() => Ok(()),
            Ok(page) => Err(format!("{} is a {}, not a page", page_id, page.object)),
            Err(e) => Err(format!("{}: {}", page_id, e)),
        }
    }

    /// Best-effort removal of every child block of a page
    async fn clear_page(&self, page_id: &str) {
        let children = match self.store.list_children(page_id).await {
            Ok(children) => children,
            Err(e) => {
                log::warn!("Push: failed to list blocks of {}: {}", page_id, e);
                Vec::new()
            }
        };

        log::debug!("Push: deleting {} existing blocks of {}", children.len(), page_id);
        for child in &children {
            if let Err(e) = self.store.delete_block(&child.id).await {
                log::error!("Push: failed to delete block {}: {}", child.id, e);
            }
        }
    }

    /// Pull the notes of every matching project into per-project folders
    pub async fn pull_remote_notes(&self) -> Result<PassReport, SyncError> {
        let filter = self.config.project_filter.to_filter();
        let projects = self
            .store
            .query_database(&self.config.projects_database_id, filter.as_ref())
            .await?;
        log::info!("Pull: found {} projects", projects.len());

        let mut report = PassReport::default();
        for page in &projects {
            let project = ProjectRecord::from_page(page);
            if let Err(e) = self.pull_project(&project, &mut report).await {
                log::error!("Pull: failed to sync project '{}' ({}): {}", project.title, project.id, e);
                report.record(project.title.clone(), Outcome::Failed(e.to_string()));
            }
        }
        Ok(report)
    }

    async fn pull_project(
        &self,
        project: &ProjectRecord,
        report: &mut PassReport,
    ) -> Result<(), SyncError> {
        let folder = self.config.vault_path.join(sanitize_file_name(&project.title));
        if !self.fs.exists(&folder).await? {
            self.fs.create_dir_all(&folder).await?;
            log::info!("Pull: created folder {:?}", folder);
        }

        let filter = Filter::relation_contains(PROJECT_PROPERTY, &project.id);
        let notes = self
            .store
            .query_database(&self.config.notes_database_id, Some(&filter))
            .await?;
        log::info!("Pull: project '{}' has {} notes", project.title, notes.len());

        for page in &notes {
            let note = NoteRecord::from_page(page);
            let path = note_path(&folder, &note);
            let outcome = match self.pull_note(&note, &path).await {
                Ok(action) => Outcome::Written(action),
                Err(e) => {
                    log::error!("Pull: failed to sync note '{}' ({}): {}", note.title, note.id, e);
                    Outcome::Failed(e.to_string())
                }
            };
            report.record(path.display().to_string(), outcome);
        }
        Ok(())
    }

    async fn pull_note(&self, note: &NoteRecord, path: &Path) -> Result<MergeAction, SyncError> {
        log::debug!("Pull: syncing note '{}' ({})", note.title, note.id);

        let markdown = page_to_markdown(self.store.as_ref(), &note.id).await?;
        let body = remove_task_markers(Some(&markdown));
        if body.trim().is_empty() {
            log::warn!("Pull: no content for note '{}' ({}), properties only", note.title, note.id);
        }

        let project_name = self.project_name(note).await;
        let front_matter = NoteFrontMatter::from_note(note, project_name.as_deref()).render();

        let existing = self.fs.read_to_string(path).await?;
        let merged = merge_note(existing.as_deref(), &front_matter, &body);
        if merged.is_changed() {
            self.fs.write(path, &merged.content).await?;
            log::info!("Pull: note '{}' {:?} to {:?}", note.title, merged.action, path);
        } else {
            log::debug!("Pull: note '{}' unchanged", note.title);
        }
        Ok(merged.action)
    }

    /// Title of the note's project; lookup failures degrade to `None`
    async fn project_name(&self, note: &NoteRecord) -> Option<String> {
        let project_id = note.project_id.as_deref()?;
        match self.store.retrieve_page(project_id).await {
            Ok(page) => Some(ProjectRecord::from_page(&page).title),
            Err(e) => {
                log::error!("Pull: failed to fetch project name for {}: {}", project_id, e);
                None
            }
        }
    }
}

fn note_path(folder: &Path, note: &NoteRecord) -> PathBuf {
    folder.join(format!("{}.md", sanitize_file_name(&note.title)))
}
