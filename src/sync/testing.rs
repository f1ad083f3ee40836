//! In-memory collaborators for tests. Both record every call so tests can
//! assert on what was (and was not) touched.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::notion::{Block, Filter, NotionError, Page, RemoteBlock, RemoteStore};
use crate::storage::{Result as StorageResult, StorageError, VaultFs};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    QueryDatabase { database_id: String, filter: Option<Filter> },
    RetrievePage(String),
    ListChildren(String),
    DeleteBlock(String),
    AppendChildren { block_id: String, count: usize },
}

#[derive(Default)]
struct StoreState {
    databases: HashMap<String, Vec<Page>>,
    pages: HashMap<String, Page>,
    children: HashMap<String, Vec<RemoteBlock>>,
    appended: HashMap<String, Vec<Block>>,
    calls: Vec<StoreCall>,
    append_calls: usize,
    failing_queries: HashSet<String>,
    failing_pages: HashSet<String>,
    failing_children: HashSet<String>,
    failing_deletes: HashSet<String>,
    failing_append_call: Option<usize>,
}

fn injected(what: &str) -> NotionError {
    NotionError::Api {
        status: 500,
        code: "internal_server_error".to_string(),
        message: format!("injected failure: {}", what),
    }
}

/// `RemoteStore` double holding databases, pages and block children in memory
#[derive(Default)]
pub struct MockStore {
    state: Mutex<StoreState>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap()
    }

    /// Add a page to a database; it can also be retrieved by id
    pub fn add_to_database(&self, database_id: &str, page: Page) {
        let mut state = self.state();
        state.pages.insert(page.id.clone(), page.clone());
        state.databases.entry(database_id.to_string()).or_default().push(page);
    }

    pub fn add_page(&self, page: Page) {
        self.state().pages.insert(page.id.clone(), page);
    }

    pub fn set_children(&self, block_id: &str, children: Vec<RemoteBlock>) {
        self.state().children.insert(block_id.to_string(), children);
    }

    pub fn fail_query(&self, database_id: &str) {
        self.state().failing_queries.insert(database_id.to_string());
    }

    pub fn fail_retrieve(&self, page_id: &str) {
        self.state().failing_pages.insert(page_id.to_string());
    }

    pub fn fail_list_children(&self, block_id: &str) {
        self.state().failing_children.insert(block_id.to_string());
    }

    pub fn fail_delete(&self, block_id: &str) {
        self.state().failing_deletes.insert(block_id.to_string());
    }

    /// Fail the n-th append request (1-based)
    pub fn fail_append_call(&self, n: usize) {
        self.state().failing_append_call = Some(n);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    /// Blocks appended under `block_id`, in order
    pub fn appended(&self, block_id: &str) -> Vec<Block> {
        self.state().appended.get(block_id).cloned().unwrap_or_default()
    }

    /// Remaining children of `block_id` after deletes
    pub fn children_of(&self, block_id: &str) -> Vec<String> {
        self.state()
            .children
            .get(block_id)
            .map(|blocks| blocks.iter().map(|b| b.id.clone()).collect())
            .unwrap_or_default()
    }
}

fn matches_filter(page: &Page, filter: &Filter) -> bool {
    match filter {
        Filter::And(filters) => filters.iter().all(|f| matches_filter(page, f)),
        Filter::RelationContains { property, id } => page.relation_ids(property).contains(id),
        Filter::DateOnOrAfter { property, date } => page
            .properties
            .get(property)
            .and_then(|p| p.pointer("/date/start"))
            .and_then(Value::as_str)
            .map_or(false, |start| start >= date.as_str()),
    }
}

#[async_trait]
impl RemoteStore for MockStore {
    async fn query_database(
        &self,
        database_id: &str,
        filter: Option<&Filter>,
    ) -> Result<Vec<Page>, NotionError> {
        let mut state = self.state();
        state.calls.push(StoreCall::QueryDatabase {
            database_id: database_id.to_string(),
            filter: filter.cloned(),
        });
        if state.failing_queries.contains(database_id) {
            return Err(injected(database_id));
        }
        let pages = state.databases.get(database_id).cloned().unwrap_or_default();
        Ok(pages
            .into_iter()
            .filter(|page| filter.map_or(true, |f| matches_filter(page, f)))
            .collect())
    }

    async fn retrieve_page(&self, page_id: &str) -> Result<Page, NotionError> {
        let mut state = self.state();
        state.calls.push(StoreCall::RetrievePage(page_id.to_string()));
        if state.failing_pages.contains(page_id) {
            return Err(injected(page_id));
        }
        state
            .pages
            .get(page_id)
            .cloned()
            .ok_or_else(|| NotionError::NotFound(page_id.to_string()))
    }

    async fn list_children(&self, block_id: &str) -> Result<Vec<RemoteBlock>, NotionError> {
        let mut state = self.state();
        state.calls.push(StoreCall::ListChildren(block_id.to_string()));
        if state.failing_children.contains(block_id) {
            return Err(injected(block_id));
        }
        Ok(state.children.get(block_id).cloned().unwrap_or_default())
    }

    async fn delete_block(&self, block_id: &str) -> Result<(), NotionError> {
        let mut state = self.state();
        state.calls.push(StoreCall::DeleteBlock(block_id.to_string()));
        if state.failing_deletes.contains(block_id) {
            return Err(injected(block_id));
        }
        for children in state.children.values_mut() {
            children.retain(|b| b.id != block_id);
        }
        Ok(())
    }

    async fn append_children(&self, block_id: &str, blocks: &[Block]) -> Result<(), NotionError> {
        let mut state = self.state();
        state.calls.push(StoreCall::AppendChildren {
            block_id: block_id.to_string(),
            count: blocks.len(),
        });
        state.append_calls += 1;
        if state.failing_append_call == Some(state.append_calls) {
            return Err(injected(block_id));
        }
        state
            .appended
            .entry(block_id.to_string())
            .or_default()
            .extend_from_slice(blocks);
        Ok(())
    }
}

/// A page object with a title and the given extra properties
pub fn page(id: &str, title: &str, properties: Value) -> Page {
    let mut value = json!({
        "object": "page",
        "id": id,
        "created_time": "2025-05-13T08:00:00.000Z",
        "properties": {
            "Name": { "title": [{ "plain_text": title }] }
        }
    });
    if let (Some(target), Value::Object(extra)) = (value["properties"].as_object_mut(), properties) {
        target.extend(extra);
    }
    serde_json::from_value(value).unwrap()
}

pub fn project_page(id: &str, title: &str) -> Page {
    page(id, title, json!({}))
}

pub fn note_page(id: &str, title: &str, project_id: &str) -> Page {
    page(
        id,
        title,
        json!({
            "Type": { "select": { "name": "Idea" } },
            "Tags": { "multi_select": [{ "name": "rust" }] },
            "Project": { "relation": [{ "id": project_id }] }
        }),
    )
}

/// A child block with plain paragraph text
pub fn paragraph_block(id: &str, text: &str) -> RemoteBlock {
    serde_json::from_value(json!({
        "id": id,
        "type": "paragraph",
        "paragraph": { "rich_text": [{ "type": "text", "plain_text": text }] }
    }))
    .unwrap()
}

#[derive(Default)]
struct FsState {
    files: BTreeMap<PathBuf, (String, DateTime<Utc>)>,
    dirs: BTreeSet<PathBuf>,
    reads: HashMap<PathBuf, usize>,
    writes: Vec<PathBuf>,
    stats: Vec<PathBuf>,
    failing_writes: HashSet<PathBuf>,
    fail_listing: bool,
    clock: Option<DateTime<Utc>>,
}

/// `VaultFs` double with explicit modification times
#[derive(Default)]
pub struct MemoryFs {
    state: Mutex<FsState>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FsState> {
        self.state.lock().unwrap()
    }

    /// Seed a file with a given modification time
    pub fn insert(&self, path: impl Into<PathBuf>, content: &str, modified: DateTime<Utc>) {
        self.state()
            .files
            .insert(path.into(), (content.to_string(), modified));
    }

    /// Modification time given to later writes (defaults to now)
    pub fn set_clock(&self, time: DateTime<Utc>) {
        self.state().clock = Some(time);
    }

    pub fn fail_write(&self, path: impl Into<PathBuf>) {
        self.state().failing_writes.insert(path.into());
    }

    pub fn fail_listing(&self) {
        self.state().fail_listing = true;
    }

    pub fn content(&self, path: impl AsRef<Path>) -> Option<String> {
        self.state().files.get(path.as_ref()).map(|(c, _)| c.clone())
    }

    pub fn has_dir(&self, path: impl AsRef<Path>) -> bool {
        self.state().dirs.contains(path.as_ref())
    }

    pub fn read_count(&self, path: impl AsRef<Path>) -> usize {
        self.state().reads.get(path.as_ref()).copied().unwrap_or(0)
    }

    pub fn stat_count(&self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        self.state().stats.iter().filter(|p| p.as_path() == path).count()
    }

    pub fn writes(&self) -> Vec<PathBuf> {
        self.state().writes.clone()
    }
}

fn not_found(path: &Path) -> StorageError {
    StorageError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("{} not found", path.display()),
    ))
}

fn is_hidden(path: &Path, root: &Path) -> bool {
    path.strip_prefix(root)
        .map(|relative| {
            relative
                .components()
                .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
        })
        .unwrap_or(true)
}

#[async_trait]
impl VaultFs for MemoryFs {
    async fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        let mut state = self.state();
        for ancestor in path.ancestors().filter(|a| !a.as_os_str().is_empty()) {
            state.dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    async fn exists(&self, path: &Path) -> StorageResult<bool> {
        let state = self.state();
        Ok(state.dirs.contains(path) || state.files.contains_key(path))
    }

    async fn read_to_string(&self, path: &Path) -> StorageResult<Option<String>> {
        let mut state = self.state();
        *state.reads.entry(path.to_path_buf()).or_default() += 1;
        Ok(state.files.get(path).map(|(content, _)| content.clone()))
    }

    async fn write(&self, path: &Path, contents: &str) -> StorageResult<()> {
        let mut state = self.state();
        if state.failing_writes.contains(path) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "injected write failure",
            )));
        }
        let modified = state.clock.unwrap_or_else(Utc::now);
        state.writes.push(path.to_path_buf());
        state
            .files
            .insert(path.to_path_buf(), (contents.to_string(), modified));
        Ok(())
    }

    async fn modified(&self, path: &Path) -> StorageResult<DateTime<Utc>> {
        let mut state = self.state();
        state.stats.push(path.to_path_buf());
        state
            .files
            .get(path)
            .map(|(_, modified)| *modified)
            .ok_or_else(|| not_found(path))
    }

    async fn list_markdown(&self, root: &Path) -> StorageResult<Vec<PathBuf>> {
        let state = self.state();
        if state.fail_listing {
            return Err(not_found(root));
        }
        Ok(state
            .files
            .keys()
            .filter(|p| p.starts_with(root) && !is_hidden(p, root))
            .filter(|p| p.extension().map_or(false, |ext| ext == "md"))
            .cloned()
            .collect())
    }
}
