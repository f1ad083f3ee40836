use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::batch::{DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};
use crate::notion::{
    Filter, CREATED_PROPERTY, DEFAULT_API_BASE_URL, DEFAULT_NOTION_VERSION, TAG_PROPERTY,
};

/// Environment variable overriding the API token
pub const TOKEN_ENV: &str = "NOTION_TOKEN";
/// Environment variable overriding the vault location
pub const VAULT_ENV: &str = "TETHER_VAULT_PATH";

const CONFIG_DIR_NAME: &str = "tether";
const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_CURSOR_FILE: &str = "last_sync.txt";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Could not determine the user config directory")]
    NoConfigDir,
}

/// Restricts which projects are pulled. Both parts are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectFilter {
    /// Only projects whose `Created` date is on or after this date
    pub created_on_or_after: Option<String>,
    /// Only projects whose `Tag` relation contains this page id
    pub tag_relation_id: Option<String>,
}

impl ProjectFilter {
    /// Store filter for the projects query, `None` when unrestricted
    pub fn to_filter(&self) -> Option<Filter> {
        let mut parts = Vec::new();
        if let Some(date) = non_empty(&self.created_on_or_after) {
            parts.push(Filter::DateOnOrAfter {
                property: CREATED_PROPERTY.to_string(),
                date: date.to_string(),
            });
        }
        if let Some(id) = non_empty(&self.tag_relation_id) {
            parts.push(Filter::relation_contains(TAG_PROPERTY, id));
        }

        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Filter::And(parts)),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Settings for one sync run, built once at startup and handed to every
/// component
#[derive(Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub notion_token: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_notion_version")]
    pub notion_version: String,
    #[serde(default)]
    pub projects_database_id: String,
    #[serde(default)]
    pub notes_database_id: String,
    #[serde(default)]
    pub vault_path: PathBuf,
    /// Where the sync cursor is kept. Relative paths resolve against the
    /// config file's directory.
    #[serde(default = "default_cursor_path")]
    pub cursor_path: PathBuf,
    /// Blocks per append request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub project_filter: ProjectFilter,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_notion_version() -> String {
    DEFAULT_NOTION_VERSION.to_string()
}

fn default_cursor_path() -> PathBuf {
    PathBuf::from(DEFAULT_CURSOR_FILE)
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            notion_token: String::new(),
            api_base_url: default_api_base_url(),
            notion_version: default_notion_version(),
            projects_database_id: String::new(),
            notes_database_id: String::new(),
            vault_path: PathBuf::new(),
            cursor_path: default_cursor_path(),
            batch_size: DEFAULT_BATCH_SIZE,
            project_filter: ProjectFilter::default(),
        }
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("notion_token", &"<redacted>")
            .field("api_base_url", &self.api_base_url)
            .field("notion_version", &self.notion_version)
            .field("projects_database_id", &self.projects_database_id)
            .field("notes_database_id", &self.notes_database_id)
            .field("vault_path", &self.vault_path)
            .field("cursor_path", &self.cursor_path)
            .field("batch_size", &self.batch_size)
            .field("project_filter", &self.project_filter)
            .finish()
    }
}

impl SyncConfig {
    /// `<config dir>/tether/config.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load the config file, apply environment overrides and validate.
    ///
    /// Uses [`SyncConfig::default_path`] when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        let mut config = Self::from_toml_str(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        if let Some(dir) = path.parent() {
            config.resolve_relative_paths(dir);
        }
        config.validate()?;

        log::debug!("Loaded config from {:?}: {:?}", path, config);
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `NOTION_TOKEN` and `TETHER_VAULT_PATH` from `lookup`. Empty
    /// values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(TOKEN_ENV).filter(|v| !v.trim().is_empty()) {
            self.notion_token = token.trim().to_string();
        }
        if let Some(vault) = lookup(VAULT_ENV).filter(|v| !v.trim().is_empty()) {
            self.vault_path = PathBuf::from(vault.trim());
        }
    }

    /// Anchor a relative cursor path at `base`
    pub fn resolve_relative_paths(&mut self, base: &Path) {
        if self.cursor_path.is_relative() {
            self.cursor_path = base.join(&self.cursor_path);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notion_token.trim().is_empty() {
            return Err(ConfigError::Missing("notion_token"));
        }
        if self.projects_database_id.trim().is_empty() {
            return Err(ConfigError::Missing("projects_database_id"));
        }
        if self.notes_database_id.trim().is_empty() {
            return Err(ConfigError::Missing("notes_database_id"));
        }
        if self.vault_path.as_os_str().is_empty() {
            return Err(ConfigError::Missing("vault_path"));
        }
        Ok(())
    }

    /// Configured batch size kept within the store's per-request limit
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_BATCH_SIZE)
    }
}
