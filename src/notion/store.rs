use async_trait::async_trait;
use serde_json::{json, Value};

use super::client::NotionError;
use super::models::{Block, Page, RemoteBlock};

/// Operations the sync engine needs from the remote document store.
///
/// Implementations must follow pagination themselves: list and query calls
/// return every result, in the store's order.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Query a database, optionally filtered
    async fn query_database(
        &self,
        database_id: &str,
        filter: Option<&Filter>,
    ) -> Result<Vec<Page>, NotionError>;

    /// Fetch a single page by id
    async fn retrieve_page(&self, page_id: &str) -> Result<Page, NotionError>;

    /// List the direct children of a block or page
    async fn list_children(&self, block_id: &str) -> Result<Vec<RemoteBlock>, NotionError>;

    /// Delete (archive) a block
    async fn delete_block(&self, block_id: &str) -> Result<(), NotionError>;

    /// Append blocks after the existing children. Callers keep each request
    /// within the store's per-request limit.
    async fn append_children(&self, block_id: &str, blocks: &[Block]) -> Result<(), NotionError>;
}

/// Database query filter: a conjunction of property predicates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    And(Vec<Filter>),
    DateOnOrAfter { property: String, date: String },
    RelationContains { property: String, id: String },
}

impl Filter {
    pub fn relation_contains(property: &str, id: &str) -> Self {
        Self::RelationContains {
            property: property.to_string(),
            id: id.to_string(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Filter::And(filters) => {
                json!({ "and": filters.iter().map(Filter::to_json).collect::<Vec<_>>() })
            }
            Filter::DateOnOrAfter { property, date } => {
                json!({ "property": property, "date": { "on_or_after": date } })
            }
            Filter::RelationContains { property, id } => {
                json!({ "property": property, "relation": { "contains": id } })
            }
        }
    }
}
