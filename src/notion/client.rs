use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use super::models::{Block, ListResponse, Page, RemoteBlock};
use super::store::{Filter, RemoteStore};

pub const DEFAULT_API_BASE_URL: &str = "https://api.notion.com/v1";
pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";

/// Largest page size the API hands out
const PAGE_SIZE: u32 = 100;

/// HTTP client for the Notion REST API
pub struct NotionClient {
    client: Client,
    base_url: String,
    token: String,
    version: String,
}

#[derive(Error, Debug)]
pub enum NotionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Authentication failed")]
    Unauthorized,
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Rate limited by the API")]
    RateLimited,
    #[error("API error: {status} {code} - {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Error object returned by the API on non-success statuses
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl NotionClient {
    /// Create a new client
    pub fn new(base_url: &str, token: &str, version: &str) -> Result<Self, NotionError> {
        // Normalize URL - ensure no trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(NotionError::InvalidUrl(
                "URL must start with http:// or https://".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url,
            token: token.to_string(),
            version: version.to_string(),
        })
    }

    /// Build full URL for an API path
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.version)
    }

    /// Send a request and decode the JSON response, mapping error statuses
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, path: &str) -> Result<T, NotionError> {
        let response = request.send().await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(NotionError::Unauthorized);
            }
            StatusCode::NOT_FOUND => {
                return Err(NotionError::NotFound(path.to_string()));
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(NotionError::RateLimited);
            }
            status if !status.is_success() => {
                let text = response.text().await.unwrap_or_default();
                let body: ApiErrorBody = serde_json::from_str(&text).unwrap_or_default();
                return Err(NotionError::Api {
                    status: status.as_u16(),
                    code: body.code,
                    message: if body.message.is_empty() { text } else { body.message },
                });
            }
            _ => {}
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl RemoteStore for NotionClient {
    async fn query_database(
        &self,
        database_id: &str,
        filter: Option<&Filter>,
    ) -> Result<Vec<Page>, NotionError> {
        let path = format!("databases/{}/query", database_id);
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(filter) = filter {
                body["filter"] = filter.to_json();
            }
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }

            let response: ListResponse<Page> = self
                .send(self.request(Method::POST, &path).json(&body), &path)
                .await?;
            pages.extend(response.results);

            match response.next_cursor {
                Some(next) if response.has_more => cursor = Some(next),
                _ => break,
            }
        }

        log::debug!("Query of database {} returned {} pages", database_id, pages.len());
        Ok(pages)
    }

    async fn retrieve_page(&self, page_id: &str) -> Result<Page, NotionError> {
        let path = format!("pages/{}", page_id);
        self.send(self.request(Method::GET, &path), &path).await
    }

    async fn list_children(&self, block_id: &str) -> Result<Vec<RemoteBlock>, NotionError> {
        let path = format!("blocks/{}/children", block_id);
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![("page_size", PAGE_SIZE.to_string())];
            if let Some(cursor) = &cursor {
                query.push(("start_cursor", cursor.clone()));
            }

            let response: ListResponse<RemoteBlock> = self
                .send(self.request(Method::GET, &path).query(&query), &path)
                .await?;
            blocks.extend(response.results);

            match response.next_cursor {
                Some(next) if response.has_more => cursor = Some(next),
                _ => break,
            }
        }

        Ok(blocks)
    }

    async fn delete_block(&self, block_id: &str) -> Result<(), NotionError> {
        let path = format!("blocks/{}", block_id);
        let _: Value = self.send(self.request(Method::DELETE, &path), &path).await?;
        Ok(())
    }

    async fn append_children(&self, block_id: &str, blocks: &[Block]) -> Result<(), NotionError> {
        let path = format!("blocks/{}/children", block_id);
        let children: Vec<Value> = blocks.iter().map(Block::to_json).collect();
        let _: Value = self
            .send(
                self.request(Method::PATCH, &path).json(&json!({ "children": children })),
                &path,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_base_url() {
        let result = NotionClient::new("ftp://api.notion.com", "secret", DEFAULT_NOTION_VERSION);
        assert!(matches!(result, Err(NotionError::InvalidUrl(_))));
    }

    #[test]
    fn test_url_normalizes_slashes() {
        let client = NotionClient::new("https://api.notion.com/v1/", "secret", DEFAULT_NOTION_VERSION).unwrap();
        assert_eq!(client.url("/pages/abc"), "https://api.notion.com/v1/pages/abc");
        assert_eq!(client.url("blocks/abc/children"), "https://api.notion.com/v1/blocks/abc/children");
    }

    #[test]
    fn test_api_error_body_parsing() {
        let body: ApiErrorBody = serde_json::from_str(
            r#"{"object":"error","status":400,"code":"validation_error","message":"body failed validation"}"#,
        )
        .unwrap();
        assert_eq!(body.code, "validation_error");
        assert_eq!(body.message, "body failed validation");
    }
}
