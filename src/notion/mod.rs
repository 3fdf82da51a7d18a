use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::model::{ShoppingItem, SourceRecord};
use crate::notion::model::{MissingFieldError, NotionPage, QueryPage};

pub mod model;

pub use model::ItemFields;

const NOTION_API_BASE: &str = "https://api.notion.com/";

/// Maximum page size accepted by the query endpoint.
pub const PAGE_SIZE: u32 = 100;

/// Every way a call to Notion can fail, as seen by callers.
#[derive(Debug, Error)]
pub enum NotionError {
    #[error("notion error {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("failed to reach Notion: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid Notion response JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid Notion URL: {0}")]
    Url(String),
    #[error("notion reported more results without a next_cursor")]
    MissingCursor,
    #[error(transparent)]
    MissingField(#[from] MissingFieldError),
}

#[derive(Clone)]
pub struct NotionClient {
    http: Client,
    base_url: Url,
    token: String,
    version: String,
    fields: ItemFields,
}

impl fmt::Debug for NotionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionClient")
            .field("base_url", &self.base_url)
            .field("token", &redact_token(&self.token))
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Remote operations the reminder pipeline needs, one source at a time.
#[async_trait]
pub trait NotionService: Send + Sync {
    /// Fetch every unchecked item of `source`, following pagination to the end.
    async fn query_unchecked_items(
        &self,
        source: &SourceRecord,
    ) -> Result<Vec<ShoppingItem>, NotionError>;

    /// Append a comment to `page_id`.
    async fn create_comment(&self, page_id: &str, message: &str) -> Result<(), NotionError>;
}

impl NotionClient {
    pub fn new(token: String, version: String, fields: ItemFields) -> Result<Self, NotionError> {
        let base_url = Url::parse(NOTION_API_BASE).map_err(|e| NotionError::Url(e.to_string()))?;
        Self::with_base_url(token, version, fields, base_url)
    }

    pub fn with_base_url(
        token: String,
        version: String,
        fields: ItemFields,
        base_url: Url,
    ) -> Result<Self, NotionError> {
        let http = Client::builder()
            .user_agent(concat!("shopping-reminder/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url,
            token,
            version,
            fields,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, NotionError> {
        Self::new(
            cfg.notion.token.clone(),
            cfg.notion.version.clone(),
            cfg.notion.item_fields(),
        )
    }

    pub fn build_request(&self, path: &str, body: &Value) -> Result<reqwest::Request, NotionError> {
        let endpoint = self
            .base_url
            .join(path)
            .map_err(|e| NotionError::Url(e.to_string()))?;
        Ok(self
            .http
            .post(endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Notion-Version", &self.version)
            .header("Content-Type", "application/json")
            .json(body)
            .build()?)
    }

    async fn execute<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, NotionError> {
        let request = self.build_request(path, body)?;
        debug!(
            url = %request.url(),
            token = %redact_token(&self.token),
            payload = %body,
            "notion request"
        );

        let res = self.http.execute(request).await?;
        let status = res.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            warn!(%body, "rate limited by Notion");
            return Err(NotionError::Status { status, body });
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, %body, "notion API error");
            return Err(NotionError::Status { status, body });
        }

        let text = res.text().await?;
        debug!(%status, bytes = text.len(), "notion response");
        Ok(serde_json::from_str(&text)?)
    }

    /// Fetch a single page of unchecked rows from `database_id`.
    pub async fn query_page(
        &self,
        database_id: &str,
        start_cursor: Option<String>,
    ) -> Result<QueryPage, NotionError> {
        let body = build_query_body(&self.fields.checkbox, start_cursor.as_deref());
        self.execute(&format!("v1/databases/{}/query", database_id), &body)
            .await
    }

    #[instrument(skip_all, fields(source = %source.display_name, database_id = %source.database_id))]
    pub async fn query_unchecked_items(
        &self,
        source: &SourceRecord,
    ) -> Result<Vec<ShoppingItem>, NotionError> {
        let pages = collect_all_pages(|cursor| self.query_page(&source.database_id, cursor)).await?;
        let items = pages
            .iter()
            .map(|page| page.to_shopping_item(&self.fields))
            .collect::<Result<Vec<_>, _>>()?;
        info!(count = items.len(), "query completed");
        Ok(items)
    }

    #[instrument(skip(self, message))]
    pub async fn create_comment(&self, page_id: &str, message: &str) -> Result<(), NotionError> {
        let body = build_comment_body(page_id, message);
        let created: CreatedComment = self.execute("v1/comments", &body).await?;
        info!(comment_id = %created.id, "comment created");
        Ok(())
    }
}

#[async_trait]
impl NotionService for NotionClient {
    async fn query_unchecked_items(
        &self,
        source: &SourceRecord,
    ) -> Result<Vec<ShoppingItem>, NotionError> {
        NotionClient::query_unchecked_items(self, source).await
    }

    async fn create_comment(&self, page_id: &str, message: &str) -> Result<(), NotionError> {
        NotionClient::create_comment(self, page_id, message).await
    }
}

/// Drive a cursor-paginated query until Notion reports no more results.
///
/// `fetch_page` receives `None` for the first request and the previous
/// page's `next_cursor` afterwards. Rows are returned in page order.
pub async fn collect_all_pages<F, Fut>(mut fetch_page: F) -> Result<Vec<NotionPage>, NotionError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<QueryPage, NotionError>>,
{
    let mut results = Vec::new();
    let mut cursor: Option<String> = None;
    let mut page_count = 0usize;

    loop {
        page_count += 1;
        let page = fetch_page(cursor.take()).await?;
        debug!(
            page_count,
            received = page.results.len(),
            has_more = page.has_more,
            "query page received"
        );
        results.extend(page.results);
        if !page.has_more {
            break;
        }
        cursor = Some(page.next_cursor.ok_or(NotionError::MissingCursor)?);
    }

    Ok(results)
}

pub fn build_query_body(checkbox_property: &str, start_cursor: Option<&str>) -> Value {
    let mut body = json!({
        "filter": {
            "property": checkbox_property,
            "checkbox": { "equals": false },
        },
        "page_size": PAGE_SIZE,
    });
    if let Some(cursor) = start_cursor {
        body["start_cursor"] = json!(cursor);
    }
    body
}

pub fn build_comment_body(page_id: &str, message: &str) -> Value {
    json!({
        "parent": { "page_id": page_id },
        "rich_text": [
            {
                "type": "text",
                "text": { "content": message }
            }
        ]
    })
}

/// Short, non-reversible rendering of a credential for diagnostics.
pub fn redact_token(token: &str) -> String {
    let visible = (token.chars().count() / 4).min(4);
    let prefix: String = token.chars().take(visible).collect();
    format!("{prefix}…")
}

#[derive(Deserialize)]
struct CreatedComment {
    id: String,
}
