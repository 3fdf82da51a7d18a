use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::ShoppingItem;

/// A property path expected in a Notion page that was not there.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("missing field '{0}' in Notion page")]
pub struct MissingFieldError(pub String);

/// Names of the database properties read from each page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFields {
    pub title: String,
    pub checkbox: String,
}

/// A database row as returned by the query endpoint.
#[derive(Deserialize, Debug, Clone)]
pub struct NotionPage {
    pub id: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// One page of results from `POST v1/databases/{id}/query`.
#[derive(Deserialize, Debug, Clone)]
pub struct QueryPage {
    pub results: Vec<NotionPage>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

impl NotionPage {
    /// Normalize the page into a `ShoppingItem`.
    ///
    /// An empty title array yields an empty name; any other missing piece is
    /// an error.
    pub fn to_shopping_item(&self, fields: &ItemFields) -> Result<ShoppingItem, MissingFieldError> {
        let title = self
            .properties
            .get(&fields.title)
            .ok_or_else(|| MissingFieldError(fields.title.clone()))?
            .get("title")
            .and_then(Value::as_array)
            .ok_or_else(|| MissingFieldError(format!("{}.title", fields.title)))?;

        let name = match title.first() {
            None => String::new(),
            Some(first) => first
                .pointer("/text/content")
                .and_then(Value::as_str)
                .ok_or_else(|| MissingFieldError(format!("{}.title[0].text.content", fields.title)))?
                .to_string(),
        };

        let checked = self
            .properties
            .get(&fields.checkbox)
            .ok_or_else(|| MissingFieldError(fields.checkbox.clone()))?
            .get("checkbox")
            .and_then(Value::as_bool)
            .ok_or_else(|| MissingFieldError(format!("{}.checkbox", fields.checkbox)))?;

        Ok(ShoppingItem {
            id: self.id.clone(),
            name,
            checked,
        })
    }
}
