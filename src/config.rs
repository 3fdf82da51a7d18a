//! Configuration loader and validator for the reminder job.
//!
//! Lambda deployments read everything from environment variables; local runs
//! may point at a YAML file with the same shape as `example()`.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::model::SourceRecord;
use crate::notion::{redact_token, ItemFields};
use crate::store::{SourceStore, StoreError};

pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";
pub const DEFAULT_TITLE_PROPERTY: &str = "名前";
pub const DEFAULT_CHECKBOX_PROPERTY: &str = "完了";
pub const DEFAULT_CALL_INTERVAL_MS: u64 = 1000;
pub const LEGACY_SOURCE_NAME: &str = "Default Configuration";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Environment variable {0} is required and cannot be empty")]
    Missing(&'static str),
    #[error("Environment variable {0} is not a valid number")]
    NotANumber(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("No active source configurations found in the store")]
    NoActiveSources,
    #[error("Failed to load source configurations: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub notion: Notion,
    #[serde(default)]
    pub app: App,
    /// Multi-source mode: sources come from this store.
    #[serde(default)]
    pub store: Option<Store>,
    /// Single-source fallback used when no store is configured.
    #[serde(default)]
    pub legacy: Option<LegacySource>,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notion {
    pub token: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_title_property")]
    pub title_property: String,
    #[serde(default = "default_checkbox_property")]
    pub checkbox_property: String,
}

impl fmt::Debug for Notion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notion")
            .field("token", &redact_token(&self.token))
            .field("version", &self.version)
            .field("title_property", &self.title_property)
            .field("checkbox_property", &self.checkbox_property)
            .finish()
    }
}

impl Notion {
    pub fn item_fields(&self) -> ItemFields {
        ItemFields {
            title: self.title_property.clone(),
            checkbox: self.checkbox_property.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    /// Pause between consecutive Notion calls of the same phase.
    #[serde(default = "default_call_interval_ms")]
    pub call_interval_ms: u64,
}

impl Default for App {
    fn default() -> Self {
        Self {
            call_interval_ms: DEFAULT_CALL_INTERVAL_MS,
        }
    }
}

impl App {
    pub fn call_interval(&self) -> Duration {
        Duration::from_millis(self.call_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Store {
    pub database_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LegacySource {
    pub database_id: String,
    pub page_id: String,
}

fn default_version() -> String {
    DEFAULT_NOTION_VERSION.to_string()
}

fn default_title_property() -> String {
    DEFAULT_TITLE_PROPERTY.to_string()
}

fn default_checkbox_property() -> String {
    DEFAULT_CHECKBOX_PROPERTY.to_string()
}

fn default_call_interval_ms() -> u64 {
    DEFAULT_CALL_INTERVAL_MS
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Values are trimmed and empty values count as unset. `DATABASE_URL`
    /// selects multi-source mode; otherwise `NOTION_DATABASE_ID` and
    /// `NOTION_PAGE_ID` are both required.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let token = required("NOTION_API_KEY")?;
        info!(token = %redact_token(&token), "NOTION_API_KEY loaded");

        let call_interval_ms = match get("CALL_INTERVAL_MS") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::NotANumber("CALL_INTERVAL_MS"))?,
            None => DEFAULT_CALL_INTERVAL_MS,
        };

        let store = get("DATABASE_URL").map(|database_url| Store { database_url });
        let legacy = if store.is_some() {
            None
        } else {
            let database_id = get("NOTION_DATABASE_ID");
            let page_id = get("NOTION_PAGE_ID");
            match (database_id, page_id) {
                (Some(database_id), Some(page_id)) => Some(LegacySource {
                    database_id,
                    page_id,
                }),
                _ => {
                    warn!("neither DATABASE_URL nor NOTION_DATABASE_ID/NOTION_PAGE_ID are set");
                    return Err(ConfigError::Invalid(
                        "set DATABASE_URL for multi-source mode, or NOTION_DATABASE_ID and NOTION_PAGE_ID for single-source mode",
                    ));
                }
            }
        };

        let cfg = Config {
            notion: Notion {
                token,
                version: get("NOTION_VERSION").unwrap_or_else(default_version),
                title_property: get("NOTION_TITLE_PROPERTY")
                    .unwrap_or_else(default_title_property),
                checkbox_property: get("NOTION_CHECKBOX_PROPERTY")
                    .unwrap_or_else(default_checkbox_property),
            },
            app: App { call_interval_ms },
            store,
            legacy,
        };
        validate(&cfg)?;
        Ok(cfg)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.notion.token.trim().is_empty() {
        return Err(ConfigError::Invalid("notion.token must be non-empty"));
    }
    if cfg.notion.version.trim().is_empty() {
        return Err(ConfigError::Invalid("notion.version must be non-empty"));
    }
    if cfg.notion.title_property.trim().is_empty() {
        return Err(ConfigError::Invalid("notion.title_property must be non-empty"));
    }
    if cfg.notion.checkbox_property.trim().is_empty() {
        return Err(ConfigError::Invalid("notion.checkbox_property must be non-empty"));
    }

    match (&cfg.store, &cfg.legacy) {
        (Some(store), _) if store.database_url.trim().is_empty() => {
            Err(ConfigError::Invalid("store.database_url must be non-empty"))
        }
        (Some(_), _) => Ok(()),
        (None, Some(legacy)) => {
            if legacy.database_id.trim().is_empty() {
                return Err(ConfigError::Invalid("legacy.database_id must be non-empty"));
            }
            if legacy.page_id.trim().is_empty() {
                return Err(ConfigError::Invalid("legacy.page_id must be non-empty"));
            }
            Ok(())
        }
        (None, None) => Err(ConfigError::Invalid(
            "either store or legacy must be configured",
        )),
    }
}

/// Resolve the sources for one run.
///
/// With a store, its active sources are used and an empty set is an error.
/// Without one, a single source is synthesized from the legacy ids.
pub async fn resolve_sources(
    cfg: &Config,
    store: Option<&dyn SourceStore>,
) -> Result<Vec<SourceRecord>, ConfigError> {
    if let Some(store) = store {
        let sources = store.get_active_sources().await?;
        if sources.is_empty() {
            warn!("no active source configurations found");
            return Err(ConfigError::NoActiveSources);
        }
        for source in &sources {
            info!(source = %source.display_name, source_id = %source.source_id, "loaded source");
        }
        return Ok(sources);
    }

    let legacy = cfg
        .legacy
        .as_ref()
        .ok_or(ConfigError::Invalid("either store or legacy must be configured"))?;
    info!(database_id = %legacy.database_id, page_id = %legacy.page_id, "using single-source mode");
    Ok(vec![SourceRecord::create_new(
        LEGACY_SOURCE_NAME,
        legacy.database_id.clone(),
        legacy.page_id.clone(),
        Some("Single source configured through environment variables".to_string()),
    )])
}

/// Example YAML configuration.
pub fn example() -> &'static str {
    r#"notion:
  token: "YOUR_NOTION_INTEGRATION_TOKEN"
  version: "2022-06-28"
  title_property: "名前"
  checkbox_property: "完了"

app:
  call_interval_ms: 1000

legacy:
  database_id: "NOTION_DATABASE_ID"
  page_id: "NOTION_PAGE_ID"
"#
}
