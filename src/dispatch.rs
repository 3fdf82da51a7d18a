//! Invocation boundary: one reminder run rendered as an HTTP-style response.
//!
//! | situation                         | status |
//! |-----------------------------------|--------|
//! | configuration could not be loaded | 400    |
//! | run reported `success == false`   | 500    |
//! | unexpected failure outside a run  | 500    |
//! | anything else, partial included   | 200    |

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Display;
use tracing::{error, info, warn};

use crate::config::{resolve_sources, Config, ConfigError};
use crate::message;
use crate::model::NotificationResult;
use crate::notion::{NotionClient, NotionService};
use crate::pipeline::ReminderPipeline;
use crate::store::{SourceStore, SqliteSourceStore};
use crate::throttle::{CallPacer, FixedDelay};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LambdaResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: Value,
    pub body: String,
}

impl LambdaResponse {
    /// Parsed JSON body.
    pub fn body_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

fn json_response(status_code: u16, result: &NotificationResult) -> LambdaResponse {
    let mut body = json!({
        "success": result.success,
        "message": result.message,
    });
    if let Some(err) = &result.error {
        body["error"] = json!(err);
    }
    LambdaResponse {
        status_code,
        headers: json!({ "Content-Type": "application/json" }),
        body: body.to_string(),
    }
}

pub fn response_for(result: &NotificationResult) -> LambdaResponse {
    let status = if result.success { 200 } else { 500 };
    json_response(status, result)
}

pub fn config_error_response(err: &ConfigError) -> LambdaResponse {
    json_response(
        400,
        &NotificationResult::with_error(false, message::CONFIG_ERROR, err.to_string()),
    )
}

pub fn unexpected_error_response(err: &dyn Display) -> LambdaResponse {
    json_response(
        500,
        &NotificationResult::with_error(false, message::UNEXPECTED_ERROR, err.to_string()),
    )
}

/// Resolve sources and run the pipeline once with the given collaborators.
pub async fn run_configured(
    cfg: &Config,
    store: Option<&dyn SourceStore>,
    notion: &dyn NotionService,
    pacer: &dyn CallPacer,
) -> LambdaResponse {
    let sources = match resolve_sources(cfg, store).await {
        Ok(sources) => sources,
        Err(err) => {
            error!(error = %err, "failed to resolve sources");
            return config_error_response(&err);
        }
    };

    let result = ReminderPipeline::new(notion, pacer).run(&sources).await;
    let response = response_for(&result);
    if result.is_partial() {
        warn!(
            error = result.error.as_deref().unwrap_or_default(),
            "some sources could not be notified"
        );
    }
    info!(status = response.status_code, message = %result.message, "invocation finished");
    response
}

/// Full production path: open the store if configured, build the Notion
/// client and pacer, and run once.
pub async fn handle_invocation(config: Result<Config, ConfigError>) -> LambdaResponse {
    let cfg = match config {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "configuration error");
            return config_error_response(&err);
        }
    };

    let store = match &cfg.store {
        Some(store_cfg) => match SqliteSourceStore::open(&store_cfg.database_url).await {
            Ok(store) => Some(store),
            Err(err) => {
                error!(error = %err, "failed to open source store");
                return config_error_response(&ConfigError::Store(err));
            }
        },
        None => None,
    };

    let client = match NotionClient::from_config(&cfg) {
        Ok(client) => client,
        Err(err) => {
            error!(error = %err, "failed to build Notion client");
            return unexpected_error_response(&err);
        }
    };
    let pacer = FixedDelay::new(cfg.app.call_interval());

    run_configured(
        &cfg,
        store.as_ref().map(|s| s as &dyn SourceStore),
        &client,
        &pacer,
    )
    .await
}
