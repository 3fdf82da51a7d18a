use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing::info;

use shopping_reminder::config::Config;
use shopping_reminder::dispatch::{self, LambdaResponse};

async fn handle_request(event: LambdaEvent<Value>) -> Result<LambdaResponse, Error> {
    info!(request_id = %event.context.request_id, "invocation received");
    Ok(dispatch::handle_invocation(Config::from_env()).await)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_ansi(false)
        .compact()
        .init();

    lambda_runtime::run(service_fn(handle_request)).await
}
