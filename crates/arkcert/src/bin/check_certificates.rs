//! `check-certificates`: select certificates to renew and publish the list.

use std::time::{SystemTime, UNIX_EPOCH};

use arkcert::aws::{AwsClients, S3BlobStore, SsmParameterStore};
use arkcert::config::Config;
use arkcert::handlers::check::CheckHandler;
use arkcert::telemetry;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        eprintln!("ERROR: configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init(&cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        threshold_days = cfg.renewal_threshold_days,
        "check-certificates function starting"
    );

    // -----------------------------------------------------------------------
    // 3. AWS clients
    // -----------------------------------------------------------------------
    let aws = AwsClients::init().await?;
    let parameters = SsmParameterStore::new(aws.ssm.clone());
    let blobs = S3BlobStore::new(aws.s3.clone());
    let handler = CheckHandler::new(&parameters, &blobs, &cfg);

    // -----------------------------------------------------------------------
    // 4. Runtime loop
    // -----------------------------------------------------------------------
    let handler = &handler;
    run(service_fn(move |event: LambdaEvent<Value>| async move {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let now = i64::try_from(now)?;
        Ok::<_, Error>(handler.handle(event.payload, now).await)
    }))
    .await
}
