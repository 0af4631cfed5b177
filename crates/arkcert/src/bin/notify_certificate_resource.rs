//! `notify-certificate-resource`: report a finished cascade renewal to
//! CloudFormation.

use arkcert::cfn::HttpResponseSender;
use arkcert::config::Config;
use arkcert::{handlers, telemetry};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cfg = Config::from_env().map_err(|e| {
        eprintln!("ERROR: configuration invalid: {e}");
        e
    })?;
    telemetry::init(&cfg.log_level)?;
    info!(version = env!("CARGO_PKG_VERSION"), "notify-certificate-resource function starting");

    let sender = HttpResponseSender::new()?;
    let sender = &sender;
    run(service_fn(move |event: LambdaEvent<Value>| async move {
        handlers::notify::handle(sender, event.payload)
            .await
            .map_err(Error::from)
    }))
    .await
}
