//! `renew-certificate`: one step of the renewal workflow.

use arkcert::aws::{AwsClients, IamServerCertificateStore, S3BlobStore, SsmParameterStore};
use arkcert::config::Config;
use arkcert::pki::CertificateIssuer;
use arkcert::renewal::RenewalDriver;
use arkcert::{handlers, telemetry};
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
    info!(version = env!("CARGO_PKG_VERSION"), "renew-certificate function starting");

    // -----------------------------------------------------------------------
    // 3. AWS clients and driver
    // -----------------------------------------------------------------------
    let aws = AwsClients::init().await?;
    let parameters = SsmParameterStore::new(aws.ssm.clone());
    let server_certificates = IamServerCertificateStore::new(aws.iam.clone());
    let blobs = S3BlobStore::new(aws.s3.clone());

    let mut issuer = CertificateIssuer::new(&parameters);
    if cfg.mirror_server_certificates {
        issuer = issuer.with_server_certificates(&server_certificates);
    }
    let driver = RenewalDriver::new(&blobs, &issuer);

    // -----------------------------------------------------------------------
    // 4. Runtime loop
    // -----------------------------------------------------------------------
    let driver = &driver;
    run(service_fn(move |event: LambdaEvent<Value>| async move {
        Ok::<_, Error>(handlers::renew::handle(driver, event.payload).await)
    }))
    .await
}
