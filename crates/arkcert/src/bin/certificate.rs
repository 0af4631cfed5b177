//! `certificate`: issue or re-issue one certificate.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise structured logging.
//! 3. Initialise AWS SDK clients and the issuance engine.
//! 4. Serve invocations.

use arkcert::aws::{AwsClients, IamServerCertificateStore, SsmParameterStore};
use arkcert::config::Config;
use arkcert::pki::CertificateIssuer;
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
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init(&cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        mirror = cfg.mirror_server_certificates,
        "certificate function starting"
    );

    // -----------------------------------------------------------------------
    // 3. AWS clients
    // -----------------------------------------------------------------------
    let aws = AwsClients::init().await?;
    let parameters = SsmParameterStore::new(aws.ssm.clone());
    let server_certificates = IamServerCertificateStore::new(aws.iam.clone());

    let mut issuer = CertificateIssuer::new(&parameters);
    if cfg.mirror_server_certificates {
        issuer = issuer.with_server_certificates(&server_certificates);
    }

    // -----------------------------------------------------------------------
    // 4. Runtime loop
    // -----------------------------------------------------------------------
    let issuer = &issuer;
    run(service_fn(move |event: LambdaEvent<Value>| async move {
        Ok::<_, Error>(handlers::certificate::handle(issuer, event.payload).await)
    }))
    .await
}
