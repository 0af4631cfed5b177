//! `certificate-resource`: CloudFormation custom resource provider.

use arkcert::aws::{AwsClients, IamServerCertificateStore, SsmParameterStore, StepFunctionsStarter};
use arkcert::cfn::HttpResponseSender;
use arkcert::config::Config;
use arkcert::handlers::resource::ResourceHandler;
use arkcert::telemetry;
use common::protocol::CustomResourceEvent;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
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
        cascade = cfg.cascade_state_machine_arn.is_some(),
        "certificate-resource function starting"
    );

    // -----------------------------------------------------------------------
    // 3. AWS clients and response delivery
    // -----------------------------------------------------------------------
    let aws = AwsClients::init().await?;
    let parameters = SsmParameterStore::new(aws.ssm.clone());
    let server_certificates = IamServerCertificateStore::new(aws.iam.clone());
    let cascade = cfg
        .cascade_state_machine_arn
        .as_deref()
        .map(|arn| StepFunctionsStarter::new(aws.sfn.clone(), arn));
    let sender = HttpResponseSender::new()?;

    let mut handler = ResourceHandler::new(&parameters, &sender);
    if cfg.mirror_server_certificates {
        handler = handler.with_server_certificates(&server_certificates);
    }
    if let Some(workflow) = &cascade {
        handler = handler.with_cascade(workflow);
    }

    // -----------------------------------------------------------------------
    // 4. Runtime loop
    // -----------------------------------------------------------------------
    let handler = &handler;
    run(service_fn(move |event: LambdaEvent<CustomResourceEvent>| async move {
        handler.handle(&event.payload).await.map_err(Error::from)
    }))
    .await
}
