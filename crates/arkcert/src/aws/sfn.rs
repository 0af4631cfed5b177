//! [`WorkflowStarter`] on Step Functions.

use async_trait::async_trait;
use common::StoreError;
use serde_json::Value;
use tracing::info;

use super::backend;
use crate::store::WorkflowStarter;

pub struct StepFunctionsStarter {
    client: aws_sdk_sfn::Client,
    state_machine_arn: String,
}

impl StepFunctionsStarter {
    pub fn new(client: aws_sdk_sfn::Client, state_machine_arn: impl Into<String>) -> Self {
        Self {
            client,
            state_machine_arn: state_machine_arn.into(),
        }
    }
}

#[async_trait]
impl WorkflowStarter for StepFunctionsStarter {
    async fn start(&self, input: &Value) -> Result<String, StoreError> {
        let out = self
            .client
            .start_execution()
            .state_machine_arn(&self.state_machine_arn)
            .input(input.to_string())
            .send()
            .await
            .map_err(backend(format!("StartExecution {}", self.state_machine_arn)))?;
        let execution_arn = out.execution_arn().to_owned();
        info!(execution = %execution_arn, "workflow started");
        Ok(execution_arn)
    }
}
