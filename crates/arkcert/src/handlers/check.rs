//! `check-certificates`: select certificates to renew and publish the list
//! for the renewal workflow.
//!
//! With `ParentCertParameterName` the named certificate and all its
//! descendants are selected (cascade mode); otherwise every certificate due
//! within the threshold, plus everything below a due CA (expiry mode).

use common::protocol::{CheckCertificatesRequest, Outcome, RenewalState};
use common::PkiError;
use serde_json::Value;
use tracing::info;

use super::{envelope, parse};
use crate::config::Config;
use crate::graph::{select, Forest};
use crate::renewal;
use crate::store::{BlobStore, ParameterStore};

pub struct CheckHandler<'a> {
    parameters: &'a dyn ParameterStore,
    blobs: &'a dyn BlobStore,
    config: &'a Config,
}

impl<'a> CheckHandler<'a> {
    pub fn new(
        parameters: &'a dyn ParameterStore,
        blobs: &'a dyn BlobStore,
        config: &'a Config,
    ) -> Self {
        Self {
            parameters,
            blobs,
            config,
        }
    }

    /// Handle one request; `now` is the current Unix time in seconds.
    pub async fn handle(&self, payload: Value, now: i64) -> Outcome<RenewalState> {
        envelope("check-certificates", self.run(payload, now).await)
    }

    async fn run(&self, payload: Value, now: i64) -> Result<(String, RenewalState), PkiError> {
        let request: CheckCertificatesRequest = parse(payload)?;
        if request.cert_parameters_paths.is_empty() {
            return Err(PkiError::InvalidField {
                field: "CertParametersPaths",
                reason: "at least one path is required".into(),
            });
        }
        let bucket = request
            .s3_bucket
            .as_deref()
            .or(self.config.renewal_bucket.as_deref())
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| PkiError::InvalidField {
                field: "S3Bucket",
                reason: "not in the request and RENEWAL_BUCKET is not set".into(),
            })?;

        let forest = Forest::build(
            self.parameters,
            &request.cert_parameters_paths,
            self.config.parameter_page_size,
        )
        .await?;

        let selected = match request.parent_cert_parameter_name.as_deref() {
            Some(parent) => select::cascade(&forest, parent)?,
            None => {
                let threshold = request
                    .days_to_expiry_to_trigger_renewal
                    .unwrap_or(self.config.renewal_threshold_days);
                select::expiring(&forest, threshold, now)
            }
        };

        let mut descriptors = Vec::with_capacity(selected.len());
        for index in selected {
            let node = forest.node(index);
            descriptors.push(renewal::renewal_descriptor(self.parameters, node).await?);
        }

        let mut state = renewal::publish(
            self.blobs,
            bucket,
            &self.config.renewal_key_prefix,
            &descriptors,
        )
        .await?;
        state.cloud_formation_data = request.cloud_formation_data;

        info!(count = state.count, key = %state.s3_key, "renewal list ready");
        Ok((format!("{} certificate(s) to renew", state.count), state))
    }
}
