//! `certificate-resource`: CloudFormation custom resource backed by the
//! issuance engine.
//!
//! `Create` and `Update` issue the certificate described by the resource
//! properties. The physical resource id is `<key>,<cert>`, which is how a
//! later `Delete` finds both parameters again. Updating a CA while a cascade
//! workflow is configured starts that workflow and leaves the CloudFormation
//! response to the notify function.

use common::protocol::{
    CheckCertificatesRequest, CloudFormationData, CustomResourceData, CustomResourceEvent,
};
use common::{CertificateDescriptor, PkiError};
use tracing::{error, info};

use super::parse;
use crate::cfn::{self, ResponseError, ResponseSender, FAILED, SUCCESS};
use crate::pki::issue::server_certificate_location;
use crate::pki::CertificateIssuer;
use crate::store::{ParameterStore, ServerCertificateStore, WorkflowStarter};

enum Reply {
    Now {
        reason: String,
        physical_resource_id: String,
        data: CustomResourceData,
    },
    /// The cascade workflow will answer.
    Deferred,
}

pub struct ResourceHandler<'a> {
    parameters: &'a dyn ParameterStore,
    server_certificates: Option<&'a dyn ServerCertificateStore>,
    cascade: Option<&'a dyn WorkflowStarter>,
    sender: &'a dyn ResponseSender,
}

impl<'a> ResourceHandler<'a> {
    pub fn new(parameters: &'a dyn ParameterStore, sender: &'a dyn ResponseSender) -> Self {
        Self {
            parameters,
            server_certificates: None,
            cascade: None,
            sender,
        }
    }

    pub fn with_server_certificates(mut self, store: &'a dyn ServerCertificateStore) -> Self {
        self.server_certificates = Some(store);
        self
    }

    /// Renew the descendants of an updated CA through `workflow`.
    pub fn with_cascade(mut self, workflow: &'a dyn WorkflowStarter) -> Self {
        self.cascade = Some(workflow);
        self
    }

    /// Apply `event` and deliver the CloudFormation response.
    ///
    /// Engine failures are reported to CloudFormation as `FAILED`; only a
    /// failure to deliver the response itself is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError`] if the response cannot be delivered.
    pub async fn handle(&self, event: &CustomResourceEvent) -> Result<(), ResponseError> {
        info!(
            request_type = %event.request_type,
            logical_id = %event.logical_resource_id,
            "custom resource request"
        );

        let response = match self.apply(event).await {
            Ok(Reply::Deferred) => return Ok(()),
            Ok(Reply::Now {
                reason,
                physical_resource_id,
                data,
            }) => cfn::response(event, SUCCESS, reason, physical_resource_id, data),
            Err(e) => {
                error!(code = e.code(), error = %e, logical_id = %event.logical_resource_id, "custom resource request failed");
                cfn::response(
                    event,
                    FAILED,
                    e.to_string(),
                    fallback_physical_id(event),
                    CustomResourceData::default(),
                )
            }
        };
        self.sender.send(&event.response_url, &response).await
    }

    async fn apply(&self, event: &CustomResourceEvent) -> Result<Reply, PkiError> {
        match event.request_type.as_str() {
            "Create" | "Update" => self.issue(event).await,
            "Delete" => self.delete(event).await,
            other => Err(PkiError::InvalidField {
                field: "RequestType",
                reason: format!("unsupported request type {other:?}"),
            }),
        }
    }

    async fn issue(&self, event: &CustomResourceEvent) -> Result<Reply, PkiError> {
        let descriptor: CertificateDescriptor = parse(event.resource_properties.clone())?;

        let mut issuer = CertificateIssuer::new(self.parameters);
        if let Some(store) = self.server_certificates {
            issuer = issuer.with_server_certificates(store);
        }
        let refs = issuer.issue(&descriptor).await?;

        let physical_resource_id = cfn::physical_resource_id(
            &descriptor.key_parameter_name,
            &descriptor.cert_parameter_name,
        );
        let data = CustomResourceData {
            key_parameter_arn: refs.key_parameter_arn,
            cert_parameter_arn: refs.cert_parameter_arn,
        };
        let reason = format!(
            "Successfully created/renewed private key and certificate for {}",
            descriptor
                .common_name
                .as_deref()
                .unwrap_or(&descriptor.cert_parameter_name)
        );

        match self.cascade {
            Some(workflow) if event.request_type == "Update" && descriptor.is_ca() => {
                let pending = CloudFormationData {
                    response_url: event.response_url.clone(),
                    response: cfn::response(event, SUCCESS, reason, physical_resource_id, data),
                };
                let request = CheckCertificatesRequest {
                    cert_parameters_paths: descriptor.cert_parameters_paths.clone(),
                    parent_cert_parameter_name: Some(descriptor.cert_parameter_name.clone()),
                    cloud_formation_data: Some(serde_json::to_value(&pending)?),
                    ..CheckCertificatesRequest::default()
                };
                let execution = workflow.start(&serde_json::to_value(&request)?).await?;
                info!(
                    cert = %descriptor.cert_parameter_name,
                    execution = %execution,
                    "CA updated; cascade renewal started"
                );
                Ok(Reply::Deferred)
            }
            _ => Ok(Reply::Now {
                reason,
                physical_resource_id,
                data,
            }),
        }
    }

    async fn delete(&self, event: &CustomResourceEvent) -> Result<Reply, PkiError> {
        let physical_resource_id = fallback_physical_id(event);
        let Some((key_name, cert_name)) = cfn::split_physical_resource_id(&physical_resource_id)
        else {
            // A create that failed before naming anything.
            info!(physical_id = %physical_resource_id, "nothing to delete");
            return Ok(Reply::Now {
                reason: "Nothing to delete".into(),
                data: CustomResourceData::default(),
                physical_resource_id,
            });
        };

        self.parameters.delete(cert_name).await?;
        self.parameters.delete(key_name).await?;
        if let Some(store) = self.server_certificates {
            let (_, name) = server_certificate_location(cert_name);
            store.delete(&name).await?;
        }
        info!(cert = %cert_name, key = %key_name, "certificate deleted");

        Ok(Reply::Now {
            reason: format!("Deleted private key and certificate {cert_name}"),
            data: CustomResourceData::default(),
            physical_resource_id,
        })
    }
}

/// The current physical id, or the request id for a resource that never got one.
fn fallback_physical_id(event: &CustomResourceEvent) -> String {
    event
        .physical_resource_id
        .clone()
        .unwrap_or_else(|| event.request_id.clone())
}
