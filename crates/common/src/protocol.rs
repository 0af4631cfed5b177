//! Request and response types exchanged with the Lambda entry points.
//!
//! Every entry point answers with an [`Outcome`] envelope: `Success` and a
//! human-readable `Reason` are always present, the payload fields only on
//! success.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lenient;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Uniform response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Outcome<T> {
    pub success: bool,
    pub reason: String,
    #[serde(flatten)]
    pub data: Option<T>,
}

impl<T> Outcome<T> {
    /// Successful outcome carrying `data`.
    pub fn ok(reason: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            reason: reason.into(),
            data: Some(data),
        }
    }

    /// Failed outcome; only `Success` and `Reason` are emitted.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: reason.into(),
            data: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Issuance
// ---------------------------------------------------------------------------

/// Store references produced by a successful issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IssuedRefs {
    pub key_parameter_arn: String,
    pub cert_parameter_arn: String,
    /// Empty when the certificate was not mirrored to the server certificate store.
    #[serde(default)]
    pub server_certificate_arn: String,
}

// ---------------------------------------------------------------------------
// Renewal selection and driver
// ---------------------------------------------------------------------------

/// Input of the check-certificates function.
///
/// With `ParentCertParameterName` set the function runs in cascade mode,
/// otherwise in expiry mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CheckCertificatesRequest {
    pub cert_parameters_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_bucket: Option<String>,
    /// Name or ARN of the certificate whose descendants must be renewed.
    #[serde(
        default,
        alias = "ParentCertParameterArn",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_cert_parameter_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub days_to_expiry_to_trigger_renewal: Option<u32>,
    /// Opaque correlation payload relayed to the notification callback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_formation_data: Option<Value>,
}

/// State of the paginated renewal driver, round-tripped through the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RenewalState {
    pub s3_bucket: String,
    pub s3_key: String,
    pub count: usize,
    pub index: usize,
    pub is_finished: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_formation_data: Option<Value>,
}

impl RenewalState {
    /// Initial state for a stored list of `count` descriptors.
    pub fn new(s3_bucket: impl Into<String>, s3_key: impl Into<String>, count: usize) -> Self {
        Self {
            s3_bucket: s3_bucket.into(),
            s3_key: s3_key.into(),
            count,
            index: 0,
            is_finished: count == 0,
            cloud_formation_data: None,
        }
    }
}

// ---------------------------------------------------------------------------
// CloudFormation
// ---------------------------------------------------------------------------

/// CloudFormation custom resource request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceEvent {
    pub request_type: String,
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    pub stack_id: String,
    pub request_id: String,
    #[serde(default)]
    pub resource_type: String,
    pub logical_resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    /// Parsed lazily so that malformed properties still get a FAILED response.
    #[serde(default)]
    pub resource_properties: Value,
}

/// `Data` attributes exposed through `Fn::GetAtt`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceData {
    #[serde(default)]
    pub key_parameter_arn: String,
    #[serde(default)]
    pub cert_parameter_arn: String,
}

/// Body PUT to the CloudFormation pre-signed response URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceResponse {
    pub status: String,
    pub reason: String,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    pub data: CustomResourceData,
}

/// Response held back while a cascade workflow runs, plus where to deliver it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudFormationData {
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    #[serde(rename = "Response")]
    pub response: CustomResourceResponse,
}

/// Workflow outcome reported to the notification function.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorkflowOutcome {
    #[serde(default, deserialize_with = "lenient::bool")]
    pub success: bool,
}

/// Input of the notify-certificate-resource function.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NotifyRequest {
    #[serde(default)]
    pub outcome: Option<WorkflowOutcome>,
    #[serde(default, rename = "CloudFormationData")]
    pub cloud_formation_data: Option<CloudFormationData>,
}
