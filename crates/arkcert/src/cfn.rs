//! CloudFormation custom resource responses.
//!
//! CloudFormation waits for a JSON document PUT to the pre-signed S3 URL it
//! passed in `ResponseURL`. [`ResponseSender`] abstracts that delivery so the
//! handlers can be tested without a network.

use async_trait::async_trait;
use bytes::Bytes;
use common::protocol::{CustomResourceData, CustomResourceEvent, CustomResourceResponse};
use http_body_util::{BodyExt, Full};
use hyper::{header, Method, Request};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use tracing::{debug, info};

pub const SUCCESS: &str = "SUCCESS";
pub const FAILED: &str = "FAILED";

/// Errors delivering a response to CloudFormation.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("failed to build response request: {0}")]
    Request(String),

    #[error("failed to send response: {0}")]
    Transport(String),

    #[error("response URL answered HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("failed to serialise response: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Delivers a custom resource response to its pre-signed URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResponseSender: Send + Sync {
    async fn send(&self, url: &str, response: &CustomResourceResponse) -> Result<(), ResponseError>;
}

/// [`ResponseSender`] over HTTPS.
pub struct HttpResponseSender {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl HttpResponseSender {
    /// Build an HTTPS-only client trusting the webpki roots.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS configuration is rejected.
    pub fn new() -> anyhow::Result<Self> {
        let https = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())?
            .https_only()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(https);
        Ok(Self { client })
    }
}

#[async_trait]
impl ResponseSender for HttpResponseSender {
    async fn send(&self, url: &str, response: &CustomResourceResponse) -> Result<(), ResponseError> {
        let body = serde_json::to_vec(response)?;
        // Pre-signed S3 URLs are signed without a content type.
        let request = Request::builder()
            .method(Method::PUT)
            .uri(url)
            .header(header::CONTENT_TYPE, "")
            .header(header::CONTENT_LENGTH, body.len())
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| ResponseError::Request(e.to_string()))?;

        debug!(status = %response.status, request_id = %response.request_id, "sending CloudFormation response");
        let reply = self
            .client
            .request(request)
            .await
            .map_err(|e| ResponseError::Transport(e.to_string()))?;

        let status = reply.status();
        if !status.is_success() {
            let body = reply
                .into_body()
                .collect()
                .await
                .map(|c| String::from_utf8_lossy(&c.to_bytes()).into_owned())
                .unwrap_or_default();
            return Err(ResponseError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(status = %response.status, logical_id = %response.logical_resource_id, "CloudFormation response delivered");
        Ok(())
    }
}

/// Physical resource id of a certificate resource: `<key>,<cert>`.
pub fn physical_resource_id(key_parameter_name: &str, cert_parameter_name: &str) -> String {
    format!("{key_parameter_name},{cert_parameter_name}")
}

/// Inverse of [`physical_resource_id`]; `None` if there is no comma.
pub fn split_physical_resource_id(id: &str) -> Option<(&str, &str)> {
    id.split_once(',')
}

/// Response to `event` with the given outcome.
pub fn response(
    event: &CustomResourceEvent,
    status: &str,
    reason: impl Into<String>,
    physical_resource_id: impl Into<String>,
    data: CustomResourceData,
) -> CustomResourceResponse {
    CustomResourceResponse {
        status: status.to_owned(),
        reason: reason.into(),
        physical_resource_id: physical_resource_id.into(),
        stack_id: event.stack_id.clone(),
        request_id: event.request_id.clone(),
        logical_resource_id: event.logical_resource_id.clone(),
        data,
    }
}
