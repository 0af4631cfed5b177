//! Collaborator interfaces: parameter store, server certificate store, blob
//! store, and workflow engine.
//!
//! The engine only talks to these traits. Production implementations live in
//! [`crate::aws`]; unit tests use the in-memory fakes in `memory`.

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use common::{StoreError, Tag};
use serde_json::Value;

/// A stored parameter as returned by the parameter store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub arn: String,
    pub value: String,
}

/// One page of a path listing.
#[derive(Debug, Clone, Default)]
pub struct ParameterPage {
    pub parameters: Vec<Parameter>,
    /// Continuation token; `None` once the listing is exhausted.
    pub next_token: Option<String>,
}

/// Hierarchical, versioned key/value store holding keys and certificates.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Fetch one parameter, decrypting it if `decrypt` is set.
    ///
    /// Returns [`StoreError::NotFound`] if the parameter does not exist.
    async fn get(&self, name: &str, decrypt: bool) -> Result<Parameter, StoreError>;

    /// Create or overwrite a parameter and return its ARN.
    async fn put(
        &self,
        name: &str,
        value: &str,
        description: &str,
        secure: bool,
    ) -> Result<String, StoreError>;

    /// Tags currently attached to a parameter.
    async fn list_tags(&self, name: &str) -> Result<Vec<Tag>, StoreError>;

    /// Replace the whole tag set of a parameter with `tags`.
    async fn replace_tags(&self, name: &str, tags: &[Tag]) -> Result<(), StoreError>;

    /// Delete a parameter. Deleting a missing parameter succeeds.
    async fn delete(&self, name: &str) -> Result<(), StoreError>;

    /// List parameters under `path`, recursively, one page at a time.
    async fn list_by_path(
        &self,
        path: &str,
        page_size: i32,
        next_token: Option<String>,
    ) -> Result<ParameterPage, StoreError>;
}

/// Certificate store consumed by TLS-terminating load balancers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServerCertificateStore: Send + Sync {
    /// Upload a certificate, its private key and its trust chain; returns the ARN.
    ///
    /// Returns [`StoreError::AlreadyExists`] if `name` is taken.
    async fn upload(
        &self,
        path: &str,
        name: &str,
        certificate_body: &str,
        private_key: &str,
        chain: Option<String>,
    ) -> Result<String, StoreError>;

    /// Delete a certificate by name. Deleting a missing certificate succeeds.
    async fn delete(&self, name: &str) -> Result<(), StoreError>;
}

/// Object store holding renewal lists that may outgrow a workflow payload.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StoreError>;

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;
}

/// Workflow engine that iterates the renewal driver until it reports completion.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkflowStarter: Send + Sync {
    /// Start one execution with `input`; returns the execution identifier.
    async fn start(&self, input: &Value) -> Result<String, StoreError>;
}
