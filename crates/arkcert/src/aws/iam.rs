//! [`ServerCertificateStore`] on IAM server certificates.

use async_trait::async_trait;
use common::StoreError;
use tracing::debug;

use super::backend;
use crate::store::ServerCertificateStore;

pub struct IamServerCertificateStore {
    client: aws_sdk_iam::Client,
}

impl IamServerCertificateStore {
    pub fn new(client: aws_sdk_iam::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ServerCertificateStore for IamServerCertificateStore {
    async fn upload(
        &self,
        path: &str,
        name: &str,
        certificate_body: &str,
        private_key: &str,
        chain: Option<String>,
    ) -> Result<String, StoreError> {
        let out = self
            .client
            .upload_server_certificate()
            .path(path)
            .server_certificate_name(name)
            .certificate_body(certificate_body)
            .private_key(private_key)
            .set_certificate_chain(chain)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error()
                    .is_some_and(|s| s.is_entity_already_exists_exception())
                {
                    StoreError::AlreadyExists(name.to_owned())
                } else {
                    backend(format!("UploadServerCertificate {name}"))(e)
                }
            })?;

        let arn = out
            .server_certificate_metadata()
            .map(|m| m.arn().to_owned())
            .unwrap_or_default();
        debug!(name = %name, arn = %arn, "server certificate uploaded");
        Ok(arn)
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        match self
            .client
            .delete_server_certificate()
            .server_certificate_name(name)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|s| s.is_no_such_entity_exception()) =>
            {
                debug!(name = %name, "server certificate already absent");
                Ok(())
            }
            Err(e) => Err(backend(format!("DeleteServerCertificate {name}"))(e)),
        }
    }
}
